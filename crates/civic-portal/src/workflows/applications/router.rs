use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::confirmation::ConfirmationId;
use super::content::{ContentDocument, MarriageForm};
use super::domain::{
    ActorId, ApplicationId, ApplicationStatus, ApplicationSubmission, UploadedFile,
};
use super::lifecycle::TransitionError;
use super::repository::{AccountDirectory, BlobStore, RecordStore};
use super::service::{ApplicationServiceError, CivicApplicationService};

/// Header carrying the authenticated actor id, set by the upstream auth layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

type SharedService<S, D, B> = Arc<CivicApplicationService<S, D, B>>;

/// Router builder exposing the citizen, official, and chairman endpoints.
pub fn application_router<S, D, B>(service: SharedService<S, D, B>) -> Router
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    Router::new()
        .route("/api/v1/services", get(catalog_handler::<S, D, B>))
        .route("/api/v1/applications", post(submit_handler::<S, D, B>))
        .route("/api/v1/applications/drafts", post(save_draft_handler::<S, D, B>))
        .route(
            "/api/v1/applications/mine",
            get(my_applications_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(detail_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id/content",
            put(amend_draft_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_draft_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id/process",
            post(process_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id/sign",
            post(sign_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_handler::<S, D, B>),
        )
        .route(
            "/api/v1/applications/:application_id/complete",
            post(complete_handler::<S, D, B>),
        )
        .route("/api/v1/official/inbox", get(inbox_handler::<S, D, B>))
        .route("/api/v1/chairman/queue", get(chairman_queue_handler::<S, D, B>))
        .route("/api/v1/confirmations", get(pending_confirmations_handler::<S, D, B>))
        .route(
            "/api/v1/confirmations/:confirmation_id/confirm",
            post(confirm_handler::<S, D, B>),
        )
        .route(
            "/api/v1/confirmations/:confirmation_id/reject",
            post(decline_handler::<S, D, B>),
        )
        .route(
            "/api/v1/citizens/:national_id",
            get(lookup_handler::<S, D, B>),
        )
        .route(
            "/api/v1/eligibility/marriage",
            post(marriage_eligibility_handler::<S, D, B>),
        )
        .route(
            "/api/v1/eligibility/temporary-residence/:national_id",
            get(residence_eligibility_handler::<S, D, B>),
        )
        .route(
            "/api/v1/registry/derivation-audit",
            get(derivation_audit_handler::<S, D, B>),
        )
        .with_state(service)
}

/// HTTP status for a service failure.
pub fn status_for(error: &ApplicationServiceError) -> StatusCode {
    match error {
        ApplicationServiceError::NotFound(_)
        | ApplicationServiceError::ConfirmationNotFound(_)
        | ApplicationServiceError::UnknownServiceType(_) => StatusCode::NOT_FOUND,
        ApplicationServiceError::Transition(TransitionError::OfficialTargetNotAllowed { .. })
        | ApplicationServiceError::Content(_)
        | ApplicationServiceError::MissingReason
        | ApplicationServiceError::InvalidActor => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::Transition(_)
        | ApplicationServiceError::AlreadyResolved { .. }
        | ApplicationServiceError::DuplicateConfirmation(_) => StatusCode::CONFLICT,
        ApplicationServiceError::NotOwner { .. }
        | ApplicationServiceError::NotConfirmationTarget(_) => StatusCode::FORBIDDEN,
        ApplicationServiceError::Blob(_) | ApplicationServiceError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn error_response(error: ApplicationServiceError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "application request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, ApplicationServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Missing headers yield a blank actor, which the service rejects.
fn actor(headers: &HeaderMap) -> ActorId {
    let value = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    ActorId::new(value.trim())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProcessRequest {
    pub(crate) status: ApplicationStatus,
    #[serde(default)]
    pub(crate) note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SignRequest {
    #[serde(default)]
    pub(crate) note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReasonRequest {
    pub(crate) reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitDraftRequest {
    #[serde(default)]
    pub(crate) attachments: Vec<UploadedFile>,
}

pub(crate) async fn catalog_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    let services: Vec<_> = service.catalog().iter().cloned().collect();
    (StatusCode::OK, Json(services)).into_response()
}

pub(crate) async fn submit_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::ACCEPTED, service.submit(submission))
}

pub(crate) async fn save_draft_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::CREATED, service.save_draft(submission))
}

pub(crate) async fn my_applications_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    headers: HeaderMap,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.applications_for(&actor(&headers)))
}

pub(crate) async fn detail_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.get(ApplicationId(application_id)))
}

pub(crate) async fn amend_draft_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
    headers: HeaderMap,
    Json(content): Json<ContentDocument>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.amend_draft(ApplicationId(application_id), &actor(&headers), content),
    )
}

pub(crate) async fn submit_draft_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<SubmitDraftRequest>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::ACCEPTED,
        service.submit_draft(
            ApplicationId(application_id),
            &actor(&headers),
            request.attachments,
        ),
    )
}

pub(crate) async fn process_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<ProcessRequest>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.process(
            ApplicationId(application_id),
            &actor(&headers),
            request.status,
            request.note,
        ),
    )
}

/// The JSON body is optional; a bodiless request signs without a note.
pub(crate) async fn sign_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
    headers: HeaderMap,
    request: Option<Json<SignRequest>>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    let Json(request) = request.unwrap_or_default();
    respond(
        StatusCode::OK,
        service.sign(ApplicationId(application_id), &actor(&headers), request.note),
    )
}

pub(crate) async fn reject_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.reject(
            ApplicationId(application_id),
            &actor(&headers),
            &request.reason,
        ),
    )
}

pub(crate) async fn complete_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(application_id): Path<u64>,
    headers: HeaderMap,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.complete(ApplicationId(application_id), &actor(&headers)),
    )
}

pub(crate) async fn inbox_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.official_inbox())
}

pub(crate) async fn chairman_queue_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.chairman_queue())
}

pub(crate) async fn pending_confirmations_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    headers: HeaderMap,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.pending_confirmations(&actor(&headers)),
    )
}

pub(crate) async fn confirm_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(confirmation_id): Path<u64>,
    headers: HeaderMap,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service
            .confirm(ConfirmationId(confirmation_id), &actor(&headers))
            .map(|resolved| resolved.request),
    )
}

pub(crate) async fn decline_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(confirmation_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service
            .decline_confirmation(
                ConfirmationId(confirmation_id),
                &actor(&headers),
                &request.reason,
            )
            .map(|resolved| resolved.request),
    )
}

pub(crate) async fn lookup_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(national_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.lookup_counterparty(&national_id))
}

pub(crate) async fn marriage_eligibility_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Json(form): Json<MarriageForm>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.verify_marriage(&form))
}

pub(crate) async fn residence_eligibility_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
    Path(national_id): Path<String>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(
        StatusCode::OK,
        service.verify_temporary_residence(&national_id),
    )
}

pub(crate) async fn derivation_audit_handler<S, D, B>(
    State(service): State<SharedService<S, D, B>>,
) -> Response
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    respond(StatusCode::OK, service.derivation_audit())
}
