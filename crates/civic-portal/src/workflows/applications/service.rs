use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::confirmation::{
    self, ConfirmationError, ConfirmationId, ConfirmationKind, ConfirmationRequest,
    ConfirmationStatus, OpenRequest, Resolution, Resolved,
};
use super::content::{ContentDocument, ContentError, FormContent, MarriageForm};
use super::derivation::{
    DerivationContext, DerivationHandler, DerivationIssue, DerivationOutcome, RecordDeriver,
};
use super::domain::{
    ActorId, Application, ApplicationHistory, ApplicationId, ApplicationStatus,
    ApplicationSubmission, Attachment, ServiceCatalog, ServiceKind, ServiceType, ServiceTypeId,
    UploadedFile,
};
use super::eligibility::{EligibilityReport, EligibilityVerifier, MarriageEligibilityRequest};
use super::lifecycle::{self, LifecycleError, LifecycleEvent, TransitionError};
use super::repository::{
    Account, AccountDirectory, ApplicationStore, BlobError, BlobStore, ConfirmationStore,
    RecordLedger, RecordStore, RepositoryError, UnitOfWork,
};
use crate::config::RegistryConfig;
use crate::workflows::registry::citizens;
use crate::workflows::registry::{CitizenLookup, DerivedRecord};

/// Source of "now" for every timestamp the service writes.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Service composing the record store, account directory, blob store, and registry rules.
pub struct CivicApplicationService<S, D, B> {
    store: Arc<S>,
    directory: Arc<D>,
    blobs: Arc<B>,
    catalog: Arc<ServiceCatalog>,
    deriver: RecordDeriver,
    verifier: EligibilityVerifier,
    clock: Clock,
    rng: Mutex<StdRng>,
}

/// Result of filing an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub application: Application,
    pub confirmation: Option<ConfirmationRequest>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignOutcome {
    pub application: Application,
    pub history: ApplicationHistory,
    pub derivation: DerivationOutcome,
}

/// Application with everything recorded against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application: Application,
    pub service: Option<ServiceType>,
    pub history: Vec<ApplicationHistory>,
    pub attachments: Vec<Attachment>,
    pub confirmations: Vec<ConfirmationRequest>,
    pub records: Vec<DerivedRecord>,
}

/// Signed application of a derivable service kind that has no registry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationGap {
    pub application: Application,
    pub kind: ServiceKind,
    pub issues: Vec<DerivationIssue>,
}

/// Counterparty whose consent parks the application in `AwaitingConfirmation`.
struct PendingConsent {
    account: Account,
    kind: ConfirmationKind,
}

impl<S, D, B> CivicApplicationService<S, D, B>
where
    S: RecordStore + 'static,
    D: AccountDirectory + 'static,
    B: BlobStore + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, blobs: Arc<B>, config: RegistryConfig) -> Self {
        Self {
            store,
            directory,
            blobs,
            catalog: Arc::new(ServiceCatalog::standard()),
            deriver: RecordDeriver::new(config),
            verifier: EligibilityVerifier::default(),
            clock: Arc::new(Utc::now),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_catalog(mut self, catalog: ServiceCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_verifier(mut self, verifier: EligibilityVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Deterministic citizen id serials, for tests and demos.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// File a new application straight out of Draft.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<SubmissionReceipt, ApplicationServiceError> {
        let ApplicationSubmission {
            citizen_id,
            service_type_id,
            content,
            attachments,
        } = submission;
        ensure_actor(&citizen_id)?;
        let (kind, consent) = self.plan_submission(&citizen_id, service_type_id, &content)?;
        let now = self.now();

        let mut uploaded = Vec::new();
        let filed = (|| -> Result<SubmissionReceipt, ApplicationServiceError> {
            let mut uow = self.store.begin()?;
            let draft = uow.insert_application(Application::draft(
                citizen_id.clone(),
                service_type_id,
                content,
                now,
            ))?;
            self.store_attachments(uow.as_mut(), draft.id, kind, &attachments, &mut uploaded)?;
            let receipt = self.file(uow.as_mut(), draft, &citizen_id, consent, now)?;
            uow.commit()?;
            Ok(receipt)
        })();
        self.discard_uploads_on_error(filed, &uploaded)
    }

    /// Persist an application in Draft without starting review.
    pub fn save_draft(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<Application, ApplicationServiceError> {
        let ApplicationSubmission {
            citizen_id,
            service_type_id,
            content,
            attachments,
        } = submission;
        ensure_actor(&citizen_id)?;
        let kind = self.service_kind(service_type_id)?;
        validate_content(kind, &content)?;

        let mut uploaded = Vec::new();
        let saved = (|| -> Result<Application, ApplicationServiceError> {
            let mut uow = self.store.begin()?;
            let draft = uow.insert_application(Application::draft(
                citizen_id,
                service_type_id,
                content,
                self.now(),
            ))?;
            self.store_attachments(uow.as_mut(), draft.id, kind, &attachments, &mut uploaded)?;
            uow.commit()?;
            Ok(draft)
        })();
        let draft = self.discard_uploads_on_error(saved, &uploaded)?;

        info!(application = %draft.id, citizen = %draft.citizen_id, "draft saved");
        Ok(draft)
    }

    /// Replace a draft's form content. Only the owning citizen may edit it.
    pub fn amend_draft(
        &self,
        id: ApplicationId,
        actor: &ActorId,
        content: ContentDocument,
    ) -> Result<Application, ApplicationServiceError> {
        ensure_actor(actor)?;
        let mut uow = self.store.begin()?;
        let mut application = owned_application(uow.as_ref(), id, actor)?;
        validate_content(self.catalog.kind_of(application.service_type_id), &content)?;

        application.amend_content(content, self.now())?;
        uow.update_application(&application)?;
        uow.commit()?;
        Ok(application)
    }

    /// Submit a previously saved draft, with any attachments added at submission time.
    pub fn submit_draft(
        &self,
        id: ApplicationId,
        actor: &ActorId,
        attachments: Vec<UploadedFile>,
    ) -> Result<SubmissionReceipt, ApplicationServiceError> {
        ensure_actor(actor)?;
        let now = self.now();

        let mut uploaded = Vec::new();
        let filed = (|| -> Result<SubmissionReceipt, ApplicationServiceError> {
            let mut uow = self.store.begin()?;
            let draft = owned_application(uow.as_ref(), id, actor)?;
            if draft.status != ApplicationStatus::Draft {
                return Err(TransitionError::InvalidTransition {
                    from: draft.status,
                    event: "submit",
                }
                .into());
            }
            let (kind, consent) =
                self.plan_submission(actor, draft.service_type_id, draft.content())?;
            self.store_attachments(uow.as_mut(), draft.id, kind, &attachments, &mut uploaded)?;
            let receipt = self.file(uow.as_mut(), draft, actor, consent, now)?;
            uow.commit()?;
            Ok(receipt)
        })();
        self.discard_uploads_on_error(filed, &uploaded)
    }

    /// Official triage: move a submitted application to one of the review statuses.
    pub fn process(
        &self,
        id: ApplicationId,
        official: &ActorId,
        next: ApplicationStatus,
        note: Option<String>,
    ) -> Result<Application, ApplicationServiceError> {
        self.transition(id, official, LifecycleEvent::Process { next }, note)
    }

    /// Chairman signature. Record derivation runs in the same unit of work and never
    /// prevents the signature from committing.
    pub fn sign(
        &self,
        id: ApplicationId,
        chairman: &ActorId,
        note: Option<String>,
    ) -> Result<SignOutcome, ApplicationServiceError> {
        ensure_actor(chairman)?;
        let now = self.now();

        let mut uow = self.store.begin()?;
        let signed =
            lifecycle::advance(uow.as_mut(), id, &LifecycleEvent::Sign, chairman, note, now)?;
        let kind = self.catalog.kind_of(signed.application.service_type_id);

        let derivation = {
            // A poisoned generator still yields usable serials.
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.deriver.derive(
                uow.as_mut(),
                kind,
                DerivationContext {
                    application: &signed.application,
                    signer: chairman,
                    signed_at: signed.history.recorded_at,
                },
                &mut *rng,
            )
        };
        uow.commit()?;

        Ok(SignOutcome {
            application: signed.application,
            history: signed.history,
            derivation,
        })
    }

    pub fn reject(
        &self,
        id: ApplicationId,
        chairman: &ActorId,
        reason: &str,
    ) -> Result<Application, ApplicationServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApplicationServiceError::MissingReason);
        }
        self.transition(
            id,
            chairman,
            LifecycleEvent::Reject {
                reason: reason.to_string(),
            },
            None,
        )
    }

    pub fn complete(
        &self,
        id: ApplicationId,
        chairman: &ActorId,
    ) -> Result<Application, ApplicationServiceError> {
        self.transition(id, chairman, LifecycleEvent::Complete, None)
    }

    pub fn confirm(
        &self,
        id: ConfirmationId,
        actor: &ActorId,
    ) -> Result<Resolved, ApplicationServiceError> {
        self.resolve(id, actor, Resolution::Confirm)
    }

    pub fn decline_confirmation(
        &self,
        id: ConfirmationId,
        actor: &ActorId,
        reason: &str,
    ) -> Result<Resolved, ApplicationServiceError> {
        self.resolve(
            id,
            actor,
            Resolution::Reject {
                reason: reason.to_string(),
            },
        )
    }

    pub fn pending_confirmations(
        &self,
        actor: &ActorId,
    ) -> Result<Vec<ConfirmationRequest>, ApplicationServiceError> {
        ensure_actor(actor)?;
        let uow = self.store.begin()?;
        Ok(confirmation::pending_for(uow.as_ref(), actor)?)
    }

    /// Fetch an application and everything recorded against it.
    pub fn get(&self, id: ApplicationId) -> Result<ApplicationRecord, ApplicationServiceError> {
        let uow = self.store.begin()?;
        let application = uow
            .application(id)?
            .ok_or(ApplicationServiceError::NotFound(id))?;

        Ok(ApplicationRecord {
            service: self.catalog.get(application.service_type_id).cloned(),
            history: uow.history(id)?,
            attachments: uow.attachments(id)?,
            confirmations: uow.confirmations_for_application(id)?,
            records: uow.records_for_application(id)?,
            application,
        })
    }

    /// A citizen's own applications, newest first.
    pub fn applications_for(
        &self,
        citizen: &ActorId,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        ensure_actor(citizen)?;
        let mut owned = self.filtered(|application| &application.citizen_id == citizen)?;
        owned.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(owned)
    }

    /// Everything still moving through the pipeline, oldest first.
    pub fn official_inbox(&self) -> Result<Vec<Application>, ApplicationServiceError> {
        self.filtered(|application| {
            application.status != ApplicationStatus::Draft && !application.status.is_terminal()
        })
    }

    pub fn chairman_queue(&self) -> Result<Vec<Application>, ApplicationServiceError> {
        self.filtered(|application| application.status == ApplicationStatus::PendingApproval)
    }

    /// Resolve a spouse or landlord national id before the citizen submits.
    pub fn lookup_counterparty(
        &self,
        national_id: &str,
    ) -> Result<CitizenLookup, ApplicationServiceError> {
        let uow = self.store.begin()?;
        Ok(citizens::lookup(
            uow.as_ref(),
            self.directory.as_ref(),
            national_id,
        )?)
    }

    pub fn verify_marriage(
        &self,
        form: &MarriageForm,
    ) -> Result<EligibilityReport, ApplicationServiceError> {
        let request = MarriageEligibilityRequest::from_form(form);
        let uow = self.store.begin()?;
        Ok(self
            .verifier
            .marriage(uow.as_ref(), &request, self.now().date_naive())?)
    }

    pub fn verify_temporary_residence(
        &self,
        national_id: &str,
    ) -> Result<EligibilityReport, ApplicationServiceError> {
        let uow = self.store.begin()?;
        Ok(self.verifier.temporary_residence(
            uow.as_ref(),
            national_id,
            self.now().date_naive(),
        )?)
    }

    /// Signed or completed applications whose registry record is missing.
    pub fn derivation_audit(&self) -> Result<Vec<DerivationGap>, ApplicationServiceError> {
        let uow = self.store.begin()?;
        let mut gaps = Vec::new();

        for application in uow.applications()? {
            if !matches!(
                application.status,
                ApplicationStatus::Signed | ApplicationStatus::Completed
            ) {
                continue;
            }
            let Some(kind) = self
                .catalog
                .kind_of(application.service_type_id)
                .filter(|kind| DerivationHandler::for_kind(*kind).is_some())
            else {
                continue;
            };
            if !uow.records_for_application(application.id)?.is_empty() {
                continue;
            }

            gaps.push(DerivationGap {
                issues: uow.derivation_issues(application.id)?,
                application,
                kind,
            });
        }

        Ok(gaps)
    }

    fn transition(
        &self,
        id: ApplicationId,
        actor: &ActorId,
        event: LifecycleEvent,
        note: Option<String>,
    ) -> Result<Application, ApplicationServiceError> {
        ensure_actor(actor)?;
        let now = self.now();
        let mut uow = self.store.begin()?;
        let transitioned = lifecycle::advance(uow.as_mut(), id, &event, actor, note, now)?;
        uow.commit()?;
        Ok(transitioned.application)
    }

    fn resolve(
        &self,
        id: ConfirmationId,
        actor: &ActorId,
        resolution: Resolution,
    ) -> Result<Resolved, ApplicationServiceError> {
        ensure_actor(actor)?;
        let now = self.now();
        let mut uow = self.store.begin()?;
        let resolved = confirmation::resolve(uow.as_mut(), id, actor, resolution, now)?;
        uow.commit()?;

        info!(
            confirmation = %resolved.request.id,
            application = %resolved.request.application_id,
            status = %resolved.request.status,
            "confirmation resolved"
        );
        Ok(resolved)
    }

    fn filtered<F>(&self, keep: F) -> Result<Vec<Application>, ApplicationServiceError>
    where
        F: Fn(&Application) -> bool,
    {
        let uow = self.store.begin()?;
        Ok(uow
            .applications()?
            .into_iter()
            .filter(|application| keep(application))
            .collect())
    }

    fn service_kind(
        &self,
        service_type_id: ServiceTypeId,
    ) -> Result<Option<ServiceKind>, ApplicationServiceError> {
        self.catalog
            .get(service_type_id)
            .map(|service| service.kind)
            .ok_or(ApplicationServiceError::UnknownServiceType(service_type_id))
    }

    /// Decode the form and work out whether a counterparty has to consent first.
    fn plan_submission(
        &self,
        actor: &ActorId,
        service_type_id: ServiceTypeId,
        content: &ContentDocument,
    ) -> Result<(Option<ServiceKind>, Option<PendingConsent>), ApplicationServiceError> {
        let kind = self.service_kind(service_type_id)?;
        let form = validate_content(kind, content)?;

        let (Some(form), Some(confirmation_kind)) =
            (form, kind.and_then(ServiceKind::confirmation_kind))
        else {
            return Ok((kind, None));
        };
        let Some((national_id, _)) = form.counterparty() else {
            return Ok((kind, None));
        };

        let consent = self
            .directory
            .account_by_national_id(national_id)?
            .filter(|account| &account.user_id != actor)
            .map(|account| PendingConsent {
                account,
                kind: confirmation_kind,
            });
        Ok((kind, consent))
    }

    fn file(
        &self,
        uow: &mut dyn UnitOfWork,
        draft: Application,
        actor: &ActorId,
        consent: Option<PendingConsent>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, ApplicationServiceError> {
        let event = LifecycleEvent::Submit {
            awaiting_confirmation: consent.is_some(),
        };
        let submitted = lifecycle::record(uow, draft, &event, actor, None, now)?;

        let confirmation = match consent {
            Some(consent) => Some(confirmation::open(
                uow,
                OpenRequest {
                    application_id: submitted.application.id,
                    requester_id: actor,
                    target_user_id: &consent.account.user_id,
                    target_national_id: &consent.account.national_id,
                    kind: consent.kind,
                },
                now,
            )?),
            None => None,
        };

        Ok(SubmissionReceipt {
            attachments: uow.attachments(submitted.application.id)?,
            application: submitted.application,
            confirmation,
        })
    }

    fn store_attachments(
        &self,
        uow: &mut dyn UnitOfWork,
        id: ApplicationId,
        kind: Option<ServiceKind>,
        uploads: &[UploadedFile],
        uploaded: &mut Vec<String>,
    ) -> Result<Vec<Attachment>, ApplicationServiceError> {
        let document_type = kind
            .map(ServiceKind::document_type)
            .unwrap_or("SupportingDocument");
        let prefix = &self.deriver.config().upload_prefix;

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = stored_file_name(id, &upload.file_name);
            self.blobs.put(&name, &upload.bytes)?;
            uploaded.push(name.clone());
            let attachment = Attachment {
                application_id: id,
                file_name: upload.file_name.clone(),
                storage_path: format!("{prefix}/{name}"),
                document_type: document_type.to_string(),
            };
            uow.insert_attachment(attachment.clone())?;
            stored.push(attachment);
        }

        if !stored.is_empty() {
            info!(application = %id, count = stored.len(), "attachments stored");
        }
        Ok(stored)
    }

    /// Blobs are written before the unit of work commits; remove them when it does not.
    fn discard_uploads_on_error<T>(
        &self,
        result: Result<T, ApplicationServiceError>,
        uploaded: &[String],
    ) -> Result<T, ApplicationServiceError> {
        if result.is_err() {
            for name in uploaded {
                if let Err(error) = self.blobs.remove(name) {
                    warn!(blob = %name, %error, "orphaned attachment blob left in store");
                }
            }
        }
        result
    }
}

/// `<application id>_<random token>.<original extension>`.
fn stored_file_name(id: ApplicationId, original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string());
    format!("{}_{}.{extension}", id.0, Uuid::new_v4().simple())
}

fn ensure_actor(actor: &ActorId) -> Result<(), ApplicationServiceError> {
    if actor.is_blank() {
        return Err(ApplicationServiceError::InvalidActor);
    }
    Ok(())
}

fn validate_content(
    kind: Option<ServiceKind>,
    content: &ContentDocument,
) -> Result<Option<FormContent>, ContentError> {
    match kind {
        Some(kind) => FormContent::decode(kind, content).map(Some),
        None if content.as_value().is_object() => Ok(None),
        None => Err(ContentError::NotAnObject),
    }
}

fn owned_application(
    uow: &dyn UnitOfWork,
    id: ApplicationId,
    actor: &ActorId,
) -> Result<Application, ApplicationServiceError> {
    let application = uow
        .application(id)?
        .ok_or(ApplicationServiceError::NotFound(id))?;
    if &application.citizen_id != actor {
        warn!(application = %id, actor = %actor, "actor does not own application");
        return Err(ApplicationServiceError::NotOwner {
            application: id,
            actor: actor.clone(),
        });
    }
    Ok(application)
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("an actor id is required")]
    InvalidActor,
    #[error("service type {0} is not offered")]
    UnknownServiceType(ServiceTypeId),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("confirmation request {0} not found")]
    ConfirmationNotFound(ConfirmationId),
    #[error("application {application} does not belong to {actor}")]
    NotOwner {
        application: ApplicationId,
        actor: ActorId,
    },
    #[error("confirmation request {0} is addressed to another user")]
    NotConfirmationTarget(ConfirmationId),
    #[error("confirmation request {id} was already {status}")]
    AlreadyResolved {
        id: ConfirmationId,
        status: ConfirmationStatus,
    },
    #[error("application {0} already awaits this counterparty")]
    DuplicateConfirmation(ApplicationId),
    #[error("a reason is required")]
    MissingReason,
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LifecycleError> for ApplicationServiceError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::NotFound(id) => ApplicationServiceError::NotFound(id),
            LifecycleError::Transition(error) => ApplicationServiceError::Transition(error),
            LifecycleError::Repository(error) => ApplicationServiceError::Repository(error),
        }
    }
}

impl From<ConfirmationError> for ApplicationServiceError {
    fn from(error: ConfirmationError) -> Self {
        match error {
            ConfirmationError::NotFound(id) => ApplicationServiceError::ConfirmationNotFound(id),
            ConfirmationError::AlreadyResolved { id, status } => {
                ApplicationServiceError::AlreadyResolved { id, status }
            }
            ConfirmationError::NotTarget(id) => ApplicationServiceError::NotConfirmationTarget(id),
            ConfirmationError::DuplicatePending { application, .. } => {
                ApplicationServiceError::DuplicateConfirmation(application)
            }
            ConfirmationError::MissingReason => ApplicationServiceError::MissingReason,
            ConfirmationError::Lifecycle(error) => error.into(),
            ConfirmationError::Repository(error) => ApplicationServiceError::Repository(error),
        }
    }
}
