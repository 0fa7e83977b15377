//! End-to-end scenarios for citizen applications, driven through the public service facade and
//! HTTP router: consent, review, signature, and the registry records signing produces.

mod common {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use civic_portal::config::RegistryConfig;
    use civic_portal::workflows::applications::{
        Account, ActorId, ApplicationId, ApplicationStatus, ApplicationSubmission,
        CivicApplicationService, ContentDocument, MemoryAccounts, MemoryBlobs, MemoryStore,
        ServiceTypeId,
    };

    pub(super) type Service = CivicApplicationService<MemoryStore, MemoryAccounts, MemoryBlobs>;

    pub(super) struct Portal {
        pub(super) service: Arc<Service>,
        pub(super) store: Arc<MemoryStore>,
        pub(super) accounts: Arc<MemoryAccounts>,
    }

    pub(super) fn portal() -> Portal {
        let store = Arc::new(MemoryStore::new());
        let accounts = Arc::new(MemoryAccounts::default());
        let opened = Utc
            .with_ymd_and_hms(2026, 5, 4, 8, 30, 0)
            .single()
            .expect("valid timestamp");
        let ticks = Arc::new(AtomicI64::new(0));
        let service = CivicApplicationService::new(
            store.clone(),
            accounts.clone(),
            Arc::new(MemoryBlobs::default()),
            RegistryConfig::default(),
        )
        .with_clock(Arc::new(move || {
            opened + Duration::minutes(ticks.fetch_add(1, Ordering::SeqCst))
        }))
        .with_rng_seed(2026);

        Portal {
            service: Arc::new(service),
            store,
            accounts,
        }
    }

    pub(super) fn register(portal: &Portal, user_id: &str, national_id: &str, name: &str) {
        portal
            .accounts
            .register(Account {
                user_id: ActorId::new(user_id),
                full_name: name.to_string(),
                national_id: national_id.to_string(),
                address: None,
            })
            .expect("account registered");
    }

    pub(super) fn marriage(citizen: &str) -> ApplicationSubmission {
        ApplicationSubmission {
            citizen_id: ActorId::new(citizen),
            service_type_id: ServiceTypeId(2),
            content: ContentDocument::from_value(json!({
                "ApplicantName": "Vu Quang Hai",
                "ApplicantCCCD": "001093004411",
                "ApplicantDOB": "1993-11-02",
                "ApplicantGender": "Nam",
                "SpouseName": "Do Thu Ha",
                "SpouseCCCD": "001097005522",
                "SpouseDOB": "1997-06-30",
                "SpouseGender": "Nữ",
            })),
            attachments: Vec::new(),
        }
    }

    pub(super) fn birth(citizen: &str) -> ApplicationSubmission {
        ApplicationSubmission {
            citizen_id: ActorId::new(citizen),
            service_type_id: ServiceTypeId(1),
            content: ContentDocument::from_value(json!({
                "ChildFullName": "Vu Minh Anh",
                "DateOfBirth": "2026-04-20",
                "PlaceOfBirth": "Benh vien Bach Mai",
                "Gender": "Nữ",
                "FatherName": "Vu Quang Hai",
                "FatherCCCD": "001093004411",
                "MotherName": "Do Thu Ha",
                "MotherCCCD": "001097005522",
            })),
            attachments: Vec::new(),
        }
    }

    pub(super) fn residence(citizen: &str) -> ApplicationSubmission {
        ApplicationSubmission {
            citizen_id: ActorId::new(citizen),
            service_type_id: ServiceTypeId(3),
            content: ContentDocument::from_value(json!({
                "RegistrationType": "Extend",
                "ApplicantName": "Vu Quang Hai",
                "ApplicantCCCD": "001093004411",
                "FullAddress": "22 Nguyen Chi Thanh, Lang Thuong, Dong Da, Ha Noi",
                "StartDate": "2026-06-01",
                "EndDate": "2027-06-01",
                "OwnerName": "Bui Van Long",
                "OwnerCCCD": "001060007733",
            })),
            attachments: Vec::new(),
        }
    }

    pub(super) fn review_and_sign(service: &Service, id: ApplicationId) {
        let official = ActorId::new("official-lan");
        service
            .process(id, &official, ApplicationStatus::InReview, None)
            .expect("in review");
        service
            .process(id, &official, ApplicationStatus::PendingApproval, None)
            .expect("pending approval");
        service
            .sign(id, &ActorId::new("chairman-tuan"), None)
            .expect("signed");
    }
}

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use civic_portal::workflows::applications::repository::{CitizenStore, RecordLedger};
use civic_portal::workflows::applications::{
    application_router, ActorId, ApplicationStatus, ConfirmationStatus, DerivationOutcome,
    RecordStore, ACTOR_HEADER,
};
use civic_portal::workflows::registry::{DerivedRecord, MaritalStatus, RegistrationType};

use common::*;

#[test]
fn family_registrations_build_on_each_other() {
    let portal = portal();
    register(&portal, "citizen-ha", "001097005522", "Do Thu Ha");
    let service = &portal.service;

    let receipt = service.submit(marriage("citizen-hai")).expect("submitted");
    assert_eq!(
        receipt.application.status,
        ApplicationStatus::AwaitingConfirmation
    );
    let request = receipt.confirmation.expect("spouse asked to confirm");
    let resolved = service
        .confirm(request.id, &ActorId::new("citizen-ha"))
        .expect("spouse confirmed");
    assert_eq!(resolved.request.status, ConfirmationStatus::Confirmed);

    let marriage_id = receipt.application.id;
    review_and_sign(service, marriage_id);

    let birth_id = service
        .submit(birth("citizen-hai"))
        .expect("submitted")
        .application
        .id;
    review_and_sign(service, birth_id);
    service
        .complete(birth_id, &ActorId::new("chairman-tuan"))
        .expect("completed");

    let marriage_record = service.get(marriage_id).expect("detail").records;
    let birth_detail = service.get(birth_id).expect("detail");
    assert_eq!(birth_detail.application.status, ApplicationStatus::Completed);

    match (marriage_record.as_slice(), birth_detail.records.as_slice()) {
        ([DerivedRecord::Marriage(marriage)], [DerivedRecord::Birth(birth)]) => {
            assert!(birth.parents_marriage_verified);
            assert_eq!(
                birth.parents_marriage.as_deref(),
                Some(marriage.registration_number.as_str())
            );
            assert_eq!(birth.father, Some(marriage.spouse1));
            assert_eq!(birth.mother, Some(marriage.spouse2));
            assert!(birth.generated_citizen_id.starts_with("001126"));
            assert_eq!(birth.registration_number, format!("KS-2026-{:06}", birth_id.0));
        }
        other => panic!("unexpected registry records: {other:?}"),
    }

    let uow = portal.store.begin().expect("begin");
    let husband = uow
        .citizen_by_national_id("001093004411")
        .expect("lookup")
        .expect("registered at signing");
    assert_eq!(husband.marital_status, MaritalStatus::Married);
    assert_eq!(uow.marriages_of(husband.id).expect("ledger").len(), 1);
    drop(uow);

    let history = service.get(marriage_id).expect("detail").history;
    let statuses: Vec<_> = history.iter().map(|entry| entry.status).collect();
    assert_eq!(
        statuses,
        vec![
            ApplicationStatus::AwaitingConfirmation,
            ApplicationStatus::Submitted,
            ApplicationStatus::InReview,
            ApplicationStatus::PendingApproval,
            ApplicationStatus::Signed,
        ]
    );
}

#[test]
fn a_declining_landlord_ends_the_residence_application() {
    let portal = portal();
    register(&portal, "landlord-long", "001060007733", "Bui Van Long");
    let service = &portal.service;

    let receipt = service.submit(residence("citizen-hai")).expect("submitted");
    let request = receipt.confirmation.expect("landlord asked to confirm");
    service
        .decline_confirmation(
            request.id,
            &ActorId::new("landlord-long"),
            "The room is no longer available",
        )
        .expect("declined");

    let detail = service.get(receipt.application.id).expect("detail");
    assert_eq!(detail.application.status, ApplicationStatus::Rejected);
    assert_eq!(detail.confirmations[0].status, ConfirmationStatus::Rejected);
    assert!(service
        .sign(receipt.application.id, &ActorId::new("chairman-tuan"), None)
        .is_err());
    assert!(detail.records.is_empty());
}

#[test]
fn residence_records_carry_the_declared_stay() {
    let portal = portal();
    let service = &portal.service;

    let id = service
        .submit(residence("citizen-hai"))
        .expect("submitted")
        .application
        .id;
    assert_eq!(
        service.get(id).expect("detail").application.status,
        ApplicationStatus::Submitted
    );
    review_and_sign(service, id);

    match service.get(id).expect("detail").records.as_slice() {
        [DerivedRecord::TemporaryResidence(residence)] => {
            assert_eq!(residence.registration_type, RegistrationType::Extend);
            assert_eq!(
                residence.address,
                "22 Nguyen Chi Thanh, Lang Thuong, Dong Da, Ha Noi"
            );
            assert_eq!(residence.end_date.to_string(), "2027-06-01");
        }
        other => panic!("unexpected registry records: {other:?}"),
    }

    let report = service
        .verify_temporary_residence("001093004411")
        .expect("report");
    assert!(!report.all_passed);
    assert!(service.derivation_audit().expect("audit").is_empty());
}

#[test]
fn sign_outcome_reports_the_derivation() {
    let portal = portal();
    let service = &portal.service;
    let id = service
        .submit(marriage("citizen-hai"))
        .expect("submitted")
        .application
        .id;
    let official = ActorId::new("official-lan");
    service
        .process(id, &official, ApplicationStatus::InReview, None)
        .expect("in review");
    service
        .process(id, &official, ApplicationStatus::PendingApproval, None)
        .expect("pending approval");

    let outcome = service
        .sign(id, &ActorId::new("chairman-tuan"), Some("Approved".to_string()))
        .expect("signed");
    assert_eq!(outcome.history.note, "Approved");
    assert!(matches!(
        outcome.derivation,
        DerivationOutcome::Derived {
            record: DerivedRecord::Marriage(_)
        }
    ));
}

async fn call(
    router: &axum::Router,
    method: Method,
    uri: &str,
    actor: &str,
    body: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(ACTOR_HEADER, actor)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn drafts_flow_through_the_http_surface() {
    let portal = portal();
    let router = application_router(portal.service.clone());

    let draft = serde_json::to_value(birth("citizen-hai")).expect("serializable");
    let (status, saved) = call(
        &router,
        Method::POST,
        "/api/v1/applications/drafts",
        "citizen-hai",
        draft,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved["status"], json!("Draft"));
    let id = saved["id"].as_u64().expect("id");

    let (status, _) = call(
        &router,
        Method::PUT,
        &format!("/api/v1/applications/{id}/content"),
        "someone-else",
        json!({ "ChildFullName": "Vu Minh Chau" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, amended) = call(
        &router,
        Method::PUT,
        &format!("/api/v1/applications/{id}/content"),
        "citizen-hai",
        json!({ "ChildFullName": "Vu Minh Chau", "Gender": "Nữ" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amended["content"]["ChildFullName"], json!("Vu Minh Chau"));

    let (status, submitted) = call(
        &router,
        Method::POST,
        &format!("/api/v1/applications/{id}/submit"),
        "citizen-hai",
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(submitted["application"]["status"], json!("Submitted"));

    let (status, inbox) = call(
        &router,
        Method::GET,
        "/api/v1/official/inbox",
        "official-lan",
        json!(null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox.as_array().map(Vec::len), Some(1));

    let (status, rejected) = call(
        &router,
        Method::POST,
        &format!("/api/v1/applications/{id}/process"),
        "official-lan",
        json!({ "status": "Rejected", "note": "Hospital certificate missing" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["reject_reason"], json!("Hospital certificate missing"));

    let (status, _) = call(
        &router,
        Method::POST,
        &format!("/api/v1/applications/{id}/reject"),
        "chairman-tuan",
        json!({ "reason": "again" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
