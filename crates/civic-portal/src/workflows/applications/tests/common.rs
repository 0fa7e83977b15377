use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};

use crate::config::RegistryConfig;
use crate::workflows::applications::confirmation::{ConfirmationId, ConfirmationRequest};
use crate::workflows::applications::repository::{
    Account, ApplicationStore, CitizenStore, ConfirmationStore, RecordLedger, RecordStore,
    RepositoryError, Savepoint, UnitOfWork,
};
use crate::workflows::applications::{
    application_router, ActorId, Application, ApplicationHistory, ApplicationId,
    ApplicationStatus, ApplicationSubmission, Attachment, CivicApplicationService, Clock,
    ContentDocument, DerivationIssue, MemoryAccounts, MemoryBlobs, MemoryStore, ServiceTypeId,
    UploadedFile,
};
use crate::workflows::registry::{
    BirthRecord, Citizen, CitizenId, DerivedRecord, MaritalStatus, MarriageRecord, NewCitizen,
    TemporaryResidence,
};

pub(super) type TestService = CivicApplicationService<MemoryStore, MemoryAccounts, MemoryBlobs>;

pub(super) const BIRTH: ServiceTypeId = ServiceTypeId(1);
pub(super) const MARRIAGE: ServiceTypeId = ServiceTypeId(2);
pub(super) const TEMPORARY_RESIDENCE: ServiceTypeId = ServiceTypeId(3);
pub(super) const RESIDENT_REGISTRATION: ServiceTypeId = ServiceTypeId(4);

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn today() -> NaiveDate {
    start().date_naive()
}

/// Each reading is one minute after the previous one.
pub(super) fn stepping_clock(from: DateTime<Utc>) -> Clock {
    let ticks = Arc::new(AtomicI64::new(0));
    Arc::new(move || from + Duration::minutes(ticks.fetch_add(1, Ordering::SeqCst)))
}

pub(super) fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

pub(super) fn citizen() -> ActorId {
    ActorId::new("citizen-an")
}

pub(super) fn official() -> ActorId {
    ActorId::new("official-binh")
}

pub(super) fn chairman() -> ActorId {
    ActorId::new("chairman-chi")
}

pub(super) struct Harness {
    pub(super) service: TestService,
    pub(super) store: Arc<MemoryStore>,
    pub(super) accounts: Arc<MemoryAccounts>,
    pub(super) blobs: Arc<MemoryBlobs>,
}

pub(super) fn build_service() -> Harness {
    build_service_with(RegistryConfig::default())
}

pub(super) fn build_service_with(config: RegistryConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let accounts = Arc::new(MemoryAccounts::default());
    let blobs = Arc::new(MemoryBlobs::default());
    let service = CivicApplicationService::new(
        store.clone(),
        accounts.clone(),
        blobs.clone(),
        config,
    )
    .with_clock(stepping_clock(start()))
    .with_rng_seed(42);

    Harness {
        service,
        store,
        accounts,
        blobs,
    }
}

pub(super) fn register_account(
    accounts: &MemoryAccounts,
    user_id: &str,
    national_id: &str,
    full_name: &str,
) {
    accounts
        .register(Account {
            user_id: ActorId::new(user_id),
            full_name: full_name.to_string(),
            national_id: national_id.to_string(),
            address: None,
        })
        .expect("account registered");
}

pub(super) fn new_citizen(national_id: &str, full_name: &str, gender: &str) -> NewCitizen {
    NewCitizen {
        national_id: national_id.to_string(),
        full_name: full_name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1995, 4, 12).expect("valid date"),
        gender: gender.to_string(),
        place_of_birth: "Ha Noi".to_string(),
        marital_status: MaritalStatus::Single,
        household_ref: None,
        father: None,
        mother: None,
    }
}

pub(super) fn seed_citizen(store: &MemoryStore, citizen: NewCitizen) -> Citizen {
    let mut uow = store.begin().expect("begin");
    let created = uow.insert_citizen(citizen).expect("citizen inserted");
    uow.commit().expect("commit");
    created
}

/// Run a read against a fresh unit of work.
pub(super) fn read<T>(store: &MemoryStore, f: impl FnOnce(&dyn UnitOfWork) -> T) -> T {
    let uow = store.begin().expect("begin");
    f(uow.as_ref())
}

fn submission(service_type_id: ServiceTypeId, content: Value) -> ApplicationSubmission {
    ApplicationSubmission {
        citizen_id: citizen(),
        service_type_id,
        content: ContentDocument::from_value(content),
        attachments: Vec::new(),
    }
}

pub(super) fn marriage_submission(
    applicant_cccd: &str,
    spouse_cccd: &str,
) -> ApplicationSubmission {
    submission(
        MARRIAGE,
        json!({
            "ApplicantName": "Nguyen Van An",
            "ApplicantCCCD": applicant_cccd,
            "ApplicantDOB": "1994-08-20",
            "ApplicantGender": "Nam",
            "ApplicantAddress": "12 Hang Bac, Hoan Kiem, Ha Noi",
            "SpouseName": "Tran Thi Binh",
            "SpouseCCCD": spouse_cccd,
            "SpouseDOB": "1996-02-14",
            "SpouseGender": "Nữ",
            "SpouseAddress": "5 Ly Thai To, Hoan Kiem, Ha Noi",
            "SubmittedAt": "2026-03-10T09:00:00Z",
        }),
    )
}

pub(super) fn birth_submission(
    gender: &str,
    father_cccd: &str,
    mother_cccd: &str,
) -> ApplicationSubmission {
    submission(
        BIRTH,
        json!({
            "ChildFullName": "Nguyen Minh Khang",
            "DateOfBirth": "2026-02-01",
            "PlaceOfBirth": "Benh vien Phu san Ha Noi",
            "Gender": gender,
            "FatherName": "Nguyen Van An",
            "FatherCCCD": father_cccd,
            "MotherName": "Tran Thi Binh",
            "MotherCCCD": mother_cccd,
        }),
    )
}

pub(super) fn residence_submission(
    owner_cccd: &str,
    start: &str,
    end: &str,
) -> ApplicationSubmission {
    submission(
        TEMPORARY_RESIDENCE,
        json!({
            "RegistrationType": "New",
            "ApplicantName": "Le Van Cuong",
            "ApplicantCCCD": "001099000123",
            "ApplicantPhone": "0912345678",
            "Province": "Ha Noi",
            "District": "Cau Giay",
            "Ward": "Dich Vong",
            "AddressDetail": "18 Tran Thai Tong",
            "StartDate": start,
            "EndDate": end,
            "OwnerName": "Pham Thi Dung",
            "OwnerCCCD": owner_cccd,
            "OwnerPhone": "0987654321",
        }),
    )
}

pub(super) fn resident_submission() -> ApplicationSubmission {
    submission(
        RESIDENT_REGISTRATION,
        json!({
            "FullName": "Hoang Van Em",
            "DOB": "1990-01-01",
            "Gender": "Nam",
            "CCCD": "001090000555",
            "Address": "7 Kim Ma, Ba Dinh, Ha Noi",
            "Relationship": "Con",
            "HouseholdOwner": "Hoang Van Phuc",
        }),
    )
}

pub(super) fn upload(file_name: &str) -> UploadedFile {
    UploadedFile {
        file_name: file_name.to_string(),
        bytes: b"%PDF-1.7 scan".to_vec(),
    }
}

/// Drive a submitted application through review into the chairman's queue.
pub(super) fn approve_for_signing(service: &TestService, id: ApplicationId) {
    service
        .process(id, &official(), ApplicationStatus::InReview, None)
        .expect("moved to review");
    service
        .process(id, &official(), ApplicationStatus::PendingApproval, None)
        .expect("moved to chairman");
}

/// Submit, review, and sign; returns the signed application id.
pub(super) fn submit_and_sign(
    harness: &Harness,
    submission: ApplicationSubmission,
) -> ApplicationId {
    let receipt = harness.service.submit(submission).expect("submission succeeds");
    let id = receipt.application.id;
    approve_for_signing(&harness.service, id);
    harness
        .service
        .sign(id, &chairman(), None)
        .expect("signature commits");
    id
}

/// Store whose transactions can never start.
pub(super) struct UnavailableStore;

impl RecordStore for UnavailableStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Memory store whose citizen inserts and derivation issue writes fail.
#[derive(Default)]
pub(super) struct RegistryOutageStore {
    pub(super) inner: MemoryStore,
}

impl RecordStore for RegistryOutageStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError> {
        Ok(Box::new(RegistryOutageUnit {
            inner: self.inner.begin()?,
        }))
    }
}

struct RegistryOutageUnit<'a> {
    inner: Box<dyn UnitOfWork + 'a>,
}

fn registry_offline() -> RepositoryError {
    RepositoryError::Unavailable("registry offline".to_string())
}

impl ApplicationStore for RegistryOutageUnit<'_> {
    fn insert_application(
        &mut self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        self.inner.insert_application(application)
    }
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.application(id)
    }
    fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError> {
        self.inner.update_application(application)
    }
    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications()
    }
    fn append_history(&mut self, entry: ApplicationHistory) -> Result<(), RepositoryError> {
        self.inner.append_history(entry)
    }
    fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>, RepositoryError> {
        self.inner.history(id)
    }
    fn insert_attachment(&mut self, attachment: Attachment) -> Result<(), RepositoryError> {
        self.inner.insert_attachment(attachment)
    }
    fn attachments(&self, id: ApplicationId) -> Result<Vec<Attachment>, RepositoryError> {
        self.inner.attachments(id)
    }
}

impl CitizenStore for RegistryOutageUnit<'_> {
    fn citizen(&self, id: CitizenId) -> Result<Option<Citizen>, RepositoryError> {
        self.inner.citizen(id)
    }
    fn citizen_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Citizen>, RepositoryError> {
        self.inner.citizen_by_national_id(national_id)
    }
    fn insert_citizen(&mut self, _citizen: NewCitizen) -> Result<Citizen, RepositoryError> {
        Err(registry_offline())
    }
    fn update_citizen(&mut self, citizen: &Citizen) -> Result<(), RepositoryError> {
        self.inner.update_citizen(citizen)
    }
}

impl RecordLedger for RegistryOutageUnit<'_> {
    fn insert_birth_record(&mut self, record: BirthRecord) -> Result<(), RepositoryError> {
        self.inner.insert_birth_record(record)
    }
    fn birth_records(&self) -> Result<Vec<BirthRecord>, RepositoryError> {
        self.inner.birth_records()
    }
    fn insert_marriage_record(&mut self, record: MarriageRecord) -> Result<(), RepositoryError> {
        self.inner.insert_marriage_record(record)
    }
    fn marriages_of(&self, citizen: CitizenId) -> Result<Vec<MarriageRecord>, RepositoryError> {
        self.inner.marriages_of(citizen)
    }
    fn insert_temporary_residence(
        &mut self,
        record: TemporaryResidence,
    ) -> Result<(), RepositoryError> {
        self.inner.insert_temporary_residence(record)
    }
    fn residences_of(
        &self,
        national_id: &str,
    ) -> Result<Vec<TemporaryResidence>, RepositoryError> {
        self.inner.residences_of(national_id)
    }
    fn records_for_application(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<DerivedRecord>, RepositoryError> {
        self.inner.records_for_application(id)
    }
    fn record_derivation_issue(&mut self, _issue: DerivationIssue) -> Result<(), RepositoryError> {
        Err(registry_offline())
    }
    fn derivation_issues(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<DerivationIssue>, RepositoryError> {
        self.inner.derivation_issues(id)
    }
}

impl ConfirmationStore for RegistryOutageUnit<'_> {
    fn insert_confirmation(
        &mut self,
        request: ConfirmationRequest,
    ) -> Result<ConfirmationRequest, RepositoryError> {
        self.inner.insert_confirmation(request)
    }
    fn confirmation(
        &self,
        id: ConfirmationId,
    ) -> Result<Option<ConfirmationRequest>, RepositoryError> {
        self.inner.confirmation(id)
    }
    fn update_confirmation(
        &mut self,
        request: &ConfirmationRequest,
    ) -> Result<(), RepositoryError> {
        self.inner.update_confirmation(request)
    }
    fn confirmations_for_application(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmationRequest>, RepositoryError> {
        self.inner.confirmations_for_application(id)
    }
    fn confirmations_for_target(
        &self,
        target: &ActorId,
    ) -> Result<Vec<ConfirmationRequest>, RepositoryError> {
        self.inner.confirmations_for_target(target)
    }
}

impl UnitOfWork for RegistryOutageUnit<'_> {
    fn savepoint(&mut self) -> Savepoint {
        self.inner.savepoint()
    }
    fn rollback_to(&mut self, savepoint: Savepoint) {
        self.inner.rollback_to(savepoint)
    }
    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.inner.commit()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn application_router_with_service(service: TestService) -> axum::Router {
    application_router(Arc::new(service))
}
