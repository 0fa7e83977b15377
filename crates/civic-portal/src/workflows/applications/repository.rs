use serde::{Deserialize, Serialize};

use super::confirmation::{ConfirmationId, ConfirmationRequest};
use super::derivation::DerivationIssue;
use super::domain::{ActorId, Application, ApplicationHistory, ApplicationId, Attachment};
use crate::workflows::registry::{
    BirthRecord, Citizen, CitizenId, DerivedRecord, MarriageRecord, NewCitizen,
    TemporaryResidence,
};

/// Error enumeration for record store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Marker returned by [`UnitOfWork::savepoint`]; rolling back discards later writes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(usize);

impl Savepoint {
    pub fn new(depth: usize) -> Self {
        Self(depth)
    }

    pub fn depth(self) -> usize {
        self.0
    }
}

pub trait ApplicationStore {
    /// Persist a new application; the store assigns its id.
    fn insert_application(
        &mut self,
        application: Application,
    ) -> Result<Application, RepositoryError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError>;
    fn applications(&self) -> Result<Vec<Application>, RepositoryError>;
    fn append_history(&mut self, entry: ApplicationHistory) -> Result<(), RepositoryError>;
    fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>, RepositoryError>;
    fn insert_attachment(&mut self, attachment: Attachment) -> Result<(), RepositoryError>;
    fn attachments(&self, id: ApplicationId) -> Result<Vec<Attachment>, RepositoryError>;
}

pub trait CitizenStore {
    fn citizen(&self, id: CitizenId) -> Result<Option<Citizen>, RepositoryError>;
    fn citizen_by_national_id(&self, national_id: &str)
        -> Result<Option<Citizen>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the national id is already registered.
    fn insert_citizen(&mut self, citizen: NewCitizen) -> Result<Citizen, RepositoryError>;
    fn update_citizen(&mut self, citizen: &Citizen) -> Result<(), RepositoryError>;
}

/// Civil registry records; registration numbers are unique per record type.
pub trait RecordLedger {
    fn insert_birth_record(&mut self, record: BirthRecord) -> Result<(), RepositoryError>;
    fn birth_records(&self) -> Result<Vec<BirthRecord>, RepositoryError>;
    fn insert_marriage_record(&mut self, record: MarriageRecord) -> Result<(), RepositoryError>;
    fn marriages_of(&self, citizen: CitizenId) -> Result<Vec<MarriageRecord>, RepositoryError>;
    fn insert_temporary_residence(
        &mut self,
        record: TemporaryResidence,
    ) -> Result<(), RepositoryError>;
    fn residences_of(&self, national_id: &str)
        -> Result<Vec<TemporaryResidence>, RepositoryError>;
    fn records_for_application(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<DerivedRecord>, RepositoryError>;
    fn record_derivation_issue(&mut self, issue: DerivationIssue) -> Result<(), RepositoryError>;
    fn derivation_issues(&self, id: ApplicationId)
        -> Result<Vec<DerivationIssue>, RepositoryError>;
}

pub trait ConfirmationStore {
    /// Persist a new request; the store assigns its id.
    fn insert_confirmation(
        &mut self,
        request: ConfirmationRequest,
    ) -> Result<ConfirmationRequest, RepositoryError>;
    fn confirmation(
        &self,
        id: ConfirmationId,
    ) -> Result<Option<ConfirmationRequest>, RepositoryError>;
    fn update_confirmation(&mut self, request: &ConfirmationRequest)
        -> Result<(), RepositoryError>;
    fn confirmations_for_application(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmationRequest>, RepositoryError>;
    fn confirmations_for_target(
        &self,
        target: &ActorId,
    ) -> Result<Vec<ConfirmationRequest>, RepositoryError>;
}

/// One transaction against the record store. Dropping without `commit` rolls back.
pub trait UnitOfWork: ApplicationStore + CitizenStore + RecordLedger + ConfirmationStore {
    fn savepoint(&mut self) -> Savepoint;
    fn rollback_to(&mut self, savepoint: Savepoint);
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait RecordStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError>;
}

/// A registered portal account, owned by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: ActorId,
    pub full_name: String,
    pub national_id: String,
    pub address: Option<String>,
}

/// Resolves national ids to portal accounts.
pub trait AccountDirectory: Send + Sync {
    fn account_by_national_id(&self, national_id: &str)
        -> Result<Option<Account>, RepositoryError>;
}

/// Attachment storage collaborator.
pub trait BlobStore: Send + Sync {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError>;
    /// Removing a missing blob is not an error.
    fn remove(&self, name: &str) -> Result<(), BlobError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error("blob {0} already exists")]
    Exists(String),
}
