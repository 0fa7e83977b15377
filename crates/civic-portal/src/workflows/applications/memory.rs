//! In-memory record store, account directory and blob store.
//!
//! A unit of work holds the store mutex until it commits or drops, so transactions are fully
//! serialized. Writes go to a private copy of the state that replaces the shared one on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::confirmation::{ConfirmationId, ConfirmationRequest};
use super::derivation::DerivationIssue;
use super::domain::{ActorId, Application, ApplicationHistory, ApplicationId, Attachment};
use super::repository::{
    Account, AccountDirectory, ApplicationStore, BlobError, BlobStore, CitizenStore,
    ConfirmationStore, RecordLedger, RecordStore, RepositoryError, Savepoint, UnitOfWork,
};
use crate::workflows::registry::{
    BirthRecord, Citizen, CitizenId, DerivedRecord, MarriageRecord, NewCitizen,
    TemporaryResidence,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    last_application: u64,
    last_citizen: u64,
    last_confirmation: u64,
    applications: BTreeMap<ApplicationId, Application>,
    history: Vec<ApplicationHistory>,
    attachments: Vec<Attachment>,
    citizens: BTreeMap<CitizenId, Citizen>,
    births: Vec<BirthRecord>,
    marriages: Vec<MarriageRecord>,
    residences: Vec<TemporaryResidence>,
    issues: Vec<DerivationIssue>,
    confirmations: BTreeMap<ConfirmationId, ConfirmationRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, RepositoryError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("record store mutex poisoned".to_string()))?;
        let working = guard.clone();
        Ok(Box::new(MemoryUnit {
            guard,
            working,
            savepoints: Vec::new(),
        }))
    }
}

struct MemoryUnit<'a> {
    guard: MutexGuard<'a, StoreState>,
    working: StoreState,
    savepoints: Vec<StoreState>,
}

impl ApplicationStore for MemoryUnit<'_> {
    fn insert_application(
        &mut self,
        mut application: Application,
    ) -> Result<Application, RepositoryError> {
        self.working.last_application += 1;
        application.id = ApplicationId(self.working.last_application);
        self.working
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.working.applications.get(&id).cloned())
    }

    fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError> {
        match self.working.applications.get_mut(&application.id) {
            Some(stored) => {
                *stored = application.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.working.applications.values().cloned().collect())
    }

    fn append_history(&mut self, entry: ApplicationHistory) -> Result<(), RepositoryError> {
        if !self.working.applications.contains_key(&entry.application_id) {
            return Err(RepositoryError::NotFound);
        }
        self.working.history.push(entry);
        Ok(())
    }

    fn history(&self, id: ApplicationId) -> Result<Vec<ApplicationHistory>, RepositoryError> {
        Ok(self
            .working
            .history
            .iter()
            .filter(|entry| entry.application_id == id)
            .cloned()
            .collect())
    }

    fn insert_attachment(&mut self, attachment: Attachment) -> Result<(), RepositoryError> {
        self.working.attachments.push(attachment);
        Ok(())
    }

    fn attachments(&self, id: ApplicationId) -> Result<Vec<Attachment>, RepositoryError> {
        Ok(self
            .working
            .attachments
            .iter()
            .filter(|attachment| attachment.application_id == id)
            .cloned()
            .collect())
    }
}

impl CitizenStore for MemoryUnit<'_> {
    fn citizen(&self, id: CitizenId) -> Result<Option<Citizen>, RepositoryError> {
        Ok(self.working.citizens.get(&id).cloned())
    }

    fn citizen_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Citizen>, RepositoryError> {
        Ok(self
            .working
            .citizens
            .values()
            .find(|citizen| citizen.national_id == national_id)
            .cloned())
    }

    fn insert_citizen(&mut self, citizen: NewCitizen) -> Result<Citizen, RepositoryError> {
        if self.citizen_by_national_id(&citizen.national_id)?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "citizen national id {}",
                citizen.national_id
            )));
        }
        self.working.last_citizen += 1;
        let created = citizen.into_citizen(CitizenId(self.working.last_citizen));
        self.working.citizens.insert(created.id, created.clone());
        Ok(created)
    }

    fn update_citizen(&mut self, citizen: &Citizen) -> Result<(), RepositoryError> {
        match self.working.citizens.get_mut(&citizen.id) {
            Some(stored) => {
                *stored = citizen.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

fn ensure_unique<'r, I>(numbers: I, candidate: &str) -> Result<(), RepositoryError>
where
    I: IntoIterator<Item = &'r String>,
{
    if numbers.into_iter().any(|number| number == candidate) {
        return Err(RepositoryError::Conflict(format!(
            "registration number {candidate}"
        )));
    }
    Ok(())
}

impl RecordLedger for MemoryUnit<'_> {
    fn insert_birth_record(&mut self, record: BirthRecord) -> Result<(), RepositoryError> {
        ensure_unique(
            self.working.births.iter().map(|r| &r.registration_number),
            &record.registration_number,
        )?;
        self.working.births.push(record);
        Ok(())
    }

    fn birth_records(&self) -> Result<Vec<BirthRecord>, RepositoryError> {
        Ok(self.working.births.clone())
    }

    fn insert_marriage_record(&mut self, record: MarriageRecord) -> Result<(), RepositoryError> {
        ensure_unique(
            self.working.marriages.iter().map(|r| &r.registration_number),
            &record.registration_number,
        )?;
        self.working.marriages.push(record);
        Ok(())
    }

    fn marriages_of(&self, citizen: CitizenId) -> Result<Vec<MarriageRecord>, RepositoryError> {
        Ok(self
            .working
            .marriages
            .iter()
            .filter(|marriage| marriage.involves(citizen))
            .cloned()
            .collect())
    }

    fn insert_temporary_residence(
        &mut self,
        record: TemporaryResidence,
    ) -> Result<(), RepositoryError> {
        ensure_unique(
            self.working.residences.iter().map(|r| &r.registration_number),
            &record.registration_number,
        )?;
        self.working.residences.push(record);
        Ok(())
    }

    fn residences_of(
        &self,
        national_id: &str,
    ) -> Result<Vec<TemporaryResidence>, RepositoryError> {
        Ok(self
            .working
            .residences
            .iter()
            .filter(|residence| residence.citizen_national_id == national_id)
            .cloned()
            .collect())
    }

    fn records_for_application(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<DerivedRecord>, RepositoryError> {
        let births = self.working.births.iter().cloned().map(DerivedRecord::Birth);
        let marriages = self
            .working
            .marriages
            .iter()
            .cloned()
            .map(DerivedRecord::Marriage);
        let residences = self
            .working
            .residences
            .iter()
            .cloned()
            .map(DerivedRecord::TemporaryResidence);

        Ok(births
            .chain(marriages)
            .chain(residences)
            .filter(|record| record.source_application() == id)
            .collect())
    }

    fn record_derivation_issue(&mut self, issue: DerivationIssue) -> Result<(), RepositoryError> {
        self.working.issues.push(issue);
        Ok(())
    }

    fn derivation_issues(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<DerivationIssue>, RepositoryError> {
        Ok(self
            .working
            .issues
            .iter()
            .filter(|issue| issue.application_id == id)
            .cloned()
            .collect())
    }
}

impl ConfirmationStore for MemoryUnit<'_> {
    fn insert_confirmation(
        &mut self,
        mut request: ConfirmationRequest,
    ) -> Result<ConfirmationRequest, RepositoryError> {
        self.working.last_confirmation += 1;
        request.id = ConfirmationId(self.working.last_confirmation);
        self.working
            .confirmations
            .insert(request.id, request.clone());
        Ok(request)
    }

    fn confirmation(
        &self,
        id: ConfirmationId,
    ) -> Result<Option<ConfirmationRequest>, RepositoryError> {
        Ok(self.working.confirmations.get(&id).cloned())
    }

    fn update_confirmation(
        &mut self,
        request: &ConfirmationRequest,
    ) -> Result<(), RepositoryError> {
        match self.working.confirmations.get_mut(&request.id) {
            Some(stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn confirmations_for_application(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<ConfirmationRequest>, RepositoryError> {
        Ok(self
            .working
            .confirmations
            .values()
            .filter(|request| request.application_id == id)
            .cloned()
            .collect())
    }

    fn confirmations_for_target(
        &self,
        target: &ActorId,
    ) -> Result<Vec<ConfirmationRequest>, RepositoryError> {
        Ok(self
            .working
            .confirmations
            .values()
            .filter(|request| &request.target_user_id == target)
            .cloned()
            .collect())
    }
}

impl UnitOfWork for MemoryUnit<'_> {
    fn savepoint(&mut self) -> Savepoint {
        self.savepoints.push(self.working.clone());
        Savepoint::new(self.savepoints.len() - 1)
    }

    fn rollback_to(&mut self, savepoint: Savepoint) {
        if let Some(state) = self.savepoints.get(savepoint.depth()) {
            self.working = state.clone();
            self.savepoints.truncate(savepoint.depth() + 1);
        }
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let MemoryUnit {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

/// Account directory keyed by national id.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccounts {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl MemoryAccounts {
    pub fn register(&self, account: Account) -> Result<(), RepositoryError> {
        let mut guard = self
            .accounts
            .lock()
            .map_err(|_| RepositoryError::Unavailable("account mutex poisoned".to_string()))?;
        guard.insert(account.national_id.clone(), account);
        Ok(())
    }
}

impl AccountDirectory for MemoryAccounts {
    fn account_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let guard = self
            .accounts
            .lock()
            .map_err(|_| RepositoryError::Unavailable("account mutex poisoned".to_string()))?;
        Ok(guard.get(national_id).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobs {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobs {
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .ok()
            .and_then(|guard| guard.get(name).cloned())
    }

    pub fn names(&self) -> Vec<String> {
        self.blobs
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl BlobStore for MemoryBlobs {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let mut guard = self
            .blobs
            .lock()
            .map_err(|_| BlobError::Unavailable("blob mutex poisoned".to_string()))?;
        if guard.contains_key(name) {
            return Err(BlobError::Exists(name.to_string()));
        }
        guard.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .map_err(|_| BlobError::Unavailable("blob mutex poisoned".to_string()))?
            .remove(name);
        Ok(())
    }
}
