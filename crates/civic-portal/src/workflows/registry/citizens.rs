use serde::Serialize;
use tracing::{debug, warn};

use super::records::{Citizen, MaritalStatus, NewCitizen};
use crate::workflows::applications::repository::{
    Account, AccountDirectory, CitizenStore, RepositoryError,
};

/// Result of resolving a national id against the registry and the account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum CitizenLookup {
    Registered { citizen: Citizen, has_account: bool },
    AccountOnly { account: Account },
    NotFound,
}

pub fn lookup<S, D>(
    store: &S,
    directory: &D,
    national_id: &str,
) -> Result<CitizenLookup, RepositoryError>
where
    S: CitizenStore + ?Sized,
    D: AccountDirectory + ?Sized,
{
    let national_id = national_id.trim();
    if national_id.is_empty() {
        return Ok(CitizenLookup::NotFound);
    }

    let account = directory.account_by_national_id(national_id)?;
    if let Some(citizen) = store.citizen_by_national_id(national_id)? {
        return Ok(CitizenLookup::Registered {
            citizen,
            has_account: account.is_some(),
        });
    }

    Ok(match account {
        Some(account) => CitizenLookup::AccountOnly { account },
        None => CitizenLookup::NotFound,
    })
}

/// Fetch the citizen with `candidate.national_id`, creating it from `candidate` when absent.
///
/// Returns the row and whether it was created. A duplicate-key failure on insert means a
/// concurrent writer registered the same national id first; the existing row is re-read and
/// used instead.
pub fn find_or_create<S>(
    store: &mut S,
    candidate: NewCitizen,
) -> Result<(Citizen, bool), RepositoryError>
where
    S: CitizenStore + ?Sized,
{
    if let Some(existing) = store.citizen_by_national_id(&candidate.national_id)? {
        return Ok((existing, false));
    }

    let national_id = candidate.national_id.clone();
    match store.insert_citizen(candidate) {
        Ok(created) => {
            debug!(citizen = %created.id, "registered citizen");
            Ok((created, true))
        }
        Err(RepositoryError::Conflict(detail)) => {
            warn!(%detail, "citizen registered concurrently; reusing existing row");
            store
                .citizen_by_national_id(&national_id)?
                .map(|existing| (existing, false))
                .ok_or(RepositoryError::Conflict(detail))
        }
        Err(other) => Err(other),
    }
}

pub fn set_marital_status<S>(
    store: &mut S,
    citizen: &mut Citizen,
    status: MaritalStatus,
) -> Result<(), RepositoryError>
where
    S: CitizenStore + ?Sized,
{
    if citizen.marital_status == status {
        return Ok(());
    }
    citizen.marital_status = status;
    store.update_citizen(citizen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::registry::records::CitizenId;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn candidate(national_id: &str) -> NewCitizen {
        NewCitizen {
            national_id: national_id.to_string(),
            full_name: "Nguyen Van A".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid"),
            gender: "Nam".to_string(),
            place_of_birth: String::new(),
            marital_status: MaritalStatus::Single,
            household_ref: None,
            father: None,
            mother: None,
        }
    }

    /// Simulates a concurrent writer: the first insert loses the race, the row appears.
    #[derive(Default)]
    struct RacingStore {
        rows: HashMap<String, Citizen>,
        raced: bool,
    }

    impl CitizenStore for RacingStore {
        fn citizen(&self, id: CitizenId) -> Result<Option<Citizen>, RepositoryError> {
            Ok(self.rows.values().find(|c| c.id == id).cloned())
        }

        fn citizen_by_national_id(
            &self,
            national_id: &str,
        ) -> Result<Option<Citizen>, RepositoryError> {
            Ok(self.rows.get(national_id).cloned())
        }

        fn insert_citizen(&mut self, citizen: NewCitizen) -> Result<Citizen, RepositoryError> {
            if !self.raced {
                self.raced = true;
                let mut winner = citizen.clone();
                winner.full_name = "Concurrent Writer".to_string();
                let winner = winner.into_citizen(CitizenId(77));
                self.rows.insert(winner.national_id.clone(), winner);
                return Err(RepositoryError::Conflict(citizen.national_id));
            }
            let created = citizen.into_citizen(CitizenId(self.rows.len() as u64 + 1));
            self.rows.insert(created.national_id.clone(), created.clone());
            Ok(created)
        }

        fn update_citizen(&mut self, citizen: &Citizen) -> Result<(), RepositoryError> {
            self.rows.insert(citizen.national_id.clone(), citizen.clone());
            Ok(())
        }
    }

    #[test]
    fn duplicate_key_on_create_reuses_the_winning_row() {
        let mut store = RacingStore::default();
        let (citizen, created) =
            find_or_create(&mut store, candidate("001090000001")).expect("recovers");

        assert!(!created);
        assert_eq!(citizen.id, CitizenId(77));
        assert_eq!(citizen.full_name, "Concurrent Writer");
    }

    #[test]
    fn existing_citizens_are_not_recreated() {
        let mut store = RacingStore {
            raced: true,
            ..RacingStore::default()
        };
        let (first, created) =
            find_or_create(&mut store, candidate("001090000002")).expect("creates");
        assert!(created);

        let (second, created_again) =
            find_or_create(&mut store, candidate("001090000002")).expect("finds");
        assert!(!created_again);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn marital_status_updates_are_persisted() {
        let mut store = RacingStore {
            raced: true,
            ..RacingStore::default()
        };
        let (mut citizen, _) =
            find_or_create(&mut store, candidate("001090000003")).expect("creates");

        set_marital_status(&mut store, &mut citizen, MaritalStatus::Married).expect("updates");
        let stored = store
            .citizen_by_national_id("001090000003")
            .expect("lookup")
            .expect("present");
        assert_eq!(stored.marital_status, MaritalStatus::Married);
    }
}
