//! Materializes civil registry records from signed applications.
//!
//! Derivation is best-effort: it runs inside the signing unit of work behind a savepoint, and a
//! failure rolls its own writes back, persists a [`DerivationIssue`] and lets the signature
//! commit.

mod birth;
mod marriage;
mod residence;

pub use birth::generate_citizen_id;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::content::ContentError;
use super::domain::{ActorId, Application, ApplicationId, ServiceKind};
use super::repository::{RepositoryError, UnitOfWork};
use crate::config::RegistryConfig;
use crate::workflows::registry::DerivedRecord;

/// Persisted trace of a derivation that was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationIssue {
    pub application_id: ApplicationId,
    pub service_kind: ServiceKind,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DerivationOutcome {
    Derived { record: DerivedRecord },
    NotApplicable,
    Failed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("{0} national id is missing from the form")]
    MissingParty(&'static str),
    #[error("both parties carry the same national id {0}")]
    SameParty(String),
    #[error("no unused citizen id found after {attempts} attempts")]
    CitizenIdExhausted { attempts: u8 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Fixed mapping from service kind to the record it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationHandler {
    Birth,
    Marriage,
    TemporaryResidence,
}

impl DerivationHandler {
    pub const fn for_kind(kind: ServiceKind) -> Option<Self> {
        match kind {
            ServiceKind::BirthRegistration => Some(DerivationHandler::Birth),
            ServiceKind::MarriageRegistration => Some(DerivationHandler::Marriage),
            ServiceKind::TemporaryResidence => Some(DerivationHandler::TemporaryResidence),
            ServiceKind::ResidentRegistration => None,
        }
    }
}

/// Inputs shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct DerivationContext<'a> {
    pub application: &'a Application,
    pub signer: &'a ActorId,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecordDeriver {
    config: RegistryConfig,
}

impl RecordDeriver {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Run at most one derivation for a freshly signed application.
    ///
    /// Never fails. A store error while recording the [`DerivationIssue`] is logged and folded
    /// into the returned reason.
    pub fn derive<U, R>(
        &self,
        uow: &mut U,
        kind: Option<ServiceKind>,
        context: DerivationContext<'_>,
        rng: &mut R,
    ) -> DerivationOutcome
    where
        U: UnitOfWork + ?Sized,
        R: Rng + ?Sized,
    {
        let application_id = context.application.id;
        let Some((kind, handler)) =
            kind.and_then(|kind| DerivationHandler::for_kind(kind).map(|handler| (kind, handler)))
        else {
            debug!(application = %application_id, "no registry record for this service type");
            return DerivationOutcome::NotApplicable;
        };

        let savepoint = uow.savepoint();
        let derived = match handler {
            DerivationHandler::Birth => {
                birth::derive(uow, &context, &self.config, rng).map(DerivedRecord::Birth)
            }
            DerivationHandler::Marriage => {
                marriage::derive(uow, &context).map(DerivedRecord::Marriage)
            }
            DerivationHandler::TemporaryResidence => {
                residence::derive(uow, &context).map(DerivedRecord::TemporaryResidence)
            }
        };

        match derived {
            Ok(record) => {
                info!(
                    application = %application_id,
                    registration_number = record.registration_number(),
                    "registry record derived"
                );
                DerivationOutcome::Derived { record }
            }
            Err(error) => {
                uow.rollback_to(savepoint);
                let reason = error.to_string();
                warn!(
                    application = %application_id,
                    kind = kind.code(),
                    %reason,
                    "record derivation abandoned; signature kept"
                );
                let recorded = uow.record_derivation_issue(DerivationIssue {
                    application_id,
                    service_kind: kind,
                    reason: reason.clone(),
                    recorded_at: context.signed_at,
                });
                match recorded {
                    Ok(()) => DerivationOutcome::Failed { reason },
                    Err(store_error) => {
                        error!(
                            application = %application_id,
                            error = %store_error,
                            "derivation issue could not be recorded"
                        );
                        DerivationOutcome::Failed {
                            reason: format!("{reason}; issue not recorded: {store_error}"),
                        }
                    }
                }
            }
        }
    }
}

/// `None` for blank form values.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
