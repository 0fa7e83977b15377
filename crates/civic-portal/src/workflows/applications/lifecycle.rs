//! Application status state machine.
//!
//! ```text
//! Draft ──submit──▶ Submitted ◀──confirm── AwaitingConfirmation ◀──submit (counterparty)── Draft
//!                      │                          │
//!                      ▼ process (official)       └──decline──▶ Rejected
//!        InReview / SupplementRequired / PendingApproval / Rejected
//!                                         │
//!                      PendingApproval ──sign──▶ Signed ──complete──▶ Completed
//!                             └──reject──▶ Rejected
//! ```
//!
//! Every accepted event yields exactly one [`ApplicationHistory`] entry; the caller persists
//! both inside the same unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ActorId, Application, ApplicationHistory, ApplicationId, ApplicationStatus};
use super::repository::{ApplicationStore, RepositoryError};

/// Statuses an official may move an application into while triaging it.
pub const OFFICIAL_TARGETS: [ApplicationStatus; 5] = [
    ApplicationStatus::Submitted,
    ApplicationStatus::InReview,
    ApplicationStatus::SupplementRequired,
    ApplicationStatus::PendingApproval,
    ApplicationStatus::Rejected,
];

/// Who is expected to raise an event. Identity checks belong to the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Counterparty,
    Official,
    Chairman,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Submit { awaiting_confirmation: bool },
    CounterpartyConfirmed,
    CounterpartyDeclined { reason: String },
    Process { next: ApplicationStatus },
    Sign,
    Reject { reason: String },
    Complete,
}

impl LifecycleEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Submit { .. } => "submit",
            LifecycleEvent::CounterpartyConfirmed => "confirm",
            LifecycleEvent::CounterpartyDeclined { .. } => "decline",
            LifecycleEvent::Process { .. } => "process",
            LifecycleEvent::Sign => "sign",
            LifecycleEvent::Reject { .. } => "reject",
            LifecycleEvent::Complete => "complete",
        }
    }

    pub const fn role(&self) -> Role {
        match self {
            LifecycleEvent::Submit { .. } => Role::Citizen,
            LifecycleEvent::CounterpartyConfirmed | LifecycleEvent::CounterpartyDeclined { .. } => {
                Role::Counterparty
            }
            LifecycleEvent::Process { .. } => Role::Official,
            LifecycleEvent::Sign | LifecycleEvent::Reject { .. } | LifecycleEvent::Complete => {
                Role::Chairman
            }
        }
    }

    fn default_note(&self, next: ApplicationStatus) -> String {
        match self {
            LifecycleEvent::Submit {
                awaiting_confirmation: true,
            } => "Application submitted online; awaiting counterparty confirmation".to_string(),
            LifecycleEvent::Submit { .. } => "Application submitted online".to_string(),
            LifecycleEvent::CounterpartyConfirmed => {
                "Counterparty confirmed the application".to_string()
            }
            LifecycleEvent::CounterpartyDeclined { reason } => {
                format!("Counterparty declined: {reason}")
            }
            LifecycleEvent::Process { .. } => format!("Official moved application to {next}"),
            LifecycleEvent::Sign => "Chairman signed the application".to_string(),
            LifecycleEvent::Reject { reason } => format!("Chairman rejected: {reason}"),
            LifecycleEvent::Complete => {
                "Application completed; result ready for the citizen".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {event} an application that is {from}")]
    InvalidTransition {
        from: ApplicationStatus,
        event: &'static str,
    },
    #[error("an official cannot move an application to {target}")]
    OfficialTargetNotAllowed { target: ApplicationStatus },
    #[error("content of a {status} application can no longer change")]
    ContentLocked { status: ApplicationStatus },
}

/// The status `event` leads to from `current`, if the edge exists.
pub fn next_status(
    current: ApplicationStatus,
    event: &LifecycleEvent,
) -> Result<ApplicationStatus, TransitionError> {
    use ApplicationStatus::*;

    let next = match (current, event) {
        (
            Draft,
            LifecycleEvent::Submit {
                awaiting_confirmation: true,
            },
        ) => AwaitingConfirmation,
        (Draft, LifecycleEvent::Submit { .. }) => Submitted,
        (AwaitingConfirmation, LifecycleEvent::CounterpartyConfirmed) => Submitted,
        (AwaitingConfirmation, LifecycleEvent::CounterpartyDeclined { .. }) => Rejected,
        (Submitted | InReview | SupplementRequired, LifecycleEvent::Process { next }) => {
            if !OFFICIAL_TARGETS.contains(next) {
                return Err(TransitionError::OfficialTargetNotAllowed { target: *next });
            }
            *next
        }
        (PendingApproval, LifecycleEvent::Sign) => Signed,
        (PendingApproval, LifecycleEvent::Reject { .. }) => Rejected,
        (Signed, LifecycleEvent::Complete) => Completed,
        _ => {
            return Err(TransitionError::InvalidTransition {
                from: current,
                event: event.name(),
            })
        }
    };

    Ok(next)
}

/// Apply `event` to `application` in memory and build its history entry.
///
/// The history timestamp never precedes the application's previous activity, so entries for
/// one application are ordered even if the wall clock steps backwards.
pub fn apply(
    application: &mut Application,
    event: &LifecycleEvent,
    actor: &ActorId,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<ApplicationHistory, TransitionError> {
    let next = next_status(application.status, event)?;
    let at = now.max(application.last_activity());
    let note = note
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty());

    match event {
        LifecycleEvent::Process { .. } => {
            application.current_official = Some(actor.clone());
            match next {
                ApplicationStatus::SupplementRequired => {
                    application.supplement_note = note.clone();
                }
                ApplicationStatus::Rejected => {
                    application.reject_reason =
                        Some(note.clone().unwrap_or_else(|| "Rejected during review".to_string()));
                }
                _ => {}
            }
        }
        LifecycleEvent::CounterpartyDeclined { reason } => {
            application.reject_reason = Some(format!("Declined by the counterparty: {reason}"));
        }
        LifecycleEvent::Reject { reason } => {
            application.reject_reason = Some(reason.clone());
        }
        LifecycleEvent::Submit { .. }
        | LifecycleEvent::CounterpartyConfirmed
        | LifecycleEvent::Sign
        | LifecycleEvent::Complete => {}
    }

    application.status = next;
    application.modified_at = Some(at);

    Ok(ApplicationHistory {
        application_id: application.id,
        status: next,
        note: note.unwrap_or_else(|| event.default_note(next)),
        actor_id: actor.clone(),
        recorded_at: at,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A persisted status change together with the history entry written for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transitioned {
    pub previous: ApplicationStatus,
    pub application: Application,
    pub history: ApplicationHistory,
}

/// Load, transition, and persist an application plus its history entry in `store`.
///
/// Nothing is written when the event is not valid from the current status.
pub fn advance<S>(
    store: &mut S,
    id: ApplicationId,
    event: &LifecycleEvent,
    actor: &ActorId,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transitioned, LifecycleError>
where
    S: ApplicationStore + ?Sized,
{
    let application = store
        .application(id)?
        .ok_or(LifecycleError::NotFound(id))?;
    record(store, application, event, actor, note, now)
}

/// Transition an application the caller already holds (e.g. a freshly inserted draft).
pub fn record<S>(
    store: &mut S,
    mut application: Application,
    event: &LifecycleEvent,
    actor: &ActorId,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transitioned, LifecycleError>
where
    S: ApplicationStore + ?Sized,
{
    let previous = application.status;
    let history = apply(&mut application, event, actor, note, now)?;

    store.update_application(&application)?;
    store.append_history(history.clone())?;

    info!(
        application = %application.id,
        from = %previous,
        to = %application.status,
        event = event.name(),
        role = ?event.role(),
        actor = %actor,
        "application transitioned"
    );

    Ok(Transitioned {
        previous,
        application,
        history,
    })
}
