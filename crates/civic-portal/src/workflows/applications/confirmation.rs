//! Two-party consent gate for marriage and temporary residence applications.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ActorId, ApplicationId, ApplicationStatus};
use super::lifecycle::{self, LifecycleError, LifecycleEvent, Transitioned};
use super::repository::{ApplicationStore, ConfirmationStore, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfirmationId(pub u64);

impl fmt::Display for ConfirmationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationKind {
    Marriage,
    TemporaryResidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Confirmed => "confirmed",
            ConfirmationStatus::Rejected => "rejected",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub id: ConfirmationId,
    pub application_id: ApplicationId,
    pub requester_id: ActorId,
    pub target_user_id: ActorId,
    pub target_national_id: String,
    pub kind: ConfirmationKind,
    pub status: ConfirmationStatus,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl ConfirmationRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ConfirmationStatus::Pending
    }
}

/// What the target user decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Resolution {
    Confirm,
    Reject { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    #[error("confirmation request {0} not found")]
    NotFound(ConfirmationId),
    #[error("confirmation request {id} was already {status}")]
    AlreadyResolved {
        id: ConfirmationId,
        status: ConfirmationStatus,
    },
    #[error("confirmation request {0} is addressed to another user")]
    NotTarget(ConfirmationId),
    #[error("application {application} already has a pending request for {target}")]
    DuplicatePending {
        application: ApplicationId,
        target: ActorId,
    },
    #[error("a rejection reason is required")]
    MissingReason,
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Parameters for a new pending request.
#[derive(Debug, Clone)]
pub struct OpenRequest<'a> {
    pub application_id: ApplicationId,
    pub requester_id: &'a ActorId,
    pub target_user_id: &'a ActorId,
    pub target_national_id: &'a str,
    pub kind: ConfirmationKind,
}

/// Create a pending request; at most one may be outstanding per application and target.
pub fn open<S>(
    store: &mut S,
    request: OpenRequest<'_>,
    now: DateTime<Utc>,
) -> Result<ConfirmationRequest, ConfirmationError>
where
    S: ConfirmationStore + ?Sized,
{
    let outstanding = store
        .confirmations_for_application(request.application_id)?
        .into_iter()
        .any(|existing| existing.is_pending() && &existing.target_user_id == request.target_user_id);
    if outstanding {
        return Err(ConfirmationError::DuplicatePending {
            application: request.application_id,
            target: request.target_user_id.clone(),
        });
    }

    let created = store.insert_confirmation(ConfirmationRequest {
        id: ConfirmationId(0),
        application_id: request.application_id,
        requester_id: request.requester_id.clone(),
        target_user_id: request.target_user_id.clone(),
        target_national_id: request.target_national_id.to_string(),
        kind: request.kind,
        status: ConfirmationStatus::Pending,
        reject_reason: None,
        created_at: now,
        responded_at: None,
    })?;

    info!(
        confirmation = %created.id,
        application = %created.application_id,
        target = %created.target_user_id,
        kind = ?created.kind,
        "confirmation requested"
    );
    Ok(created)
}

/// Outcome of a resolved request and the transition it caused.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub request: ConfirmationRequest,
    pub transition: Option<Transitioned>,
}

/// Resolve a pending request as its target user and move the parent application.
///
/// Resolving twice fails with [`ConfirmationError::AlreadyResolved`] and writes nothing. If
/// the parent has already left `AwaitingConfirmation` the request is still resolved but the
/// application is left alone.
pub fn resolve<S>(
    store: &mut S,
    id: ConfirmationId,
    actor: &ActorId,
    resolution: Resolution,
    now: DateTime<Utc>,
) -> Result<Resolved, ConfirmationError>
where
    S: ConfirmationStore + ApplicationStore + ?Sized,
{
    let mut request = store
        .confirmation(id)?
        .ok_or(ConfirmationError::NotFound(id))?;
    if &request.target_user_id != actor {
        return Err(ConfirmationError::NotTarget(id));
    }
    if !request.is_pending() {
        return Err(ConfirmationError::AlreadyResolved {
            id,
            status: request.status,
        });
    }

    let event = match &resolution {
        Resolution::Confirm => {
            request.status = ConfirmationStatus::Confirmed;
            LifecycleEvent::CounterpartyConfirmed
        }
        Resolution::Reject { reason } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(ConfirmationError::MissingReason);
            }
            request.status = ConfirmationStatus::Rejected;
            request.reject_reason = Some(reason.to_string());
            LifecycleEvent::CounterpartyDeclined {
                reason: reason.to_string(),
            }
        }
    };
    request.responded_at = Some(now);
    store.update_confirmation(&request)?;

    let parent = store
        .application(request.application_id)?
        .ok_or(LifecycleError::NotFound(request.application_id))?;
    let transition = if parent.status == ApplicationStatus::AwaitingConfirmation {
        Some(lifecycle::record(store, parent, &event, actor, None, now)?)
    } else {
        warn!(
            confirmation = %request.id,
            application = %parent.id,
            status = %parent.status,
            "parent application no longer awaiting confirmation"
        );
        None
    };

    Ok(Resolved {
        request,
        transition,
    })
}

/// Pending requests addressed to `target`, oldest first.
pub fn pending_for<S>(
    store: &S,
    target: &ActorId,
) -> Result<Vec<ConfirmationRequest>, RepositoryError>
where
    S: ConfirmationStore + ?Sized,
{
    let mut pending: Vec<_> = store
        .confirmations_for_target(target)?
        .into_iter()
        .filter(ConfirmationRequest::is_pending)
        .collect();
    pending.sort_by_key(|request| (request.created_at, request.id));
    Ok(pending)
}
