use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::confirmation::ConfirmationKind;
use super::content::ContentDocument;
use super::lifecycle::TransitionError;

/// Identifier assigned by the record store when an application is first persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

/// Opaque identity of the user performing an action, issued by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceTypeId(pub u32);

impl fmt::Display for ServiceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of the administrative services the portal knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    BirthRegistration,
    MarriageRegistration,
    TemporaryResidence,
    ResidentRegistration,
}

impl ServiceKind {
    pub const fn code(self) -> &'static str {
        match self {
            ServiceKind::BirthRegistration => "birth_registration",
            ServiceKind::MarriageRegistration => "marriage_registration",
            ServiceKind::TemporaryResidence => "temporary_residence",
            ServiceKind::ResidentRegistration => "resident_registration",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ServiceKind::BirthRegistration => "Birth Registration",
            ServiceKind::MarriageRegistration => "Marriage Registration",
            ServiceKind::TemporaryResidence => "Temporary Residence Registration",
            ServiceKind::ResidentRegistration => "Resident Registration",
        }
    }

    /// Document type stamped on attachments uploaded with the application.
    pub const fn document_type(self) -> &'static str {
        match self {
            ServiceKind::BirthRegistration => "BirthCertificateDoc",
            ServiceKind::MarriageRegistration => "MarriageDoc",
            ServiceKind::TemporaryResidence => "TemporaryResidenceDoc",
            ServiceKind::ResidentRegistration => "SupportingDocument",
        }
    }

    /// Which second party, if any, has to consent before review starts.
    pub const fn confirmation_kind(self) -> Option<ConfirmationKind> {
        match self {
            ServiceKind::MarriageRegistration => Some(ConfirmationKind::Marriage),
            ServiceKind::TemporaryResidence => Some(ConfirmationKind::TemporaryResidence),
            ServiceKind::BirthRegistration | ServiceKind::ResidentRegistration => None,
        }
    }
}

/// Catalog entry: a bookable service with its fee in VND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub kind: Option<ServiceKind>,
    pub name: String,
    pub description: String,
    pub fee_vnd: u64,
}

/// Fixed registry of service types keyed by stable id.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    types: BTreeMap<ServiceTypeId, ServiceType>,
}

impl ServiceCatalog {
    pub fn standard() -> Self {
        let mut catalog = Self::default();
        let entries = [
            (
                1,
                ServiceKind::BirthRegistration,
                "Birth registration for newborn children",
                0,
            ),
            (
                2,
                ServiceKind::MarriageRegistration,
                "Marriage registration for Vietnamese citizens",
                50_000,
            ),
            (
                3,
                ServiceKind::TemporaryResidence,
                "Temporary residence registration",
                0,
            ),
            (
                4,
                ServiceKind::ResidentRegistration,
                "Permanent residence in an existing or new household",
                15_000,
            ),
        ];

        for (id, kind, description, fee_vnd) in entries {
            catalog.register(ServiceType {
                id: ServiceTypeId(id),
                kind: Some(kind),
                name: kind.display_name().to_string(),
                description: description.to_string(),
                fee_vnd,
            });
        }

        catalog
    }

    pub fn register(&mut self, service: ServiceType) -> Option<ServiceType> {
        self.types.insert(service.id, service)
    }

    pub fn get(&self, id: ServiceTypeId) -> Option<&ServiceType> {
        self.types.get(&id)
    }

    pub fn kind_of(&self, id: ServiceTypeId) -> Option<ServiceKind> {
        self.get(id).and_then(|service| service.kind)
    }

    pub fn id_of(&self, kind: ServiceKind) -> Option<ServiceTypeId> {
        self.types
            .values()
            .find(|service| service.kind == Some(kind))
            .map(|service| service.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceType> {
        self.types.values()
    }
}

/// Status tracked throughout the application lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Draft,
    AwaitingConfirmation,
    Submitted,
    InReview,
    SupplementRequired,
    PendingApproval,
    Signed,
    Completed,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::AwaitingConfirmation => "awaiting_confirmation",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::InReview => "in_review",
            ApplicationStatus::SupplementRequired => "supplement_required",
            ApplicationStatus::PendingApproval => "pending_approval",
            ApplicationStatus::Signed => "signed",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Completed | ApplicationStatus::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub citizen_id: ActorId,
    pub service_type_id: ServiceTypeId,
    content: ContentDocument,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub current_official: Option<ActorId>,
    pub reject_reason: Option<String>,
    pub supplement_note: Option<String>,
}

impl Application {
    /// A fresh draft; the store assigns the real id on insert.
    pub fn draft(
        citizen_id: ActorId,
        service_type_id: ServiceTypeId,
        content: ContentDocument,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId(0),
            citizen_id,
            service_type_id,
            content,
            status: ApplicationStatus::Draft,
            created_at,
            modified_at: None,
            current_official: None,
            reject_reason: None,
            supplement_note: None,
        }
    }

    pub fn content(&self) -> &ContentDocument {
        &self.content
    }

    /// Replace the form content. Only drafts are editable.
    pub fn amend_content(
        &mut self,
        content: ContentDocument,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != ApplicationStatus::Draft {
            return Err(TransitionError::ContentLocked {
                status: self.status,
            });
        }
        self.content = content;
        self.modified_at = Some(self.last_activity().max(at));
        Ok(())
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// Append-only audit entry written alongside every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationHistory {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub note: String,
    pub actor_id: ActorId,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub application_id: ApplicationId,
    pub file_name: String,
    pub storage_path: String,
    pub document_type: String,
}

/// Raw upload handed over at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

/// Everything a citizen sends when filing an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub citizen_id: ActorId,
    pub service_type_id: ServiceTypeId,
    pub content: ContentDocument,
    #[serde(default)]
    pub attachments: Vec<UploadedFile>,
}
