//! Citizen applications: intake, the review lifecycle, counterparty confirmation, eligibility
//! checks and the registry records derived when the chairman signs.

pub mod confirmation;
pub mod content;
pub mod derivation;
pub mod domain;
pub mod eligibility;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use confirmation::{
    ConfirmationId, ConfirmationKind, ConfirmationRequest, ConfirmationStatus, Resolution,
};
pub use content::{
    BirthForm, ContentDocument, ContentError, FormContent, MarriageForm, ResidentRegistrationForm,
    TemporaryResidenceForm,
};
pub use derivation::{DerivationIssue, DerivationOutcome, RecordDeriver};
pub use domain::{
    ActorId, Application, ApplicationHistory, ApplicationId, ApplicationStatus,
    ApplicationSubmission, Attachment, ServiceCatalog, ServiceKind, ServiceType, ServiceTypeId,
    UploadedFile,
};
pub use eligibility::{EligibilityCheck, EligibilityPolicy, EligibilityReport, EligibilityVerifier};
pub use lifecycle::{LifecycleEvent, TransitionError};
pub use memory::{MemoryAccounts, MemoryBlobs, MemoryStore};
pub use repository::{
    Account, AccountDirectory, BlobError, BlobStore, RecordStore, RepositoryError, UnitOfWork,
};
pub use router::{application_router, ACTOR_HEADER};
pub use service::{
    ApplicationRecord, ApplicationServiceError, CivicApplicationService, Clock, DerivationGap,
    SignOutcome, SubmissionReceipt,
};
