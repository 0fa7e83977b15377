//! Civil registry: master citizen records and the records derived from signed applications.

pub mod citizens;
pub mod records;

pub use citizens::CitizenLookup;
pub use records::{
    latest_residence_end, registration_number, BirthRecord, Citizen, CitizenId, DerivedRecord,
    MaritalStatus, MarriageRecord, MarriageStatus, NewCitizen, RegistrationType, ResidenceStatus,
    TemporaryResidence,
};
