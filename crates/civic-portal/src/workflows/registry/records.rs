use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::applications::domain::{ActorId, ApplicationId};

/// Surrogate key of a master citizen row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CitizenId(pub u64);

impl fmt::Display for CitizenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
}

/// Citizen row before the registry assigns its surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCitizen {
    pub national_id: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub place_of_birth: String,
    pub marital_status: MaritalStatus,
    pub household_ref: Option<String>,
    pub father: Option<CitizenId>,
    pub mother: Option<CitizenId>,
}

impl NewCitizen {
    pub fn into_citizen(self, id: CitizenId) -> Citizen {
        Citizen {
            id,
            national_id: self.national_id,
            full_name: self.full_name,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            place_of_birth: self.place_of_birth,
            marital_status: self.marital_status,
            household_ref: self.household_ref,
            father: self.father,
            mother: self.mother,
        }
    }
}

/// Master record of a person in the national registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    pub id: CitizenId,
    pub national_id: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub place_of_birth: String,
    pub marital_status: MaritalStatus,
    pub household_ref: Option<String>,
    pub father: Option<CitizenId>,
    pub mother: Option<CitizenId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarriageStatus {
    Active,
    Divorced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarriageRecord {
    pub registration_number: String,
    pub source_application: ApplicationId,
    pub spouse1: CitizenId,
    pub spouse2: CitizenId,
    pub marriage_date: NaiveDate,
    pub registration_place: String,
    pub status: MarriageStatus,
    pub divorce_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl MarriageRecord {
    pub fn involves(&self, citizen: CitizenId) -> bool {
        self.spouse1 == citizen || self.spouse2 == citizen
    }

    pub fn is_active(&self) -> bool {
        self.status == MarriageStatus::Active
    }

    pub fn joins(&self, a: CitizenId, b: CitizenId) -> bool {
        (self.spouse1 == a && self.spouse2 == b) || (self.spouse1 == b && self.spouse2 == a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthRecord {
    pub registration_number: String,
    pub source_application: ApplicationId,
    pub generated_citizen_id: String,
    pub child_name: String,
    pub date_of_birth: NaiveDate,
    pub place_of_birth: String,
    pub gender: String,
    pub father: Option<CitizenId>,
    pub father_national_id: Option<String>,
    pub father_name: Option<String>,
    pub mother: Option<CitizenId>,
    pub mother_national_id: Option<String>,
    pub mother_name: Option<String>,
    pub parents_marriage_verified: bool,
    pub parents_marriage: Option<String>,
    pub signer_id: ActorId,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResidenceStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationType {
    New,
    Extend,
    Update,
}

impl RegistrationType {
    /// Unknown labels register a new residence.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "extend" => RegistrationType::Extend,
            "update" => RegistrationType::Update,
            _ => RegistrationType::New,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryResidence {
    pub registration_number: String,
    pub source_application: ApplicationId,
    pub citizen_national_id: String,
    pub citizen_name: String,
    pub citizen_phone: String,
    pub citizen: Option<CitizenId>,
    pub address: String,
    pub ward: String,
    pub district: String,
    pub province: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub owner_national_id: String,
    pub owner_name: String,
    pub owner_phone: String,
    pub registration_type: RegistrationType,
    pub status: ResidenceStatus,
    pub signer_id: ActorId,
    pub signed_at: DateTime<Utc>,
}

impl TemporaryResidence {
    pub fn is_in_force(&self, today: NaiveDate) -> bool {
        self.status == ResidenceStatus::Active && self.end_date > today
    }
}

/// Longest stay a single temporary residence registration may cover.
pub fn latest_residence_end(start: NaiveDate) -> NaiveDate {
    start
        .with_year(start.year() + 2)
        // 29 February rolls to 28 February two years on.
        .or_else(|| start.pred_opt().and_then(|day| day.with_year(day.year() + 2)))
        .unwrap_or(start)
}

/// Any record the registry can derive from a signed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum DerivedRecord {
    Birth(BirthRecord),
    Marriage(MarriageRecord),
    TemporaryResidence(TemporaryResidence),
}

impl DerivedRecord {
    pub fn registration_number(&self) -> &str {
        match self {
            DerivedRecord::Birth(record) => &record.registration_number,
            DerivedRecord::Marriage(record) => &record.registration_number,
            DerivedRecord::TemporaryResidence(record) => &record.registration_number,
        }
    }

    pub fn source_application(&self) -> ApplicationId {
        match self {
            DerivedRecord::Birth(record) => record.source_application,
            DerivedRecord::Marriage(record) => record.source_application,
            DerivedRecord::TemporaryResidence(record) => record.source_application,
        }
    }
}

/// `<prefix>-<year>-<zero padded application id>`, e.g. `KH-2026-000042`.
pub fn registration_number(prefix: &str, year: i32, application: ApplicationId) -> String {
    format!("{prefix}-{year}-{:06}", application.0)
}
