//! Per-service form schemas and the JSON document they are stored in.
//!
//! Fields keep the PascalCase names the citizen-facing forms post (`ApplicantCCCD`,
//! `SpouseDOB`, ...). Every text field decodes leniently: a missing, null, numeric, or boolean
//! value becomes a string (or the empty string) instead of failing the whole document. Only a
//! document that is not a JSON object is rejected.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::domain::ServiceKind;

/// Validation errors raised while encoding or decoding form content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("form content is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("form content must be a JSON object")]
    NotAnObject,
    #[error("form field {0} is required")]
    MissingField(&'static str),
    #[error("form field {field} has an invalid value '{value}'")]
    InvalidField { field: &'static str, value: String },
}

/// Opaque JSON document holding an application's form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDocument(Value);

impl ContentDocument {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ContentError> {
        Ok(Self(serde_json::from_str(raw)?))
    }

    pub fn encode<T: Serialize>(form: &T) -> Result<Self, ContentError> {
        let value = serde_json::to_value(form)?;
        if !value.is_object() {
            return Err(ContentError::NotAnObject);
        }
        Ok(Self(value))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ContentError> {
        if !self.0.is_object() {
            return Err(ContentError::NotAnObject);
        }
        Ok(T::deserialize(&self.0)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BirthForm {
    #[serde(deserialize_with = "lenient_text")]
    pub child_full_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub date_of_birth: String,
    #[serde(deserialize_with = "lenient_text")]
    pub place_of_birth: String,
    #[serde(deserialize_with = "lenient_text")]
    pub gender: String,
    #[serde(deserialize_with = "lenient_text")]
    pub father_name: String,
    #[serde(rename = "FatherCCCD", deserialize_with = "lenient_text")]
    pub father_cccd: String,
    #[serde(deserialize_with = "lenient_text")]
    pub mother_name: String,
    #[serde(rename = "MotherCCCD", deserialize_with = "lenient_text")]
    pub mother_cccd: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MarriageForm {
    #[serde(deserialize_with = "lenient_text")]
    pub applicant_name: String,
    #[serde(rename = "ApplicantCCCD", deserialize_with = "lenient_text")]
    pub applicant_cccd: String,
    #[serde(rename = "ApplicantDOB", deserialize_with = "lenient_text")]
    pub applicant_dob: String,
    #[serde(deserialize_with = "lenient_text")]
    pub applicant_gender: String,
    #[serde(deserialize_with = "lenient_text")]
    pub applicant_address: String,
    #[serde(deserialize_with = "lenient_text")]
    pub spouse_name: String,
    #[serde(rename = "SpouseCCCD", deserialize_with = "lenient_text")]
    pub spouse_cccd: String,
    #[serde(rename = "SpouseDOB", deserialize_with = "lenient_text")]
    pub spouse_dob: String,
    #[serde(deserialize_with = "lenient_text")]
    pub spouse_gender: String,
    #[serde(deserialize_with = "lenient_text")]
    pub spouse_address: String,
    #[serde(deserialize_with = "lenient_text")]
    pub submitted_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TemporaryResidenceForm {
    #[serde(deserialize_with = "lenient_text")]
    pub registration_type: String,
    #[serde(deserialize_with = "lenient_text")]
    pub applicant_name: String,
    #[serde(rename = "ApplicantCCCD", deserialize_with = "lenient_text")]
    pub applicant_cccd: String,
    #[serde(deserialize_with = "lenient_text")]
    pub applicant_phone: String,
    #[serde(deserialize_with = "lenient_text")]
    pub province: String,
    #[serde(deserialize_with = "lenient_text")]
    pub district: String,
    #[serde(deserialize_with = "lenient_text")]
    pub ward: String,
    #[serde(deserialize_with = "lenient_text")]
    pub address_detail: String,
    #[serde(deserialize_with = "lenient_text")]
    pub full_address: String,
    #[serde(deserialize_with = "lenient_text")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient_text")]
    pub end_date: String,
    #[serde(deserialize_with = "lenient_text")]
    pub owner_name: String,
    #[serde(rename = "OwnerCCCD", deserialize_with = "lenient_text")]
    pub owner_cccd: String,
    #[serde(deserialize_with = "lenient_text")]
    pub owner_phone: String,
    #[serde(deserialize_with = "lenient_text")]
    pub submitted_at: String,
}

impl TemporaryResidenceForm {
    /// The posted full address, or one assembled from its parts when absent.
    pub fn address(&self) -> String {
        if !self.full_address.is_empty() {
            return self.full_address.clone();
        }
        [
            self.address_detail.as_str(),
            self.ward.as_str(),
            self.district.as_str(),
            self.province.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ResidentRegistrationForm {
    #[serde(deserialize_with = "lenient_text")]
    pub full_name: String,
    #[serde(rename = "DOB", deserialize_with = "lenient_text")]
    pub dob: String,
    #[serde(deserialize_with = "lenient_text")]
    pub gender: String,
    #[serde(rename = "CCCD", deserialize_with = "lenient_text")]
    pub cccd: String,
    #[serde(deserialize_with = "lenient_text")]
    pub address: String,
    #[serde(deserialize_with = "lenient_text")]
    pub relationship: String,
    #[serde(deserialize_with = "lenient_text")]
    pub household_owner: String,
}

/// Decoded form content, tagged by the service it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormContent {
    Birth(BirthForm),
    Marriage(MarriageForm),
    TemporaryResidence(TemporaryResidenceForm),
    ResidentRegistration(ResidentRegistrationForm),
}

impl FormContent {
    pub fn decode(kind: ServiceKind, document: &ContentDocument) -> Result<Self, ContentError> {
        Ok(match kind {
            ServiceKind::BirthRegistration => FormContent::Birth(document.decode()?),
            ServiceKind::MarriageRegistration => FormContent::Marriage(document.decode()?),
            ServiceKind::TemporaryResidence => {
                FormContent::TemporaryResidence(document.decode()?)
            }
            ServiceKind::ResidentRegistration => {
                FormContent::ResidentRegistration(document.decode()?)
            }
        })
    }

    pub fn encode(&self) -> Result<ContentDocument, ContentError> {
        match self {
            FormContent::Birth(form) => ContentDocument::encode(form),
            FormContent::Marriage(form) => ContentDocument::encode(form),
            FormContent::TemporaryResidence(form) => ContentDocument::encode(form),
            FormContent::ResidentRegistration(form) => ContentDocument::encode(form),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            FormContent::Birth(_) => ServiceKind::BirthRegistration,
            FormContent::Marriage(_) => ServiceKind::MarriageRegistration,
            FormContent::TemporaryResidence(_) => ServiceKind::TemporaryResidence,
            FormContent::ResidentRegistration(_) => ServiceKind::ResidentRegistration,
        }
    }

    /// National id and display name of the spouse or landlord who must consent.
    pub fn counterparty(&self) -> Option<(&str, &str)> {
        let (national_id, name) = match self {
            FormContent::Marriage(form) => (form.spouse_cccd.as_str(), form.spouse_name.as_str()),
            FormContent::TemporaryResidence(form) => {
                (form.owner_cccd.as_str(), form.owner_name.as_str())
            }
            FormContent::Birth(_) | FormContent::ResidentRegistration(_) => return None,
        };
        if national_id.is_empty() {
            None
        } else {
            Some((national_id, name))
        }
    }
}

/// Parse the date formats the portal forms have been observed to post.
pub fn parse_form_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ts| ts.date())
        })
        .or_else(|| NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok())
}

/// Forms code male as "Nam"; every other value counts as female.
pub fn is_male(gender: &str) -> bool {
    gender.trim().eq_ignore_ascii_case("nam")
}

/// Lenient date lookup used by derivation: unparseable input falls back.
pub fn form_date_or(raw: &str, fallback: NaiveDate) -> NaiveDate {
    parse_form_date(raw).unwrap_or(fallback)
}
