mod policy;
mod rules;

pub use policy::EligibilityPolicy;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::content::{parse_form_date, MarriageForm};
use super::repository::{CitizenStore, RecordLedger, RepositoryError};

/// Outcome of one advisory rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub check: String,
    pub passed: bool,
    pub message: String,
}

impl EligibilityCheck {
    pub fn pass(check: &str, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(check: &str, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            passed: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub checks: Vec<EligibilityCheck>,
    pub all_passed: bool,
}

impl EligibilityReport {
    fn from_checks(checks: Vec<EligibilityCheck>) -> Self {
        let all_passed = checks.iter().all(|check| check.passed);
        Self { checks, all_passed }
    }

    pub fn check(&self, name: &str) -> Option<&EligibilityCheck> {
        self.checks.iter().find(|check| check.check == name)
    }
}

/// One party to a marriage as declared on the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyDetails {
    pub role: &'static str,
    pub national_id: String,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
}

impl PartyDetails {
    fn label(&self) -> String {
        if self.full_name.is_empty() {
            self.role.to_string()
        } else {
            format!("{} {}", self.role, self.full_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarriageEligibilityRequest {
    pub applicant: PartyDetails,
    pub spouse: PartyDetails,
}

impl MarriageEligibilityRequest {
    pub fn from_form(form: &MarriageForm) -> Self {
        Self {
            applicant: PartyDetails {
                role: "Applicant",
                national_id: form.applicant_cccd.clone(),
                full_name: form.applicant_name.clone(),
                date_of_birth: parse_form_date(&form.applicant_dob),
                gender: form.applicant_gender.clone(),
            },
            spouse: PartyDetails {
                role: "Spouse",
                national_id: form.spouse_cccd.clone(),
                full_name: form.spouse_name.clone(),
                date_of_birth: parse_form_date(&form.spouse_dob),
                gender: form.spouse_gender.clone(),
            },
        }
    }
}

/// Read-only advisory checks run before a citizen submits. Results never block submission.
#[derive(Debug, Clone, Default)]
pub struct EligibilityVerifier {
    policy: EligibilityPolicy,
}

impl EligibilityVerifier {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn marriage<S>(
        &self,
        store: &S,
        request: &MarriageEligibilityRequest,
        today: NaiveDate,
    ) -> Result<EligibilityReport, RepositoryError>
    where
        S: CitizenStore + RecordLedger + ?Sized,
    {
        let applicant = store.citizen_by_national_id(&request.applicant.national_id)?;
        let spouse = store.citizen_by_national_id(&request.spouse.national_id)?;

        let checks = vec![
            rules::minimum_age("applicant_age", &request.applicant, &self.policy, today),
            rules::minimum_age("spouse_age", &request.spouse, &self.policy, today),
            rules::not_married(
                store,
                "applicant_marital_status",
                &request.applicant,
                applicant.as_ref(),
            )?,
            rules::not_married(
                store,
                "spouse_marital_status",
                &request.spouse,
                spouse.as_ref(),
            )?,
            rules::no_blood_relation(applicant.as_ref(), spouse.as_ref()),
        ];

        Ok(EligibilityReport::from_checks(checks))
    }

    pub fn temporary_residence<S>(
        &self,
        store: &S,
        national_id: &str,
        today: NaiveDate,
    ) -> Result<EligibilityReport, RepositoryError>
    where
        S: CitizenStore + RecordLedger + ?Sized,
    {
        let national_id = national_id.trim();
        let checks = vec![
            rules::no_active_residence(store, national_id, today)?,
            rules::criminal_record(),
            rules::citizen_record(store, national_id)?,
        ];

        Ok(EligibilityReport::from_checks(checks))
    }
}
