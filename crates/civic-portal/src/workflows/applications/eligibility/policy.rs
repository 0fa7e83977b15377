use serde::{Deserialize, Serialize};

use super::super::content::is_male;

/// Statutory thresholds applied by the eligibility checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    pub minimum_marriage_age_male: u32,
    pub minimum_marriage_age_female: u32,
}

impl EligibilityPolicy {
    pub fn minimum_marriage_age(&self, gender: &str) -> u32 {
        if is_male(gender) {
            self.minimum_marriage_age_male
        } else {
            self.minimum_marriage_age_female
        }
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            minimum_marriage_age_male: 20,
            minimum_marriage_age_female: 18,
        }
    }
}
