use chrono::{Datelike, NaiveDate};

use super::super::repository::{CitizenStore, RecordLedger, RepositoryError};
use super::policy::EligibilityPolicy;
use super::{EligibilityCheck, PartyDetails};
use crate::workflows::registry::Citizen;

/// Whole years elapsed between `date_of_birth` and `today`.
pub(crate) fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

pub(crate) fn minimum_age(
    check: &'static str,
    party: &PartyDetails,
    policy: &EligibilityPolicy,
    today: NaiveDate,
) -> EligibilityCheck {
    let minimum = policy.minimum_marriage_age(&party.gender);
    let Some(date_of_birth) = party.date_of_birth else {
        return EligibilityCheck::fail(
            check,
            format!("{} has no valid date of birth", party.label()),
        );
    };

    let age = age_in_years(date_of_birth, today);
    if age >= minimum as i32 {
        EligibilityCheck::pass(
            check,
            format!("{} is {age}, minimum is {minimum}", party.label()),
        )
    } else {
        EligibilityCheck::fail(
            check,
            format!(
                "{} is {age}, below the minimum marriage age of {minimum}",
                party.label()
            ),
        )
    }
}

pub(crate) fn not_married<S>(
    store: &S,
    check: &'static str,
    party: &PartyDetails,
    citizen: Option<&Citizen>,
) -> Result<EligibilityCheck, RepositoryError>
where
    S: RecordLedger + ?Sized,
{
    let Some(citizen) = citizen else {
        return Ok(EligibilityCheck::pass(
            check,
            format!(
                "{} is not in the registry; marital status needs manual verification",
                party.label()
            ),
        ));
    };

    let active = store
        .marriages_of(citizen.id)?
        .into_iter()
        .find(|marriage| marriage.is_active());
    Ok(match active {
        Some(marriage) => EligibilityCheck::fail(
            check,
            format!(
                "{} already has an active marriage ({})",
                party.label(),
                marriage.registration_number
            ),
        ),
        None => EligibilityCheck::pass(check, format!("{} has no active marriage", party.label())),
    })
}

/// Direct-parent comparison only; grandparents and siblings of parents are not traced.
pub(crate) fn no_blood_relation(
    applicant: Option<&Citizen>,
    spouse: Option<&Citizen>,
) -> EligibilityCheck {
    const CHECK: &str = "blood_relation";

    let (Some(applicant), Some(spouse)) = (applicant, spouse) else {
        return EligibilityCheck::pass(
            CHECK,
            "Both parties must be in the registry to compare parents; verify manually",
        );
    };

    let shares_father = applicant.father.is_some() && applicant.father == spouse.father;
    let shares_mother = applicant.mother.is_some() && applicant.mother == spouse.mother;
    if shares_father || shares_mother {
        EligibilityCheck::fail(CHECK, "The parties share a registered parent")
    } else {
        EligibilityCheck::pass(CHECK, "No shared parent found in the registry")
    }
}

pub(crate) fn no_active_residence<S>(
    store: &S,
    national_id: &str,
    today: NaiveDate,
) -> Result<EligibilityCheck, RepositoryError>
where
    S: RecordLedger + ?Sized,
{
    const CHECK: &str = "active_temporary_residence";

    let in_force = store
        .residences_of(national_id)?
        .into_iter()
        .find(|residence| residence.is_in_force(today));
    Ok(match in_force {
        Some(residence) => EligibilityCheck::fail(
            CHECK,
            format!(
                "Temporary residence {} is in force until {}",
                residence.registration_number, residence.end_date
            ),
        ),
        None => EligibilityCheck::pass(CHECK, "No temporary residence currently in force"),
    })
}

pub(crate) fn criminal_record() -> EligibilityCheck {
    EligibilityCheck::pass(
        "criminal_record",
        "No criminal record source is connected; nothing on file",
    )
}

pub(crate) fn citizen_record<S>(
    store: &S,
    national_id: &str,
) -> Result<EligibilityCheck, RepositoryError>
where
    S: CitizenStore + ?Sized,
{
    const CHECK: &str = "citizen_record";

    Ok(match store.citizen_by_national_id(national_id)? {
        Some(citizen) => EligibilityCheck::pass(
            CHECK,
            format!("Registered as {} (born {})", citizen.full_name, citizen.date_of_birth),
        ),
        None => EligibilityCheck::pass(CHECK, "Not yet in the citizen registry"),
    })
}
