use chrono::{Datelike, NaiveDate};

use super::{non_empty, DerivationContext, DerivationError};
use crate::workflows::applications::content::{form_date_or, MarriageForm};
use crate::workflows::applications::repository::{CitizenStore, RecordLedger};
use crate::workflows::registry::citizens::{find_or_create, set_marital_status};
use crate::workflows::registry::{
    registration_number, Citizen, MaritalStatus, MarriageRecord, MarriageStatus, NewCitizen,
};

pub(crate) const REGISTRATION_PLACE: &str = "Online Public Services Portal";

struct Party<'f> {
    role: &'static str,
    national_id: &'f str,
    full_name: &'f str,
    date_of_birth: &'f str,
    gender: &'f str,
}

fn married_citizen<S>(
    store: &mut S,
    party: Party<'_>,
    today: NaiveDate,
) -> Result<Citizen, DerivationError>
where
    S: CitizenStore + ?Sized,
{
    let national_id =
        non_empty(party.national_id).ok_or(DerivationError::MissingParty(party.role))?;
    let (mut citizen, _created) = find_or_create(
        store,
        NewCitizen {
            national_id,
            full_name: party.full_name.to_string(),
            date_of_birth: form_date_or(party.date_of_birth, today),
            gender: party.gender.to_string(),
            place_of_birth: String::new(),
            marital_status: MaritalStatus::Married,
            household_ref: None,
            father: None,
            mother: None,
        },
    )?;
    set_marital_status(store, &mut citizen, MaritalStatus::Married)?;
    Ok(citizen)
}

pub(super) fn derive<S>(
    store: &mut S,
    context: &DerivationContext<'_>,
) -> Result<MarriageRecord, DerivationError>
where
    S: CitizenStore + RecordLedger + ?Sized,
{
    let form: MarriageForm = context.application.content().decode()?;
    let today = context.signed_at.date_naive();

    if !form.applicant_cccd.is_empty() && form.applicant_cccd == form.spouse_cccd {
        return Err(DerivationError::SameParty(form.applicant_cccd));
    }

    let applicant = married_citizen(
        store,
        Party {
            role: "applicant",
            national_id: &form.applicant_cccd,
            full_name: &form.applicant_name,
            date_of_birth: &form.applicant_dob,
            gender: &form.applicant_gender,
        },
        today,
    )?;
    let spouse = married_citizen(
        store,
        Party {
            role: "spouse",
            national_id: &form.spouse_cccd,
            full_name: &form.spouse_name,
            date_of_birth: &form.spouse_dob,
            gender: &form.spouse_gender,
        },
        today,
    )?;

    let record = MarriageRecord {
        registration_number: registration_number(
            "KH",
            context.signed_at.year(),
            context.application.id,
        ),
        source_application: context.application.id,
        spouse1: applicant.id,
        spouse2: spouse.id,
        marriage_date: today,
        registration_place: REGISTRATION_PLACE.to_string(),
        status: MarriageStatus::Active,
        divorce_date: None,
        created_at: context.signed_at,
    };

    store.insert_marriage_record(record.clone())?;
    Ok(record)
}
