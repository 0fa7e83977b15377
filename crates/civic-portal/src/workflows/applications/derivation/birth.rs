use chrono::Datelike;
use rand::Rng;

use super::{non_empty, DerivationContext, DerivationError};
use crate::config::RegistryConfig;
use crate::workflows::applications::content::{form_date_or, is_male, BirthForm};
use crate::workflows::applications::repository::{CitizenStore, RecordLedger, RepositoryError};
use crate::workflows::registry::{registration_number, BirthRecord, Citizen};

/// Province code, gender digit, two-digit year, random six digits: `001` `0` `26` `483920`.
pub fn generate_citizen_id<R>(province_code: &str, gender: &str, year: i32, rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    let gender_code = if is_male(gender) { '0' } else { '1' };
    let year_code = year.rem_euclid(100);
    let serial: u32 = rng.gen_range(100_000..999_999);
    format!("{province_code}{gender_code}{year_code:02}{serial}")
}

/// Draw ids until one is not already a citizen's national id or another newborn's id.
fn unused_citizen_id<S, R>(
    store: &S,
    config: &RegistryConfig,
    gender: &str,
    year: i32,
    rng: &mut R,
) -> Result<String, DerivationError>
where
    S: CitizenStore + RecordLedger + ?Sized,
    R: Rng + ?Sized,
{
    let issued: Vec<String> = store
        .birth_records()?
        .into_iter()
        .map(|record| record.generated_citizen_id)
        .collect();

    for _ in 0..config.citizen_id_attempts {
        let candidate = generate_citizen_id(&config.province_code, gender, year, rng);
        if issued.contains(&candidate) {
            continue;
        }
        if store.citizen_by_national_id(&candidate)?.is_none() {
            return Ok(candidate);
        }
    }

    Err(DerivationError::CitizenIdExhausted {
        attempts: config.citizen_id_attempts,
    })
}

fn registered_parent<S>(store: &S, national_id: &str) -> Result<Option<Citizen>, RepositoryError>
where
    S: CitizenStore + ?Sized,
{
    match non_empty(national_id) {
        Some(national_id) => store.citizen_by_national_id(&national_id),
        None => Ok(None),
    }
}

pub(super) fn derive<S, R>(
    store: &mut S,
    context: &DerivationContext<'_>,
    config: &RegistryConfig,
    rng: &mut R,
) -> Result<BirthRecord, DerivationError>
where
    S: CitizenStore + RecordLedger + ?Sized,
    R: Rng + ?Sized,
{
    let form: BirthForm = context.application.content().decode()?;
    let year = context.signed_at.year();
    let today = context.signed_at.date_naive();

    let generated_citizen_id = unused_citizen_id(store, config, &form.gender, year, rng)?;

    let father = registered_parent(store, &form.father_cccd)?;
    let mother = registered_parent(store, &form.mother_cccd)?;
    let parents_marriage = match (&father, &mother) {
        (Some(father), Some(mother)) => store
            .marriages_of(father.id)?
            .into_iter()
            .find(|marriage| marriage.is_active() && marriage.joins(father.id, mother.id)),
        _ => None,
    };

    let record = BirthRecord {
        registration_number: registration_number("KS", year, context.application.id),
        source_application: context.application.id,
        generated_citizen_id,
        child_name: form.child_full_name,
        date_of_birth: form_date_or(&form.date_of_birth, today),
        place_of_birth: form.place_of_birth,
        gender: form.gender,
        father: father.as_ref().map(|citizen| citizen.id),
        father_national_id: non_empty(&form.father_cccd),
        father_name: non_empty(&form.father_name),
        mother: mother.as_ref().map(|citizen| citizen.id),
        mother_national_id: non_empty(&form.mother_cccd),
        mother_name: non_empty(&form.mother_name),
        parents_marriage_verified: parents_marriage.is_some(),
        parents_marriage: parents_marriage.map(|marriage| marriage.registration_number),
        signer_id: context.signer.clone(),
        signed_at: context.signed_at,
    };

    store.insert_birth_record(record.clone())?;
    Ok(record)
}
