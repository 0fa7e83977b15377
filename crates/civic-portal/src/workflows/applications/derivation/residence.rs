use chrono::Datelike;

use super::{DerivationContext, DerivationError};
use crate::workflows::applications::content::{
    form_date_or, parse_form_date, ContentError, TemporaryResidenceForm,
};
use crate::workflows::applications::repository::{CitizenStore, RecordLedger};
use crate::workflows::registry::{
    latest_residence_end, registration_number, RegistrationType, ResidenceStatus,
    TemporaryResidence,
};

pub(super) fn derive<S>(
    store: &mut S,
    context: &DerivationContext<'_>,
) -> Result<TemporaryResidence, DerivationError>
where
    S: CitizenStore + RecordLedger + ?Sized,
{
    let form: TemporaryResidenceForm = context.application.content().decode()?;
    let today = context.signed_at.date_naive();

    let start_date = form_date_or(&form.start_date, today);
    let latest_end = latest_residence_end(start_date);
    // Stays are capped at two years from the start date.
    let end_date = parse_form_date(&form.end_date)
        .unwrap_or(latest_end)
        .min(latest_end);
    if end_date < start_date {
        return Err(ContentError::InvalidField {
            field: "EndDate",
            value: form.end_date,
        }
        .into());
    }

    let citizen = if form.applicant_cccd.is_empty() {
        None
    } else {
        store
            .citizen_by_national_id(&form.applicant_cccd)?
            .map(|citizen| citizen.id)
    };

    let record = TemporaryResidence {
        registration_number: registration_number(
            "TT",
            context.signed_at.year(),
            context.application.id,
        ),
        source_application: context.application.id,
        address: form.address(),
        citizen_national_id: form.applicant_cccd,
        citizen_name: form.applicant_name,
        citizen_phone: form.applicant_phone,
        citizen,
        ward: form.ward,
        district: form.district,
        province: form.province,
        start_date,
        end_date,
        owner_national_id: form.owner_cccd,
        owner_name: form.owner_name,
        owner_phone: form.owner_phone,
        registration_type: RegistrationType::from_label(&form.registration_type),
        status: ResidenceStatus::Active,
        signer_id: context.signer.clone(),
        signed_at: context.signed_at,
    };

    store.insert_temporary_residence(record.clone())?;
    Ok(record)
}
