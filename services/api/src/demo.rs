use crate::infra::{Backends, PortalService};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use civic_portal::config::RegistryConfig;
use civic_portal::error::AppError;
use civic_portal::workflows::applications::{
    Account, ActorId, ApplicationId, ApplicationServiceError, ApplicationStatus,
    ApplicationSubmission, ContentDocument, DerivationOutcome, MarriageForm, ServiceTypeId,
    UploadedFile,
};
use civic_portal::workflows::registry::DerivedRecord;
use clap::Args;
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day the demo runs on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Seed for generated citizen ids, for repeatable output.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Skip the temporary residence portion of the demo.
    #[arg(long)]
    pub(crate) skip_residence: bool,
}

const CITIZEN: &str = "citizen-hai";
const SPOUSE: &str = "citizen-ha";
const OFFICIAL: &str = "official-lan";
const CHAIRMAN: &str = "chairman-tuan";

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        seed,
        skip_residence,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let opened = Utc.from_utc_datetime(&today.and_hms_opt(8, 0, 0).unwrap_or_default());

    let backends = Backends::in_memory();
    backends.accounts.register(Account {
        user_id: ActorId::new(SPOUSE),
        full_name: "Do Thu Ha".to_string(),
        national_id: "001097005522".to_string(),
        address: None,
    })
    .map_err(ApplicationServiceError::from)?;

    let mut service = backends
        .service(RegistryConfig::default())
        .with_clock(Arc::new(move || opened));
    if let Some(seed) = seed {
        service = service.with_rng_seed(seed);
    }

    println!("Civic services portal demo ({today})");
    println!("\nService catalog");
    for service_type in service.catalog().iter() {
        println!(
            "- [{}] {} | fee {} VND",
            service_type.id, service_type.name, service_type.fee_vnd
        );
    }

    let marriage = marriage_walkthrough(&service)?;
    birth_walkthrough(&service, marriage)?;
    if !skip_residence {
        residence_walkthrough(&service)?;
    }

    let gaps = service.derivation_audit()?;
    println!("\nDerivation audit: {} signed application(s) without a record", gaps.len());
    for gap in gaps {
        let reasons: Vec<_> = gap.issues.iter().map(|issue| issue.reason.as_str()).collect();
        println!(
            "- #{} ({}) {}",
            gap.application.id,
            gap.kind.code(),
            reasons.join("; ")
        );
    }

    Ok(())
}

fn submission(service_type: u32, content: serde_json::Value) -> ApplicationSubmission {
    ApplicationSubmission {
        citizen_id: ActorId::new(CITIZEN),
        service_type_id: ServiceTypeId(service_type),
        content: ContentDocument::from_value(content),
        attachments: Vec::new(),
    }
}

fn review_and_sign(service: &PortalService, id: ApplicationId) -> Result<(), AppError> {
    let official = ActorId::new(OFFICIAL);
    service.process(id, &official, ApplicationStatus::InReview, None)?;
    service.process(id, &official, ApplicationStatus::PendingApproval, None)?;
    let signed = service.sign(id, &ActorId::new(CHAIRMAN), None)?;
    println!("  signed #{id}: {}", describe(&signed.derivation));
    Ok(())
}

fn describe(outcome: &DerivationOutcome) -> String {
    match outcome {
        DerivationOutcome::Derived { record } => match record {
            DerivedRecord::Birth(birth) => format!(
                "birth record {} | citizen id {} | parents' marriage verified: {}",
                birth.registration_number,
                birth.generated_citizen_id,
                birth.parents_marriage_verified
            ),
            DerivedRecord::Marriage(marriage) => format!(
                "marriage record {} registered at {}",
                marriage.registration_number, marriage.registration_place
            ),
            DerivedRecord::TemporaryResidence(residence) => format!(
                "temporary residence {} valid {} to {}",
                residence.registration_number, residence.start_date, residence.end_date
            ),
        },
        DerivationOutcome::NotApplicable => "no registry record for this service".to_string(),
        DerivationOutcome::Failed { reason } => format!("record not derived ({reason})"),
    }
}

fn marriage_walkthrough(service: &PortalService) -> Result<ApplicationId, AppError> {
    println!("\nMarriage registration");
    let form = json!({
        "ApplicantName": "Vu Quang Hai",
        "ApplicantCCCD": "001093004411",
        "ApplicantDOB": "1993-11-02",
        "ApplicantGender": "Nam",
        "SpouseName": "Do Thu Ha",
        "SpouseCCCD": "001097005522",
        "SpouseDOB": "1997-06-30",
        "SpouseGender": "Nữ",
    });

    let declared: MarriageForm = ContentDocument::from_value(form.clone())
        .decode()
        .map_err(ApplicationServiceError::from)?;
    let eligibility = service.verify_marriage(&declared)?;
    for check in &eligibility.checks {
        let mark = if check.passed { "ok" } else { "!!" };
        println!("  [{mark}] {}: {}", check.check, check.message);
    }

    let mut filing = submission(2, form);
    filing.attachments.push(UploadedFile {
        file_name: "giay-xac-nhan-tinh-trang-hon-nhan.pdf".to_string(),
        bytes: b"%PDF-1.7".to_vec(),
    });
    let receipt = service.submit(filing)?;
    let id = receipt.application.id;
    println!(
        "  filed #{id} -> {} with {} attachment(s)",
        receipt.application.status,
        receipt.attachments.len()
    );

    if let Some(request) = receipt.confirmation {
        let resolved = service.confirm(request.id, &ActorId::new(SPOUSE))?;
        println!(
            "  spouse {} {} request {}",
            resolved.request.target_user_id, resolved.request.status, resolved.request.id
        );
    }

    review_and_sign(service, id)?;
    Ok(id)
}

fn birth_walkthrough(service: &PortalService, marriage: ApplicationId) -> Result<(), AppError> {
    println!("\nBirth registration (parents married under #{marriage})");
    let receipt = service.submit(submission(
        1,
        json!({
            "ChildFullName": "Vu Minh Anh",
            "DateOfBirth": "2026-04-20",
            "PlaceOfBirth": "Benh vien Bach Mai",
            "Gender": "Nữ",
            "FatherName": "Vu Quang Hai",
            "FatherCCCD": "001093004411",
            "MotherName": "Do Thu Ha",
            "MotherCCCD": "001097005522",
        }),
    ))?;
    review_and_sign(service, receipt.application.id)?;
    service.complete(receipt.application.id, &ActorId::new(CHAIRMAN))?;
    Ok(())
}

fn residence_walkthrough(service: &PortalService) -> Result<(), AppError> {
    println!("\nTemporary residence registrations");
    let report = service.verify_temporary_residence("001093004411")?;
    println!("  eligibility before filing: all passed = {}", report.all_passed);

    let valid = service.submit(submission(
        3,
        json!({
            "RegistrationType": "New",
            "ApplicantName": "Vu Quang Hai",
            "ApplicantCCCD": "001093004411",
            "Province": "Ha Noi",
            "District": "Dong Da",
            "Ward": "Lang Thuong",
            "AddressDetail": "22 Nguyen Chi Thanh",
            "EndDate": "2099-01-01",
        }),
    ))?;
    review_and_sign(service, valid.application.id)?;

    // End date before the start date: signed, but no record can be derived.
    let inverted = service.submit(submission(
        3,
        json!({
            "ApplicantName": "Vu Quang Hai",
            "ApplicantCCCD": "001093004411",
            "FullAddress": "5 Hang Bong, Hoan Kiem, Ha Noi",
            "StartDate": "2026-09-01",
            "EndDate": "2026-08-01",
        }),
    ))?;
    review_and_sign(service, inverted.application.id)?;

    let report = service.verify_temporary_residence("001093004411")?;
    println!("  eligibility after signing: all passed = {}", report.all_passed);
    Ok(())
}
