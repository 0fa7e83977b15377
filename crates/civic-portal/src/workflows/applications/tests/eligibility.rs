use chrono::NaiveDate;

use super::common::*;
use crate::workflows::applications::repository::{RecordLedger, RecordStore};
use crate::workflows::applications::{
    ActorId, ApplicationId, EligibilityPolicy, EligibilityVerifier, MarriageForm,
};
use crate::workflows::registry::{
    registration_number, NewCitizen, RegistrationType, ResidenceStatus, TemporaryResidence,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn couple(applicant_dob: &str, spouse_dob: &str) -> MarriageForm {
    MarriageForm {
        applicant_name: "Nguyen Van An".to_string(),
        applicant_cccd: "001094000001".to_string(),
        applicant_dob: applicant_dob.to_string(),
        applicant_gender: "Nam".to_string(),
        spouse_name: "Tran Thi Binh".to_string(),
        spouse_cccd: "001096000002".to_string(),
        spouse_dob: spouse_dob.to_string(),
        spouse_gender: "Nữ".to_string(),
        ..MarriageForm::default()
    }
}

fn seed_residence(harness: &Harness, national_id: &str, end_date: NaiveDate) {
    let mut uow = harness.store.begin().expect("begin");
    uow.insert_temporary_residence(TemporaryResidence {
        registration_number: registration_number("TT", 2025, ApplicationId(77)),
        source_application: ApplicationId(77),
        citizen_national_id: national_id.to_string(),
        citizen_name: "Le Van Cuong".to_string(),
        citizen_phone: "0912345678".to_string(),
        citizen: None,
        address: "18 Tran Thai Tong, Dich Vong, Cau Giay, Ha Noi".to_string(),
        ward: "Dich Vong".to_string(),
        district: "Cau Giay".to_string(),
        province: "Ha Noi".to_string(),
        start_date: date(2025, 1, 1),
        end_date,
        owner_national_id: "001070000321".to_string(),
        owner_name: "Pham Thi Dung".to_string(),
        owner_phone: "0987654321".to_string(),
        registration_type: RegistrationType::New,
        status: ResidenceStatus::Active,
        signer_id: chairman(),
        signed_at: start(),
    })
    .expect("residence inserted");
    uow.commit().expect("commit");
}

fn fixed_service() -> Harness {
    let mut harness = build_service();
    harness.service = harness.service.with_clock(fixed_clock(start()));
    harness
}

#[test]
fn age_thresholds_are_inclusive_on_the_birthday() {
    let harness = fixed_service();

    // today is 2026-03-10: the applicant turns 20 and the spouse 18 exactly today.
    let report = harness
        .service
        .verify_marriage(&couple("2006-03-10", "2008-03-10"))
        .expect("report");
    assert!(report.check("applicant_age").expect("present").passed);
    assert!(report.check("spouse_age").expect("present").passed);
    assert!(report.all_passed, "{report:?}");

    let report = harness
        .service
        .verify_marriage(&couple("2006-03-11", "2008-03-11"))
        .expect("report");
    let applicant = report.check("applicant_age").expect("present");
    assert!(!applicant.passed);
    assert!(applicant.message.contains("19"), "{}", applicant.message);
    assert!(!report.check("spouse_age").expect("present").passed);
    assert!(!report.all_passed);
}

#[test]
fn unreadable_birth_dates_fail_the_age_check() {
    let harness = fixed_service();
    let report = harness
        .service
        .verify_marriage(&couple("sometime in 1990", "1996-02-14"))
        .expect("report");
    assert!(!report.check("applicant_age").expect("present").passed);
    assert!(report.check("spouse_age").expect("present").passed);
}

#[test]
fn parties_missing_from_the_registry_pass_with_a_manual_note() {
    let harness = fixed_service();
    let report = harness
        .service
        .verify_marriage(&couple("1994-08-20", "1996-02-14"))
        .expect("report");

    let names: Vec<_> = report.checks.iter().map(|check| check.check.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "applicant_age",
            "spouse_age",
            "applicant_marital_status",
            "spouse_marital_status",
            "blood_relation",
        ]
    );
    let status = report.check("spouse_marital_status").expect("present");
    assert!(status.passed);
    assert!(status.message.contains("manual"), "{}", status.message);
    assert!(report.all_passed);
}

#[test]
fn an_active_marriage_fails_the_marital_status_check() {
    let harness = build_service();
    submit_and_sign(&harness, marriage_submission("001094000001", "001096000002"));

    let report = harness
        .service
        .verify_marriage(&couple("1994-08-20", "1996-02-14"))
        .expect("report");
    let applicant = report.check("applicant_marital_status").expect("present");
    assert!(!applicant.passed);
    assert!(applicant.message.contains("KH-2026-"), "{}", applicant.message);
    assert!(!report.check("spouse_marital_status").expect("present").passed);
    assert!(!report.all_passed);
}

#[test]
fn a_shared_registered_parent_fails_the_blood_relation_check() {
    let harness = fixed_service();
    let father = seed_citizen(
        &harness.store,
        new_citizen("001065000009", "Nguyen Van Phu", "Nam"),
    );
    seed_citizen(
        &harness.store,
        NewCitizen {
            father: Some(father.id),
            ..new_citizen("001094000001", "Nguyen Van An", "Nam")
        },
    );
    seed_citizen(
        &harness.store,
        NewCitizen {
            father: Some(father.id),
            ..new_citizen("001096000002", "Tran Thi Binh", "Nữ")
        },
    );

    let report = harness
        .service
        .verify_marriage(&couple("1994-08-20", "1996-02-14"))
        .expect("report");
    assert!(!report.check("blood_relation").expect("present").passed);
    assert!(report.check("applicant_marital_status").expect("present").passed);
}

#[test]
fn stricter_policies_raise_the_age_floor() {
    let mut harness = fixed_service();
    harness.service = harness
        .service
        .with_verifier(EligibilityVerifier::new(EligibilityPolicy {
            minimum_marriage_age_male: 25,
            minimum_marriage_age_female: 22,
        }));

    let report = harness
        .service
        .verify_marriage(&couple("2004-01-01", "2005-01-01"))
        .expect("report");
    assert!(!report.check("applicant_age").expect("present").passed);
    assert!(!report.check("spouse_age").expect("present").passed);
}

#[test]
fn temporary_residence_in_force_blocks_a_new_registration() {
    let harness = fixed_service();
    seed_residence(&harness, "001099000123", date(2026, 12, 31));

    let report = harness
        .service
        .verify_temporary_residence(" 001099000123 ")
        .expect("report");
    let active = report.check("active_temporary_residence").expect("present");
    assert!(!active.passed);
    assert!(active.message.contains("2026-12-31"), "{}", active.message);
    assert!(report.check("criminal_record").expect("present").passed);
    assert!(!report.all_passed);
}

#[test]
fn expired_residences_and_unknown_citizens_pass() {
    let harness = fixed_service();
    seed_residence(&harness, "001099000123", date(2026, 3, 10));

    let report = harness
        .service
        .verify_temporary_residence("001099000123")
        .expect("report");
    assert!(report.all_passed, "{report:?}");
    let names: Vec<_> = report.checks.iter().map(|check| check.check.as_str()).collect();
    assert_eq!(
        names,
        vec!["active_temporary_residence", "criminal_record", "citizen_record"]
    );
    let citizen_check = report.check("citizen_record").expect("present");
    assert!(citizen_check.message.contains("Not yet"), "{}", citizen_check.message);
}

#[test]
fn registered_citizens_are_described_in_the_residence_report() {
    let harness = fixed_service();
    seed_citizen(
        &harness.store,
        new_citizen("001099000123", "Le Van Cuong", "Nam"),
    );

    let report = harness
        .service
        .verify_temporary_residence("001099000123")
        .expect("report");
    let citizen_check = report.check("citizen_record").expect("present");
    assert!(citizen_check.passed);
    assert!(citizen_check.message.contains("Le Van Cuong"), "{}", citizen_check.message);
}

#[test]
fn eligibility_checks_do_not_write() {
    let harness = fixed_service();
    harness
        .service
        .verify_marriage(&couple("1994-08-20", "1996-02-14"))
        .expect("report");
    harness
        .service
        .verify_temporary_residence("001099000123")
        .expect("report");

    assert!(harness
        .service
        .applications_for(&ActorId::new("citizen-an"))
        .expect("list")
        .is_empty());
    let residences = read(&harness.store, |uow| {
        uow.residences_of("001099000123").expect("ledger")
    });
    assert!(residences.is_empty());
}
