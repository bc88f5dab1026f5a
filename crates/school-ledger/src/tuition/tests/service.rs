use std::sync::Arc;

use chrono::NaiveDate;

use super::common::*;

use crate::documents::Letterhead;
use crate::session::SessionError;
use crate::tuition::domain::{ClassId, PaymentMethod, StudentId, MAX_AMOUNT};
use crate::tuition::repository::{RepositoryError, TuitionRepository};
use crate::tuition::service::{
    NewClass, TuitionService, TuitionServiceError, ValidationError, MAX_REPORT_DAYS,
};
use crate::tuition::status::{PaymentStatus, StatusBucket, StatusPolicy};

#[test]
fn statement_tracks_payments_through_the_waterfall() {
    let (service, _) = build_service();
    let (_, student) = seeded_student(&service, "MAT-001", "KOUASSI");

    service
        .record_payment(&accountant(), &student.id, new_payment(50_000, date(2025, 9, 3)))
        .expect("first payment");
    service
        .record_payment(&accountant(), &student.id, new_payment(20_000, date(2025, 10, 15)))
        .expect("second payment");

    let statement = service
        .statement(&parent(), &student.id, date(2025, 11, 25))
        .expect("statement");

    assert_eq!(statement.total_due, 125_000);
    assert_eq!(statement.total_paid, 70_000);
    assert_eq!(statement.balance, 55_000);
    let breakdown = statement.breakdown.as_ref().expect("fee defined");
    assert_eq!(breakdown.installments[0].paid, 30_000);
    assert_eq!(breakdown.installments[1].paid, 5_000);
    assert_eq!(
        statement.status,
        PaymentStatus::DueSoon {
            installment_number: 2,
            days_remaining: 6
        }
    );
    assert_eq!(statement.status_label, "Échéance dans 6 jours");
    assert_eq!(
        statement.next_due.as_ref().map(|entry| entry.installment_number),
        Some(2)
    );
}

#[test]
fn same_day_payments_keep_recording_order() {
    let (service, _) = build_service();
    let (_, student) = seeded_student(&service, "MAT-002", "KONAN");

    // Underpaid account: only the first recorded payment feeds registration.
    service
        .record_payment(&accountant(), &student.id, new_payment(5_000, date(2025, 9, 3)))
        .expect("first payment");
    service
        .record_payment(&accountant(), &student.id, new_payment(8_000, date(2025, 9, 3)))
        .expect("second payment");

    let statement = service
        .statement(&parent(), &student.id, date(2025, 9, 4))
        .expect("statement");
    let breakdown = statement.breakdown.expect("fee defined");
    assert_eq!(breakdown.registration.paid, 5_000);
    assert_eq!(breakdown.tuition.paid, 8_000);
}

#[test]
fn student_without_fee_has_no_fees_status() {
    let (service, _) = build_service();
    let class = service
        .create_class(
            &admin(),
            NewClass {
                name: "Maternelle".to_string(),
                level: None,
            },
        )
        .expect("class");
    let student = enroll(&service, &class.id, "MAT-003", "YAO");

    let statement = service
        .statement(&parent(), &student.id, date(2025, 10, 1))
        .expect("statement");
    assert_eq!(statement.status, PaymentStatus::NoFees);
    assert!(statement.breakdown.is_none());
    assert_eq!(statement.total_due, 0);
}

#[test]
fn redefining_a_fee_replaces_the_same_year() {
    let (service, store) = build_service();
    let (class, _) = seeded_student(&service, "MAT-004", "DIALLO");

    let mut cheaper = fee_draft();
    cheaper.registration_fee = 15_000;
    service
        .define_tuition_fee(&accountant(), &class.id, cheaper)
        .expect("redefinition");

    let fees = store
        .tuition_fees(&accountant().school_id, &class.id)
        .expect("fees readable");
    assert_eq!(fees.len(), 1);
    assert_eq!(fees[0].registration_fee, 15_000);
}

#[test]
fn latest_academic_year_wins() {
    let (service, store) = build_service();
    let (class, _) = seeded_student(&service, "MAT-005", "BAMBA");

    let mut next_year = fee_draft();
    next_year.academic_year = crate::tuition::domain::AcademicYear::starting(2026);
    next_year.other_fees = 12_000;
    service
        .define_tuition_fee(&accountant(), &class.id, next_year)
        .expect("next year fee");

    let current = store
        .current_tuition_fee(&accountant().school_id, &class.id)
        .expect("readable")
        .expect("fee present");
    assert_eq!(current.academic_year.to_string(), "2026-2027");
}

#[test]
fn fee_validation_rejects_bad_schedules() {
    let (service, _) = build_service();
    let (class, _) = seeded_student(&service, "MAT-006", "OUATTARA");

    let mut bad_month = fee_draft();
    bad_month.schedule = vec![entry(1, 13, 90_000)];
    assert!(matches!(
        service.define_tuition_fee(&accountant(), &class.id, bad_month),
        Err(TuitionServiceError::Validation(ValidationError::InvalidMonth {
            installment: 1,
            month: 13
        }))
    ));

    let mut duplicate = fee_draft();
    duplicate.schedule = vec![entry(1, 10, 45_000), entry(1, 11, 45_000)];
    assert!(matches!(
        service.define_tuition_fee(&accountant(), &class.id, duplicate),
        Err(TuitionServiceError::Validation(
            ValidationError::DuplicateInstallment(1)
        ))
    ));

    let mut negative = fee_draft();
    negative.other_fees = -1;
    assert!(matches!(
        service.define_tuition_fee(&accountant(), &class.id, negative),
        Err(TuitionServiceError::Validation(ValidationError::NegativeAmount(
            "other_fees"
        )))
    ));
}

#[test]
fn fee_amounts_past_the_ceiling_are_rejected() {
    let (service, _) = build_service();
    let (class, _) = seeded_student(&service, "MAT-006B", "GNAGNE");

    let mut huge = fee_draft();
    huge.registration_fee = i64::MAX;
    huge.other_fees = 1;
    assert!(matches!(
        service.define_tuition_fee(&accountant(), &class.id, huge),
        Err(TuitionServiceError::Validation(ValidationError::AmountTooLarge(
            "registration_fee"
        )))
    ));

    let mut huge_installment = fee_draft();
    huge_installment.schedule = vec![entry(1, 10, MAX_AMOUNT + 1)];
    assert!(matches!(
        service.define_tuition_fee(&accountant(), &class.id, huge_installment),
        Err(TuitionServiceError::Validation(ValidationError::AmountTooLarge(
            "schedule.amount"
        )))
    ));

    let mut at_ceiling = fee_draft();
    at_ceiling.total_amount = MAX_AMOUNT;
    at_ceiling.schedule = Vec::new();
    let fee = service
        .define_tuition_fee(&accountant(), &class.id, at_ceiling)
        .expect("ceiling is accepted");
    assert_eq!(fee.total_due(), MAX_AMOUNT + 35_000);
}

#[test]
fn payments_must_be_positive() {
    let (service, _) = build_service();
    let (_, student) = seeded_student(&service, "MAT-007", "COULIBALY");

    assert!(matches!(
        service.record_payment(&accountant(), &student.id, new_payment(0, date(2025, 9, 3))),
        Err(TuitionServiceError::Validation(
            ValidationError::NonPositivePayment
        ))
    ));
    assert!(matches!(
        service.record_payment(
            &accountant(),
            &student.id,
            new_payment(MAX_AMOUNT + 1, date(2025, 9, 3))
        ),
        Err(TuitionServiceError::Validation(ValidationError::AmountTooLarge(
            "amount"
        )))
    ));
}

#[test]
fn parents_cannot_record_payments_or_define_fees() {
    let (service, _) = build_service();
    let (class, student) = seeded_student(&service, "MAT-008", "TOURE");

    assert!(matches!(
        service.record_payment(&parent(), &student.id, new_payment(1_000, date(2025, 9, 3))),
        Err(TuitionServiceError::Session(SessionError::Forbidden { .. }))
    ));
    assert!(matches!(
        service.define_tuition_fee(&parent(), &class.id, fee_draft()),
        Err(TuitionServiceError::Session(SessionError::Forbidden { .. }))
    ));
}

#[test]
fn other_schools_cannot_see_students() {
    let (service, _) = build_service();
    let (_, student) = seeded_student(&service, "MAT-009", "KOFFI");

    let outsider = crate::session::SchoolSession::new("sch-2", crate::session::Role::Admin);
    assert!(matches!(
        service.statement(&outsider, &student.id, date(2025, 10, 1)),
        Err(TuitionServiceError::StudentNotFound(_))
    ));
}

#[test]
fn enrolling_into_unknown_class_fails() {
    let (service, _) = build_service();
    let result = service.enroll_student(
        &admin(),
        crate::tuition::service::NewStudent {
            class_id: ClassId::from("cls-missing"),
            matricule: "MAT-010".to_string(),
            first_name: "Ali".to_string(),
            last_name: "SANOGO".to_string(),
            birth_date: None,
            birth_place: None,
            parent_phone: None,
        },
    );
    assert!(matches!(result, Err(TuitionServiceError::ClassNotFound(_))));
}

#[test]
fn class_status_lists_students_by_name() {
    let (service, _) = build_service();
    let (class, zadi) = seeded_student(&service, "MAT-011", "ZADI");
    let adou = enroll(&service, &class.id, "MAT-012", "ADOU");

    service
        .record_payment(&accountant(), &zadi.id, new_payment(125_000, date(2025, 9, 3)))
        .expect("full payment");

    let status = service
        .class_status(&parent(), &class.id, date(2025, 10, 20))
        .expect("class status");
    let names: Vec<&str> = status
        .students
        .iter()
        .map(|summary| summary.full_name.as_str())
        .collect();
    assert_eq!(names, ["ADOU Aya", "ZADI Aya"]);
    assert_eq!(status.students[0].student_id, adou.id.0);
    assert_eq!(status.students[0].status.bucket(), StatusBucket::Overdue);
    assert_eq!(status.students[1].status, PaymentStatus::Settled);
}

#[test]
fn treasury_report_aggregates_the_period() {
    let (service, _) = build_service();
    let (_, first) = seeded_student(&service, "MAT-013", "ASSI");
    let (_, second) = seeded_student(&service, "MAT-014", "BROU");

    service
        .record_payment(&accountant(), &first.id, new_payment(60_000, date(2025, 9, 2)))
        .expect("payment");
    let mut cash = new_payment(20_000, date(2025, 9, 3));
    cash.payment_method = PaymentMethod::Cash;
    service
        .record_payment(&accountant(), &second.id, cash)
        .expect("payment");
    service
        .record_payment(&accountant(), &second.id, new_payment(5_000, date(2025, 9, 15)))
        .expect("payment outside range");

    let report = service
        .treasury_report(&accountant(), date(2025, 9, 1), date(2025, 9, 3), date(2025, 9, 3))
        .expect("report");

    assert_eq!(report.collected_in_period, 80_000);
    assert_eq!(report.payment_count, 2);
    assert_eq!(report.daily.len(), 3);
    assert_eq!(report.daily[1].amount, 60_000);
    assert_eq!(report.daily[2].delta, Some(-40_000));

    let mobile = report
        .by_method
        .iter()
        .find(|total| total.method == PaymentMethod::MobileMoney)
        .expect("method listed");
    assert_eq!((mobile.amount, mobile.count), (60_000, 1));

    assert_eq!(report.expected_total, 250_000);
    assert_eq!(report.collected_to_date, 80_000);
    assert_eq!(report.outstanding_total, 170_000);
    assert_eq!(report.collection_rate_pct, 32.0);
    // first: 25 000 + 10 000 + 25 000 tuition; second underpaid: 20 000 on registration.
    assert_eq!(report.allocated.registration, 45_000);
    assert_eq!(report.allocated.other_fees, 10_000);
    assert_eq!(report.allocated.tuition, 25_000);
}

#[test]
fn treasury_report_is_finance_only_and_checks_range() {
    let (service, _) = build_service();
    assert!(matches!(
        service.treasury_report(&parent(), date(2025, 9, 1), date(2025, 9, 30), date(2025, 9, 30)),
        Err(TuitionServiceError::Session(SessionError::Forbidden { .. }))
    ));
    assert!(matches!(
        service.treasury_report(&admin(), date(2025, 9, 30), date(2025, 9, 1), date(2025, 9, 30)),
        Err(TuitionServiceError::Validation(
            ValidationError::InvalidRange { .. }
        ))
    ));
}

#[test]
fn treasury_report_caps_the_range() {
    let (service, _) = build_service();
    let result = service.treasury_report(
        &accountant(),
        NaiveDate::MIN,
        NaiveDate::MAX,
        date(2025, 9, 30),
    );
    assert!(matches!(
        result,
        Err(TuitionServiceError::Validation(ValidationError::RangeTooWide {
            max: MAX_REPORT_DAYS,
            ..
        }))
    ));

    let year = service
        .treasury_report(&accountant(), date(2025, 9, 1), date(2026, 9, 1), date(2025, 9, 30))
        .expect("a full year and a day fits");
    assert_eq!(year.daily.len(), MAX_REPORT_DAYS as usize);
    let too_long = service.treasury_report(
        &accountant(),
        date(2025, 9, 1),
        date(2026, 9, 2),
        date(2025, 9, 30),
    );
    assert!(matches!(
        too_long,
        Err(TuitionServiceError::Validation(
            ValidationError::RangeTooWide { days: 367, .. }
        ))
    ));

    let last_day = service
        .treasury_report(&accountant(), NaiveDate::MAX, NaiveDate::MAX, date(2025, 9, 30))
        .expect("last representable day");
    assert_eq!(last_day.daily.len(), 1);
}

#[test]
fn receipt_reflects_ledger_up_to_that_payment() {
    let (service, _) = build_service();
    let (_, student) = seeded_student(&service, "MAT-015", "GBAGBO");

    let first = service
        .record_payment(&accountant(), &student.id, new_payment(50_000, date(2025, 9, 3)))
        .expect("payment");
    service
        .record_payment(&accountant(), &student.id, new_payment(40_000, date(2025, 10, 3)))
        .expect("payment");

    let receipt = service
        .receipt(
            &accountant(),
            &student.id,
            &first.id,
            Letterhead::named("Groupe Scolaire"),
            date(2025, 10, 5),
        )
        .expect("receipt");

    assert_eq!(receipt.payment_amount, 50_000);
    assert_eq!(receipt.breakdown.total.paid, 50_000);
    assert_eq!(receipt.breakdown.installments[0].paid, 15_000);
    assert_eq!(receipt.cashier.as_deref(), Some("usr-compta"));
    assert!(receipt.receipt_number.starts_with("REC-"));
}

#[test]
fn receipt_for_someone_elses_payment_is_not_found() {
    let (service, _) = build_service();
    let (_, owner) = seeded_student(&service, "MAT-016", "KOUAME");
    let (_, other) = seeded_student(&service, "MAT-017", "NGUESSAN");
    let payment = service
        .record_payment(&accountant(), &owner.id, new_payment(10_000, date(2025, 9, 3)))
        .expect("payment");

    assert!(matches!(
        service.receipt(
            &accountant(),
            &other.id,
            &payment.id,
            Letterhead::named("X"),
            date(2025, 9, 3)
        ),
        Err(TuitionServiceError::PaymentNotFound(_))
    ));
}

#[test]
fn repository_failures_surface() {
    let service = TuitionService::new(Arc::new(UnavailableRepository), StatusPolicy::default());
    assert!(matches!(
        service.statement(&parent(), &StudentId::from("stu-1"), date(2025, 9, 1)),
        Err(TuitionServiceError::Repository(RepositoryError::Unavailable(_)))
    ));

    let conflicting = TuitionService::new(Arc::new(ConflictRepository), StatusPolicy::default());
    assert!(matches!(
        conflicting.create_class(
            &admin(),
            NewClass {
                name: "CP1".to_string(),
                level: None
            }
        ),
        Err(TuitionServiceError::Repository(RepositoryError::Conflict))
    ));
}
