use crate::infra::{parse_date, parse_installment, LoggingNotifier};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use school_ledger::documents::{
    certificate_layout, receipt_layout, Attachment, CertificateRequest, Letterhead, PdfRenderer,
};
use school_ledger::config::AppConfig;
use school_ledger::error::AppError;
use school_ledger::realtime::{CacheUpdate, ChangeFeed, RowFilter, Table, TableCache};
use school_ledger::session::{Role, SchoolSession};
use school_ledger::staff::{
    InMemoryStaffStore, OnboardingRequest, StaffOnboardingService, StaffRole,
};
use school_ledger::tuition::{
    allocate, classify, format_xof, AcademicYear, AllocationBreakdown, AllocationInput,
    InMemoryTuitionStore, NewClass, NewPayment, NewStudent, PaymentMethod, ScheduleEntry,
    TuitionFeeDraft, TuitionPayment, TuitionService, TuitionServiceError, Xof,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEMO_SCHOOL: &str = "sch-demo";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Write the receipt of the first recorded payment to this PDF file.
    #[arg(long)]
    pub(crate) receipt_out: Option<PathBuf>,
    /// Write a frequency certificate for the first student to this PDF file.
    #[arg(long)]
    pub(crate) certificate_out: Option<PathBuf>,
    /// Skip the staff onboarding portion of the demo.
    #[arg(long)]
    pub(crate) skip_staff: bool,
}

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// School year the installment months belong to (YYYY-YYYY)
    #[arg(long, value_parser = AcademicYear::parse)]
    pub(crate) academic_year: AcademicYear,
    /// Registration fee in F CFA
    #[arg(long, default_value_t = 0)]
    pub(crate) registration_fee: Xof,
    /// Annex fees in F CFA
    #[arg(long, default_value_t = 0)]
    pub(crate) other_fees: Xof,
    /// Tuition amount in F CFA
    #[arg(long)]
    pub(crate) tuition: Xof,
    /// Installment as NUMBER:MONTH:AMOUNT; repeat for each installment
    #[arg(long, value_parser = parse_installment)]
    pub(crate) installment: Vec<ScheduleEntry>,
    /// Sum of every payment made so far
    #[arg(long)]
    pub(crate) total_paid: Xof,
    /// Amount of the earliest payment (defaults to the total)
    #[arg(long)]
    pub(crate) first_payment: Option<Xof>,
    /// Evaluation date for the status badge (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs {
        academic_year,
        registration_fee,
        other_fees,
        tuition,
        installment,
        total_paid,
        first_payment,
        today,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let input = AllocationInput {
        total_paid,
        registration_fee,
        other_fees,
        tuition_amount: tuition,
        schedule: &installment,
        first_payment_amount: Some(first_payment.unwrap_or(total_paid)),
        academic_year,
    };
    input.check().map_err(TuitionServiceError::from)?;
    let breakdown = allocate(&input);

    println!("Allocation for {academic_year} (paid {})", format_xof(total_paid));
    print_breakdown(&breakdown);
    let policy = AppConfig::load()?.ledger.status_policy();
    let status = classify(Some(&breakdown), today, policy);
    println!("Status on {}: {}", today.format("%d/%m/%Y"), status.label());
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        receipt_out,
        certificate_out,
        skip_staff,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let year = AcademicYear::containing(today);
    let opening = year.month_start(9).unwrap_or(today);
    let session = SchoolSession::new(DEMO_SCHOOL, Role::Admin).with_user("usr-demo");

    let feed = ChangeFeed::new(64);
    let store = InMemoryTuitionStore::with_feed(feed.clone());
    let policy = AppConfig::load()?.ledger.status_policy();
    let service = TuitionService::new(Arc::new(store), policy);
    let mut payment_events = feed.subscribe(Table::TuitionPayments, RowFilter::default());
    let mut payment_cache: TableCache<TuitionPayment> = TableCache::default();

    println!("School ledger demo for {year}, as of {}", today.format("%d/%m/%Y"));

    let class = service.create_class(
        &session,
        NewClass {
            name: "CM2 A".to_string(),
            level: Some("CM2".to_string()),
        },
    )?;
    service.define_tuition_fee(
        &session,
        &class.id,
        TuitionFeeDraft {
            academic_year: year,
            total_amount: 90_000,
            registration_fee: 25_000,
            other_fees: 10_000,
            schedule: vec![
                installment(1, 10, 30_000),
                installment(2, 1, 30_000),
                installment(3, 4, 30_000),
            ],
        },
    )?;

    let roster = [
        ("24-0001", "Aya", "Kouassi", &[(125_000, 2)][..]),
        ("24-0002", "Moussa", "Diallo", &[(40_000, 3), (25_000, 40)][..]),
        ("24-0003", "Fatou", "Bamba", &[(15_000, 5)][..]),
        ("24-0004", "Yao", "N'Guessan", &[][..]),
    ];

    let mut first_payment = None;
    let mut first_student = None;
    for (matricule, first_name, last_name, payments) in roster {
        let student = service.enroll_student(
            &session,
            NewStudent {
                class_id: class.id.clone(),
                matricule: matricule.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                birth_date: NaiveDate::from_ymd_opt(year.start_year() - 10, 3, 14),
                birth_place: Some("Abidjan".to_string()),
                parent_phone: None,
            },
        )?;
        for (amount, offset) in payments {
            let payment_date = opening + Duration::days(*offset);
            if payment_date > today {
                continue;
            }
            let payment = service.record_payment(
                &session,
                &student.id,
                NewPayment {
                    amount: *amount,
                    payment_date,
                    payment_method: PaymentMethod::MobileMoney,
                    reference: Some(format!("OM-{matricule}-{offset}")),
                },
            )?;
            first_payment.get_or_insert_with(|| (student.id.clone(), payment.id.clone()));
        }
        first_student.get_or_insert(student);
    }

    let status = service.class_status(&session, &class.id, today)?;
    println!("\nPayment status for {}", status.class.name);
    for summary in &status.students {
        println!(
            "- {:<8} {:<22} paid {:>14} | balance {:>14} | {}",
            summary.matricule,
            summary.full_name,
            format_xof(summary.total_paid),
            format_xof(summary.balance),
            summary.status_label
        );
    }

    if let Some(student) = &first_student {
        let statement = service.statement(&session, &student.id, today)?;
        println!("\nStatement for {}", statement.student.full_name());
        if let Some(breakdown) = &statement.breakdown {
            print_breakdown(breakdown);
        }
    }

    let report = service.treasury_report(&session, opening.min(today), today, today)?;
    println!(
        "\nTreasury since {}: {} collected over {} payment(s), {}% of {} expected",
        report.from.format("%d/%m/%Y"),
        format_xof(report.collected_in_period),
        report.payment_count,
        report.collection_rate_pct,
        format_xof(report.expected_total)
    );
    for method in report.by_method.iter().filter(|method| method.count > 0) {
        println!("  - {}: {}", method.label, format_xof(method.amount));
    }

    let updates = payment_cache.drain(&mut payment_events);
    let inserted = updates
        .iter()
        .filter(|update| **update == CacheUpdate::Inserted)
        .count();
    println!(
        "Payment cache mirrored {inserted} change event(s), {} row(s) held",
        payment_cache.len()
    );

    let letterhead = Letterhead {
        address: Some("Cocody, Abidjan".to_string()),
        phone: Some("+225 27 22 00 00 00".to_string()),
        ..Letterhead::named("Groupe Scolaire Les Palmiers")
    };

    if let (Some(path), Some((student_id, payment_id))) = (receipt_out, &first_payment) {
        let receipt =
            service.receipt(&session, student_id, payment_id, letterhead.clone(), today)?;
        let attachment = Attachment::render(
            &PdfRenderer,
            &receipt.file_stem(),
            &receipt_layout(&receipt),
        )?;
        write_attachment(&path, &attachment)?;
    }

    if let (Some(path), Some(student)) = (certificate_out, &first_student) {
        let certificate = CertificateRequest {
            letterhead: None,
            certificate_number: None,
            issued_on: Some(today),
            issued_at: Some("Abidjan".to_string()),
            student_name: student.full_name(),
            matricule: student.matricule.clone(),
            birth_date: student.birth_date,
            birth_place: student.birth_place.clone(),
            class_name: class.name.clone(),
            academic_year: Some(year),
            signatory: None,
        }
        .into_certificate(&letterhead, today)?;
        let attachment = Attachment::render(
            &PdfRenderer,
            &certificate.file_stem(),
            &certificate_layout(&certificate),
        )?;
        write_attachment(&path, &attachment)?;
    }

    if !skip_staff {
        run_staff_demo(today)?;
    }

    Ok(())
}

fn run_staff_demo(today: NaiveDate) -> Result<(), AppError> {
    let store = InMemoryStaffStore::default();
    let notifier = LoggingNotifier::default();
    let service = StaffOnboardingService::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(notifier.clone()),
    );

    let outcome = service.onboard(
        &SchoolSession::new(DEMO_SCHOOL, Role::Hr),
        OnboardingRequest {
            email: "c.kone@palmiers.ci".to_string(),
            password: "bienvenue".to_string(),
            password_confirmation: "bienvenue".to_string(),
            first_name: "Clarisse".to_string(),
            last_name: "Koné".to_string(),
            phone: None,
            role: StaffRole::Accountant,
            position: None,
            base_salary: 250_000,
            start_date: today,
        },
    )?;

    println!(
        "\nOnboarded {} ({}) as {} with base salary {}",
        outcome.user.email,
        outcome.user.id,
        outcome.payroll.position,
        format_xof(outcome.payroll.base_salary)
    );
    for notification in notifier.delivered() {
        println!("  notification: {} - {}", notification.title, notification.message);
    }
    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn installment(installment_number: u32, due_month: u32, amount: Xof) -> ScheduleEntry {
    ScheduleEntry {
        installment_number,
        due_month,
        amount,
    }
}

fn print_breakdown(breakdown: &AllocationBreakdown) {
    println!(
        "{:<28} {:>16} {:>16} {:>16}",
        "Désignation", "Montant dû", "Montant payé", "Reste à payer"
    );
    for row in breakdown.rows() {
        println!(
            "{:<28} {:>16} {:>16} {:>16}",
            row.label,
            format_xof(row.due),
            format_xof(row.paid),
            format_xof(row.balance)
        );
    }
}

fn write_attachment(path: &Path, attachment: &Attachment) -> Result<(), AppError> {
    fs::write(path, &attachment.bytes)?;
    println!(
        "Wrote {} ({} bytes) to {}",
        attachment.filename,
        attachment.bytes.len(),
        path.display()
    );
    Ok(())
}
