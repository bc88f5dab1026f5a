use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::allocation::check_amount;
use super::domain::{
    sort_payments, AcademicYear, ClassId, PaymentId, PaymentMethod, ScheduleEntry, SchoolClass,
    Student, StudentId, TuitionFee, TuitionFeeId, TuitionPayment, Xof,
};
use super::report::{build_treasury_report, StudentLedger, TreasuryReport};
use super::repository::{RepositoryError, TuitionRepository};
use super::statement::{allocate_payments, StatementSummary, StudentStatement};
use super::status::StatusPolicy;
use crate::documents::receipt::{Letterhead, PaymentReceipt};
use crate::session::{SchoolSession, SessionError, FINANCE_ROLES, REGISTRAR_ROLES};

/// Longest treasury report window, in days, both ends included.
pub const MAX_REPORT_DAYS: i64 = 366;

static ROW_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    ROW_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{:06}", next_sequence())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClass {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub class_id: ClassId,
    pub matricule: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub parent_phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TuitionFeeDraft {
    pub academic_year: AcademicYear,
    pub total_amount: Xof,
    pub registration_fee: Xof,
    pub other_fees: Xof,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub amount: Xof,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Statement summaries of one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassStatus {
    pub class: SchoolClass,
    pub as_of: NaiveDate,
    pub students: Vec<StatementSummary>,
}

/// Service over the fee tables: writes with validation, reads through the allocator.
pub struct TuitionService<R> {
    repository: Arc<R>,
    policy: StatusPolicy,
}

impl<R> TuitionService<R>
where
    R: TuitionRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: StatusPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn create_class(
        &self,
        session: &SchoolSession,
        request: NewClass,
    ) -> Result<SchoolClass, TuitionServiceError> {
        session.require(REGISTRAR_ROLES, "create classes")?;
        let name = required("name", &request.name)?;

        let class = SchoolClass {
            id: ClassId(next_id("cls")),
            school_id: session.school_id.clone(),
            name,
            level: request.level.filter(|level| !level.trim().is_empty()),
        };
        let stored = self.repository.insert_class(class)?;
        info!(school = %stored.school_id, class = %stored.id, "class created");
        Ok(stored)
    }

    pub fn enroll_student(
        &self,
        session: &SchoolSession,
        request: NewStudent,
    ) -> Result<Student, TuitionServiceError> {
        session.require(REGISTRAR_ROLES, "enroll students")?;
        let matricule = required("matricule", &request.matricule)?;
        let first_name = required("first_name", &request.first_name)?;
        let last_name = required("last_name", &request.last_name)?;
        self.load_class(session, &request.class_id)?;

        let student = Student {
            id: StudentId(next_id("stu")),
            school_id: session.school_id.clone(),
            class_id: request.class_id,
            matricule,
            first_name,
            last_name,
            birth_date: request.birth_date,
            birth_place: request.birth_place,
            parent_phone: request.parent_phone,
        };
        let stored = self.repository.insert_student(student)?;
        info!(school = %stored.school_id, student = %stored.id, "student enrolled");
        Ok(stored)
    }

    /// Define (or redefine) the fee structure of a class for one academic year.
    pub fn define_tuition_fee(
        &self,
        session: &SchoolSession,
        class_id: &ClassId,
        draft: TuitionFeeDraft,
    ) -> Result<TuitionFee, TuitionServiceError> {
        session.require(FINANCE_ROLES, "define tuition fees")?;
        validate_fee(&draft)?;
        self.load_class(session, class_id)?;

        let scheduled: Xof = draft.schedule.iter().map(|entry| entry.amount).sum();
        if !draft.schedule.is_empty() && scheduled != draft.total_amount {
            warn!(
                class = %class_id,
                scheduled,
                tuition = draft.total_amount,
                "installment plan does not add up to tuition"
            );
        }

        let mut schedule = draft.schedule;
        schedule.sort_by_key(|entry| entry.installment_number);

        let fee = TuitionFee {
            id: TuitionFeeId(next_id("fee")),
            school_id: session.school_id.clone(),
            class_id: class_id.clone(),
            academic_year: draft.academic_year,
            total_amount: draft.total_amount,
            registration_fee: draft.registration_fee,
            other_fees: draft.other_fees,
            schedule,
        };
        let stored = self.repository.upsert_tuition_fee(fee)?;
        info!(
            class = %stored.class_id,
            year = %stored.academic_year,
            total_due = stored.total_due(),
            "tuition fee defined"
        );
        Ok(stored)
    }

    /// Append a payment to a student's ledger.
    pub fn record_payment(
        &self,
        session: &SchoolSession,
        student_id: &StudentId,
        request: NewPayment,
    ) -> Result<TuitionPayment, TuitionServiceError> {
        session.require(FINANCE_ROLES, "record payments")?;
        if request.amount <= 0 {
            return Err(ValidationError::NonPositivePayment.into());
        }
        check_amount("amount", request.amount)?;
        self.load_student(session, student_id)?;

        let sequence = next_sequence();
        let payment = TuitionPayment {
            id: PaymentId(format!("pay-{sequence:06}")),
            school_id: session.school_id.clone(),
            student_id: student_id.clone(),
            amount: request.amount,
            payment_date: request.payment_date,
            payment_method: request.payment_method,
            reference: request
                .reference
                .map(|reference| reference.trim().to_string())
                .filter(|reference| !reference.is_empty()),
            sequence,
        };
        let stored = self.repository.insert_payment(payment)?;
        info!(
            student = %stored.student_id,
            payment = %stored.id,
            amount = stored.amount,
            "payment recorded"
        );
        Ok(stored)
    }

    pub fn statement(
        &self,
        session: &SchoolSession,
        student_id: &StudentId,
        today: NaiveDate,
    ) -> Result<StudentStatement, TuitionServiceError> {
        let student = self.load_student(session, student_id)?;
        self.statement_for(session, student, today)
    }

    /// Payment status of every student in a class, ordered by name.
    pub fn class_status(
        &self,
        session: &SchoolSession,
        class_id: &ClassId,
        today: NaiveDate,
    ) -> Result<ClassStatus, TuitionServiceError> {
        let class = self.load_class(session, class_id)?;
        let fee = self
            .repository
            .current_tuition_fee(&session.school_id, class_id)?;

        let mut students = self
            .repository
            .students_in_class(&session.school_id, class_id)?;
        students.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str())
                .cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });

        let students = students
            .into_iter()
            .map(|student| -> Result<StatementSummary, TuitionServiceError> {
                let payments = self
                    .repository
                    .payments_for_student(&session.school_id, &student.id)?;
                Ok(StudentStatement::build(
                    student,
                    Some(class.name.clone()),
                    fee.clone(),
                    payments,
                    today,
                    self.policy,
                )
                .summary())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ClassStatus {
            class,
            as_of: today,
            students,
        })
    }

    pub fn treasury_report(
        &self,
        session: &SchoolSession,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Result<TreasuryReport, TuitionServiceError> {
        session.require(FINANCE_ROLES, "view the treasury report")?;
        if from > to {
            return Err(ValidationError::InvalidRange { from, to }.into());
        }
        let days = (to - from).num_days() + 1;
        if days > MAX_REPORT_DAYS {
            return Err(ValidationError::RangeTooWide {
                days,
                max: MAX_REPORT_DAYS,
            }
            .into());
        }

        let students = self.repository.students(&session.school_id)?;
        let mut payments = self.repository.payments(&session.school_id)?;
        sort_payments(&mut payments);

        let mut ledgers = Vec::with_capacity(students.len());
        for student in students {
            let fee = self
                .repository
                .current_tuition_fee(&session.school_id, &student.class_id)?;
            let own = payments
                .iter()
                .filter(|payment| payment.student_id == student.id)
                .cloned()
                .collect();
            ledgers.push(StudentLedger {
                student,
                fee,
                payments: own,
            });
        }

        Ok(build_treasury_report(&ledgers, from, to, today, self.policy))
    }

    /// Receipt for one payment, with the waterfall as it stood right after that payment.
    pub fn receipt(
        &self,
        session: &SchoolSession,
        student_id: &StudentId,
        payment_id: &PaymentId,
        letterhead: Letterhead,
        issued_on: NaiveDate,
    ) -> Result<PaymentReceipt, TuitionServiceError> {
        let student = self.load_student(session, student_id)?;
        let payment = self
            .repository
            .payment(&session.school_id, payment_id)?
            .filter(|payment| &payment.student_id == student_id)
            .ok_or_else(|| TuitionServiceError::PaymentNotFound(payment_id.clone()))?;

        let class = self
            .repository
            .class(&session.school_id, &student.class_id)?;
        let fee = self
            .repository
            .current_tuition_fee(&session.school_id, &student.class_id)?
            .ok_or_else(|| TuitionServiceError::NoTuitionFee(student.class_id.clone()))?;

        let mut ledger = self
            .repository
            .payments_for_student(&session.school_id, student_id)?;
        sort_payments(&mut ledger);
        let upto = ledger
            .iter()
            .position(|entry| entry.id == payment.id)
            .map(|index| index + 1)
            .unwrap_or(ledger.len());
        ledger.truncate(upto);

        let breakdown = allocate_payments(Some(&fee), &ledger)
            .ok_or_else(|| TuitionServiceError::NoTuitionFee(student.class_id.clone()))?;

        Ok(PaymentReceipt {
            letterhead,
            receipt_number: format!("REC-{}", payment.id.0.trim_start_matches("pay-")),
            issued_on,
            student_name: student.full_name(),
            matricule: student.matricule.clone(),
            class_name: class.map(|class| class.name).unwrap_or_default(),
            academic_year: fee.academic_year,
            payment_amount: payment.amount,
            payment_date: payment.payment_date,
            payment_method: payment.payment_method,
            reference: payment.reference.clone(),
            cashier: session.user_id.clone(),
            breakdown,
        })
    }

    fn statement_for(
        &self,
        session: &SchoolSession,
        student: Student,
        today: NaiveDate,
    ) -> Result<StudentStatement, TuitionServiceError> {
        let class_name = self
            .repository
            .class(&session.school_id, &student.class_id)?
            .map(|class| class.name);
        let fee = self
            .repository
            .current_tuition_fee(&session.school_id, &student.class_id)?;
        let payments = self
            .repository
            .payments_for_student(&session.school_id, &student.id)?;

        Ok(StudentStatement::build(
            student, class_name, fee, payments, today, self.policy,
        ))
    }

    fn load_class(
        &self,
        session: &SchoolSession,
        class_id: &ClassId,
    ) -> Result<SchoolClass, TuitionServiceError> {
        self.repository
            .class(&session.school_id, class_id)?
            .ok_or_else(|| TuitionServiceError::ClassNotFound(class_id.clone()))
    }

    fn load_student(
        &self,
        session: &SchoolSession,
        student_id: &StudentId,
    ) -> Result<Student, TuitionServiceError> {
        self.repository
            .student(&session.school_id, student_id)?
            .ok_or_else(|| TuitionServiceError::StudentNotFound(student_id.clone()))
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn validate_fee(draft: &TuitionFeeDraft) -> Result<(), ValidationError> {
    for (field, amount) in [
        ("total_amount", draft.total_amount),
        ("registration_fee", draft.registration_fee),
        ("other_fees", draft.other_fees),
    ] {
        check_amount(field, amount)?;
    }

    let mut seen = HashSet::new();
    for entry in &draft.schedule {
        if entry.installment_number == 0 {
            return Err(ValidationError::InvalidInstallmentNumber);
        }
        if !(1..=12).contains(&entry.due_month) {
            return Err(ValidationError::InvalidMonth {
                installment: entry.installment_number,
                month: entry.due_month,
            });
        }
        check_amount("schedule.amount", entry.amount)?;
        if !seen.insert(entry.installment_number) {
            return Err(ValidationError::DuplicateInstallment(
                entry.installment_number,
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0} cannot be negative")]
    NegativeAmount(&'static str),
    #[error("{0} exceeds the largest accepted amount")]
    AmountTooLarge(&'static str),
    #[error("first payment {first} must lie between 0 and the total paid {total_paid}")]
    FirstPaymentOutOfRange { first: Xof, total_paid: Xof },
    #[error("payment amount must be greater than zero")]
    NonPositivePayment,
    #[error("installment numbers start at 1")]
    InvalidInstallmentNumber,
    #[error("installment {installment} has invalid due month {month}")]
    InvalidMonth { installment: u32, month: u32 },
    #[error("installment {0} is listed twice")]
    DuplicateInstallment(u32),
    #[error("report range starts after it ends ({from} > {to})")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
    #[error("report range covers {days} days, at most {max} are allowed")]
    RangeTooWide { days: i64, max: i64 },
}

/// Error raised by the tuition service.
#[derive(Debug, thiserror::Error)]
pub enum TuitionServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("class {0} not found")]
    ClassNotFound(ClassId),
    #[error("student {0} not found")]
    StudentNotFound(StudentId),
    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),
    #[error("class {0} has no tuition fee")]
    NoTuitionFee(ClassId),
}
