use chrono::NaiveDate;
use serde::Serialize;

use super::allocation::{allocate, AllocationBreakdown, AllocationInput, InstallmentAllocation};
use super::domain::{sort_payments, Student, TuitionFee, TuitionPayment, Xof};
use super::status::{classify, PaymentStatus, StatusPolicy};

/// Allocation of `payments` against `fee`, or `None` when the class has no fee.
///
/// `payments` must already be in ledger order; the first entry feeds the underpayment split.
pub fn allocate_payments(
    fee: Option<&TuitionFee>,
    payments: &[TuitionPayment],
) -> Option<AllocationBreakdown> {
    let fee = fee?;
    let total_paid: Xof = payments.iter().map(|payment| payment.amount).sum();
    let first_payment = payments.first().map(|payment| payment.amount);
    Some(allocate(&AllocationInput::for_fee(
        fee,
        total_paid,
        first_payment,
    )))
}

/// Parent-facing account view: fee, ledger, waterfall and badge.
#[derive(Debug, Clone, Serialize)]
pub struct StudentStatement {
    pub student: Student,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<TuitionFee>,
    pub payments: Vec<TuitionPayment>,
    pub total_due: Xof,
    pub total_paid: Xof,
    pub balance: Xof,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<AllocationBreakdown>,
    pub status: PaymentStatus,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due: Option<InstallmentAllocation>,
    pub as_of: NaiveDate,
}

impl StudentStatement {
    pub fn build(
        student: Student,
        class_name: Option<String>,
        fee: Option<TuitionFee>,
        mut payments: Vec<TuitionPayment>,
        today: NaiveDate,
        policy: StatusPolicy,
    ) -> Self {
        sort_payments(&mut payments);
        let breakdown = allocate_payments(fee.as_ref(), &payments);
        let total_paid: Xof = payments.iter().map(|payment| payment.amount).sum();
        let total_due = fee.as_ref().map(TuitionFee::total_due).unwrap_or(0);
        let status = classify(breakdown.as_ref(), today, policy);
        let next_due = breakdown
            .as_ref()
            .and_then(|breakdown| breakdown.next_due().cloned());

        Self {
            student,
            class_name,
            fee,
            payments,
            total_due,
            total_paid,
            balance: total_due - total_paid,
            breakdown,
            status,
            status_label: status.label(),
            next_due,
            as_of: today,
        }
    }

    pub fn summary(&self) -> StatementSummary {
        StatementSummary {
            student_id: self.student.id.0.clone(),
            matricule: self.student.matricule.clone(),
            full_name: self.student.full_name(),
            total_due: self.total_due,
            total_paid: self.total_paid,
            balance: self.balance,
            status: self.status,
            status_label: self.status_label.clone(),
            next_due_date: self.next_due.as_ref().and_then(|entry| entry.due_date),
        }
    }
}

/// One line of a class payment-status listing.
#[derive(Debug, Clone, Serialize)]
pub struct StatementSummary {
    pub student_id: String,
    pub matricule: String,
    pub full_name: String,
    pub total_due: Xof,
    pub total_paid: Xof,
    pub balance: Xof,
    pub status: PaymentStatus,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}
