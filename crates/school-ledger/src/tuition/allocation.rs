//! Presentation-layer waterfall that spreads a student's total payments over
//! registration, annex fees and the tuition installments. No money moves here.

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{month_label, AcademicYear, ScheduleEntry, TuitionFee, Xof, MAX_AMOUNT};
use super::service::ValidationError;

pub const REGISTRATION_LABEL: &str = "Frais d'inscription";
pub const OTHER_FEES_LABEL: &str = "Frais annexe";
pub const TUITION_LABEL: &str = "Frais de scolarité";
pub const TOTAL_LABEL: &str = "TOTAL";

/// Everything the waterfall reads. Borrowed so callers keep ownership of their rows.
#[derive(Debug, Clone, Copy)]
pub struct AllocationInput<'a> {
    pub total_paid: Xof,
    pub registration_fee: Xof,
    pub other_fees: Xof,
    pub tuition_amount: Xof,
    pub schedule: &'a [ScheduleEntry],
    /// Amount of the earliest payment, consulted only when non-tuition fees are not covered.
    pub first_payment_amount: Option<Xof>,
    pub academic_year: AcademicYear,
}

impl<'a> AllocationInput<'a> {
    pub fn for_fee(
        fee: &'a TuitionFee,
        total_paid: Xof,
        first_payment_amount: Option<Xof>,
    ) -> Self {
        Self {
            total_paid,
            registration_fee: fee.registration_fee,
            other_fees: fee.other_fees,
            tuition_amount: fee.total_amount,
            schedule: &fee.schedule,
            first_payment_amount,
            academic_year: fee.academic_year,
        }
    }

    /// Reject amounts the waterfall cannot print meaningfully: negatives, amounts above
    /// [`MAX_AMOUNT`] and a first payment outside `0..=total_paid`.
    pub fn check(&self) -> Result<(), ValidationError> {
        for (field, amount) in [
            ("registration_fee", self.registration_fee),
            ("other_fees", self.other_fees),
            ("tuition_amount", self.tuition_amount),
            ("total_paid", self.total_paid),
        ] {
            check_amount(field, amount)?;
        }
        for entry in self.schedule {
            check_amount("schedule.amount", entry.amount)?;
        }
        match self.first_payment_amount {
            Some(first) if !(0..=self.total_paid).contains(&first) => {
                Err(ValidationError::FirstPaymentOutOfRange {
                    first,
                    total_paid: self.total_paid,
                })
            }
            _ => Ok(()),
        }
    }
}

/// `amount` must lie in `0..=MAX_AMOUNT`.
pub fn check_amount(field: &'static str, amount: Xof) -> Result<(), ValidationError> {
    if amount < 0 {
        Err(ValidationError::NegativeAmount(field))
    } else if amount > MAX_AMOUNT {
        Err(ValidationError::AmountTooLarge(field))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeLine {
    pub due: Xof,
    pub paid: Xof,
    pub balance: Xof,
}

impl FeeLine {
    fn new(due: Xof, paid: Xof) -> Self {
        Self {
            due,
            paid,
            balance: due.saturating_sub(paid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentAllocation {
    pub installment_number: u32,
    pub due_month: u32,
    pub due_date: Option<NaiveDate>,
    pub due: Xof,
    pub paid: Xof,
    pub balance: Xof,
}

impl InstallmentAllocation {
    /// `Versement 2 (Octobre)`
    pub fn label(&self) -> String {
        format!(
            "Versement {} ({})",
            self.installment_number,
            month_label(self.due_month)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationBreakdown {
    pub registration: FeeLine,
    pub other_fees: FeeLine,
    pub tuition: FeeLine,
    pub installments: Vec<InstallmentAllocation>,
    pub total: FeeLine,
}

/// Label plus amounts, in the fixed order documents print them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownRow {
    pub label: String,
    pub due: Xof,
    pub paid: Xof,
    pub balance: Xof,
    pub is_total: bool,
}

impl AllocationBreakdown {
    pub fn total_due(&self) -> Xof {
        self.total.due
    }

    pub fn total_paid(&self) -> Xof {
        self.total.paid
    }

    pub fn balance(&self) -> Xof {
        self.total.balance
    }

    /// First installment still carrying a positive balance.
    pub fn next_due(&self) -> Option<&InstallmentAllocation> {
        self.installments.iter().find(|entry| entry.balance > 0)
    }

    pub fn rows(&self) -> Vec<BreakdownRow> {
        let line = |label: &str, fee: &FeeLine, is_total: bool| BreakdownRow {
            label: label.to_string(),
            due: fee.due,
            paid: fee.paid,
            balance: fee.balance,
            is_total,
        };

        let mut rows = Vec::with_capacity(self.installments.len() + 4);
        rows.push(line(REGISTRATION_LABEL, &self.registration, false));
        rows.push(line(OTHER_FEES_LABEL, &self.other_fees, false));
        rows.push(line(TUITION_LABEL, &self.tuition, false));
        rows.extend(self.installments.iter().map(|entry| BreakdownRow {
            label: entry.label(),
            due: entry.due,
            paid: entry.paid,
            balance: entry.balance,
            is_total: false,
        }));
        rows.push(line(TOTAL_LABEL, &self.total, true));
        rows
    }
}

/// Run the registration → annex → tuition waterfall.
///
/// When the total does not cover registration plus annex fees, only the first payment is split
/// between them and the rest of the total is credited to tuition unclamped. Arithmetic saturates,
/// so unchecked input yields clipped figures rather than a panic; see [`AllocationInput::check`].
pub fn allocate(input: &AllocationInput<'_>) -> AllocationBreakdown {
    let AllocationInput {
        total_paid,
        registration_fee,
        other_fees,
        tuition_amount,
        schedule,
        first_payment_amount,
        academic_year,
    } = *input;

    let non_scolarity_total = registration_fee.saturating_add(other_fees);

    let (registration_paid, other_paid) = if total_paid >= non_scolarity_total {
        (registration_fee, other_fees)
    } else {
        let first = first_payment_amount.unwrap_or(0);
        let registration_paid = first.min(registration_fee);
        let other_paid = first.saturating_sub(registration_paid).min(other_fees);
        (registration_paid, other_paid)
    };
    let tuition_paid = total_paid.saturating_sub(registration_paid.saturating_add(other_paid));

    let mut ordered: Vec<&ScheduleEntry> = schedule.iter().collect();
    ordered.sort_by_key(|entry| entry.installment_number);

    let mut remaining = tuition_paid;
    let installments = ordered
        .into_iter()
        .map(|entry| {
            let paid = remaining.min(entry.amount).max(0);
            remaining -= paid;
            InstallmentAllocation {
                installment_number: entry.installment_number,
                due_month: entry.due_month,
                due_date: academic_year.month_start(entry.due_month),
                due: entry.amount,
                paid,
                balance: entry.amount.saturating_sub(paid),
            }
        })
        .collect();

    AllocationBreakdown {
        registration: FeeLine::new(registration_fee, registration_paid),
        other_fees: FeeLine::new(other_fees, other_paid),
        tuition: FeeLine::new(tuition_amount, tuition_paid),
        installments,
        total: FeeLine::new(non_scolarity_total.saturating_add(tuition_amount), total_paid),
    }
}
