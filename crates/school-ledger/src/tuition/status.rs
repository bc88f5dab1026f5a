use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::allocation::AllocationBreakdown;

/// Window, in days, inside which the next installment counts as due soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    pub due_soon_days: i64,
}

impl StatusPolicy {
    pub const DEFAULT_DUE_SOON_DAYS: i64 = 10;
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            due_soon_days: Self::DEFAULT_DUE_SOON_DAYS,
        }
    }
}

/// Dashboard badge for a student's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentStatus {
    NoFees,
    Settled,
    Partial,
    Unpaid,
    Overdue {
        installment_number: u32,
        days_late: i64,
    },
    DueSoon {
        installment_number: u32,
        days_remaining: i64,
    },
    Upcoming {
        installment_number: u32,
        days_remaining: i64,
    },
}

/// Coarse grouping used by reports and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    NoFees,
    Settled,
    Partial,
    Unpaid,
    Overdue,
    DueSoon,
    Upcoming,
}

impl StatusBucket {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Overdue,
            Self::DueSoon,
            Self::Upcoming,
            Self::Partial,
            Self::Unpaid,
            Self::Settled,
            Self::NoFees,
        ]
    }
}

fn days(count: i64) -> String {
    if count.abs() == 1 {
        format!("{count} jour")
    } else {
        format!("{count} jours")
    }
}

impl PaymentStatus {
    pub fn label(self) -> String {
        match self {
            Self::NoFees => "Aucun frais".to_string(),
            Self::Settled => "Soldé".to_string(),
            Self::Partial => "Partiel".to_string(),
            Self::Unpaid => "Impayé".to_string(),
            Self::Overdue { days_late, .. } => format!("En retard de {}", days(days_late)),
            Self::DueSoon { days_remaining, .. } => {
                format!("Échéance dans {}", days(days_remaining))
            }
            Self::Upcoming { days_remaining, .. } => {
                format!("Prochaine échéance dans {}", days(days_remaining))
            }
        }
    }

    pub const fn bucket(self) -> StatusBucket {
        match self {
            Self::NoFees => StatusBucket::NoFees,
            Self::Settled => StatusBucket::Settled,
            Self::Partial => StatusBucket::Partial,
            Self::Unpaid => StatusBucket::Unpaid,
            Self::Overdue { .. } => StatusBucket::Overdue,
            Self::DueSoon { .. } => StatusBucket::DueSoon,
            Self::Upcoming { .. } => StatusBucket::Upcoming,
        }
    }
}

/// Classify an account from its allocation. `None` means the class has no fee row.
pub fn classify(
    breakdown: Option<&AllocationBreakdown>,
    today: NaiveDate,
    policy: StatusPolicy,
) -> PaymentStatus {
    let Some(breakdown) = breakdown else {
        return PaymentStatus::NoFees;
    };
    if breakdown.total_due() == 0 {
        return PaymentStatus::NoFees;
    }
    if breakdown.balance() <= 0 {
        return PaymentStatus::Settled;
    }

    let fallback = if breakdown.total_paid() > 0 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    };

    let Some(next) = breakdown.next_due() else {
        return fallback;
    };
    let Some(due_date) = next.due_date else {
        return fallback;
    };

    let days_until_due = due_date.signed_duration_since(today).num_days();
    if days_until_due < 0 {
        PaymentStatus::Overdue {
            installment_number: next.installment_number,
            days_late: -days_until_due,
        }
    } else if days_until_due <= policy.due_soon_days {
        PaymentStatus::DueSoon {
            installment_number: next.installment_number,
            days_remaining: days_until_due,
        }
    } else {
        PaymentStatus::Upcoming {
            installment_number: next.installment_number,
            days_remaining: days_until_due,
        }
    }
}
