use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

row_id!(SchoolId);
row_id!(ClassId);
row_id!(StudentId);
row_id!(TuitionFeeId);
row_id!(PaymentId);

/// Whole francs CFA. The currency has no minor unit.
pub type Xof = i64;

/// Ceiling for any single amount the ledger accepts (one trillion francs). Sums of a few
/// such amounts stay far from `i64::MAX`.
pub const MAX_AMOUNT: Xof = 1_000_000_000_000;

/// A school year written `2025-2026`. Months from September on belong to the start year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcademicYear {
    start_year: i32,
}

impl AcademicYear {
    /// First month (September) of the school year.
    pub const START_MONTH: u32 = 9;

    pub const fn starting(start_year: i32) -> Self {
        Self { start_year }
    }

    pub const fn start_year(self) -> i32 {
        self.start_year
    }

    /// Calendar year a school-year month falls in.
    pub const fn calendar_year_for(self, month: u32) -> i32 {
        if month >= Self::START_MONTH {
            self.start_year
        } else {
            self.start_year + 1
        }
    }

    /// First day of the given school-year month.
    pub fn month_start(self, month: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.calendar_year_for(month), month, 1)
    }

    /// The school year `date` falls in.
    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= Self::START_MONTH {
            Self::starting(date.year())
        } else {
            Self::starting(date.year() - 1)
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AcademicYearError> {
        let trimmed = raw.trim();
        let head = trimmed.get(..4).ok_or(AcademicYearError::Malformed)?;
        let start_year = head
            .parse::<i32>()
            .map_err(|_| AcademicYearError::Malformed)?;

        match trimmed.get(4..) {
            None | Some("") => Ok(Self::starting(start_year)),
            Some(rest) => {
                let end = rest
                    .trim_start_matches(['-', '/'])
                    .parse::<i32>()
                    .map_err(|_| AcademicYearError::Malformed)?;
                if end != start_year + 1 {
                    return Err(AcademicYearError::NonConsecutive);
                }
                Ok(Self::starting(start_year))
            }
        }
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.start_year + 1)
    }
}

impl Serialize for AcademicYear {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AcademicYear {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AcademicYear::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcademicYearError {
    #[error("academic year must look like YYYY-YYYY")]
    Malformed,
    #[error("academic year must span two consecutive years")]
    NonConsecutive,
}

/// French month name used on receipts and schedules.
pub const fn month_label(month: u32) -> &'static str {
    match month {
        1 => "Janvier",
        2 => "Février",
        3 => "Mars",
        4 => "Avril",
        5 => "Mai",
        6 => "Juin",
        7 => "Juillet",
        8 => "Août",
        9 => "Septembre",
        10 => "Octobre",
        11 => "Novembre",
        12 => "Décembre",
        _ => "?",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: ClassId,
    pub school_id: SchoolId,
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub school_id: SchoolId,
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

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name.to_uppercase(), self.first_name)
    }
}

/// One planned tuition installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub installment_number: u32,
    pub due_month: u32,
    pub amount: Xof,
}

/// Fee structure for a class and school year, with its installment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuitionFee {
    pub id: TuitionFeeId,
    pub school_id: SchoolId,
    pub class_id: ClassId,
    pub academic_year: AcademicYear,
    /// Tuition only.
    pub total_amount: Xof,
    pub registration_fee: Xof,
    pub other_fees: Xof,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

impl TuitionFee {
    pub fn total_due(&self) -> Xof {
        self.total_amount
            .saturating_add(self.registration_fee)
            .saturating_add(self.other_fees)
    }

    pub fn non_scolarity_total(&self) -> Xof {
        self.registration_fee.saturating_add(self.other_fees)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
    Cheque,
}

impl PaymentMethod {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Cash,
            Self::MobileMoney,
            Self::BankTransfer,
            Self::Cheque,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Espèces",
            Self::MobileMoney => "Mobile Money",
            Self::BankTransfer => "Virement bancaire",
            Self::Cheque => "Chèque",
        }
    }
}

/// Ledger row. Payments are appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuitionPayment {
    pub id: PaymentId,
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub amount: Xof,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    /// Recording order, used to break ties between payments on the same day.
    pub sequence: u64,
}

/// Orders payments the way the ledger reads them: by date, then recording order.
pub fn sort_payments(payments: &mut [TuitionPayment]) {
    payments.sort_by(|a, b| {
        a.payment_date
            .cmp(&b.payment_date)
            .then(a.sequence.cmp(&b.sequence))
    });
}
