//! Tuition fees, the payment ledger and everything derived from it: the allocation waterfall,
//! payment status badges, statements and the treasury report.

pub mod allocation;
pub mod domain;
pub mod money;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod statement;
pub mod status;
pub mod store;

#[cfg(test)]
mod tests;

pub use allocation::{
    allocate, check_amount, AllocationBreakdown, AllocationInput, BreakdownRow, FeeLine,
    InstallmentAllocation,
};
pub use domain::{
    AcademicYear, ClassId, PaymentId, PaymentMethod, ScheduleEntry, SchoolClass, SchoolId,
    Student, StudentId, TuitionFee, TuitionFeeId, TuitionPayment, Xof, MAX_AMOUNT,
};
pub use money::format_xof;
pub use report::{StudentLedger, TreasuryReport};
pub use repository::{RepositoryError, TuitionRepository};
pub use router::tuition_router;
pub use service::{
    ClassStatus, NewClass, NewPayment, NewStudent, TuitionFeeDraft, TuitionService,
    TuitionServiceError, ValidationError, MAX_REPORT_DAYS,
};
pub use statement::{allocate_payments, StatementSummary, StudentStatement};
pub use status::{classify, PaymentStatus, StatusBucket, StatusPolicy};
pub use store::InMemoryTuitionStore;
