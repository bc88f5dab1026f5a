//! Staff onboarding: account, payroll row and welcome notification written as one unit.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

pub use domain::{
    NewUserAccount, OnboardingOutcome, OnboardingRequest, OnboardingValidationError, PayrollEntry,
    PayrollId, StaffNotification, StaffRole, UserAccount, UserId,
};
pub use repository::{NotifyError, PayrollLedger, StaffNotifier, StaffStoreError, UserDirectory};
pub use router::staff_router;
pub use service::{OnboardingError, StaffOnboardingService};
pub use store::InMemoryStaffStore;
