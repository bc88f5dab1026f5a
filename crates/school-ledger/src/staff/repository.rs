use super::domain::{NewUserAccount, PayrollEntry, StaffNotification, UserAccount, UserId};
use crate::tuition::domain::SchoolId;

/// Account provider that owns credentials and the `users` table.
pub trait UserDirectory: Send + Sync {
    fn create_user(&self, account: NewUserAccount) -> Result<UserAccount, StaffStoreError>;
    fn delete_user(&self, school: &SchoolId, id: &UserId) -> Result<(), StaffStoreError>;
    fn user(&self, school: &SchoolId, id: &UserId) -> Result<Option<UserAccount>, StaffStoreError>;
}

pub trait PayrollLedger: Send + Sync {
    fn insert_payroll(&self, entry: PayrollEntry) -> Result<PayrollEntry, StaffStoreError>;
    fn payrolls(&self, school: &SchoolId) -> Result<Vec<PayrollEntry>, StaffStoreError>;
}

/// Best-effort delivery of in-app notifications.
pub trait StaffNotifier: Send + Sync {
    fn notify(&self, notification: &StaffNotification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StaffStoreError {
    #[error("an account already uses email {0}")]
    DuplicateEmail(String),
    #[error("record not found")]
    NotFound,
    #[error("staff store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);
