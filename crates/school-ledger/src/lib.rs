//! School tuition ledger: fee structures, the payment allocation waterfall, status badges,
//! printable receipts and certificates, a table change feed, and staff onboarding.

pub mod config;
pub mod documents;
pub mod error;
pub mod realtime;
pub mod session;
pub mod staff;
pub mod telemetry;
pub mod tuition;

pub use error::AppError;
pub use session::{Role, SchoolSession, SessionError};
