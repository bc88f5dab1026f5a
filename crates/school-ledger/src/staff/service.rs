use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::domain::{
    NewUserAccount, OnboardingOutcome, OnboardingRequest, OnboardingValidationError, PayrollEntry,
    PayrollId, StaffNotification, UserId,
};
use super::repository::{PayrollLedger, StaffNotifier, StaffStoreError, UserDirectory};
use crate::session::{SchoolSession, SessionError, STAFF_ROLES};

static PAYROLL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Creates a staff account and its payroll row as one unit.
///
/// The two writes land in different stores, so a payroll failure is undone by deleting the
/// account. The welcome notification is best effort.
pub struct StaffOnboardingService<D, P, N> {
    directory: Arc<D>,
    payroll: Arc<P>,
    notifier: Arc<N>,
}

impl<D, P, N> StaffOnboardingService<D, P, N>
where
    D: UserDirectory + 'static,
    P: PayrollLedger + 'static,
    N: StaffNotifier + 'static,
{
    pub fn new(directory: Arc<D>, payroll: Arc<P>, notifier: Arc<N>) -> Self {
        Self {
            directory,
            payroll,
            notifier,
        }
    }

    pub fn onboard(
        &self,
        session: &SchoolSession,
        request: OnboardingRequest,
    ) -> Result<OnboardingOutcome, OnboardingError> {
        session.require(STAFF_ROLES, "onboard staff")?;
        request.validate()?;

        let position = request.position_or_default();
        let user = self.directory.create_user(NewUserAccount {
            school_id: session.school_id.clone(),
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            role: request.role,
        })?;
        info!(
            school = %user.school_id,
            user = %user.id,
            role = ?user.role,
            "staff account created"
        );

        let entry = PayrollEntry {
            id: PayrollId(format!(
                "prl-{:06}",
                PAYROLL_SEQUENCE.fetch_add(1, Ordering::Relaxed)
            )),
            school_id: session.school_id.clone(),
            user_id: user.id.clone(),
            position,
            base_salary: request.base_salary,
            effective_from: request.start_date,
        };

        let payroll = match self.payroll.insert_payroll(entry) {
            Ok(payroll) => payroll,
            Err(source) => return Err(self.compensate(session, &user.id, source)),
        };
        info!(user = %user.id, payroll = %payroll.id.0, "payroll row created");

        let mut warnings = Vec::new();
        let notification = StaffNotification {
            school_id: session.school_id.clone(),
            user_id: user.id.clone(),
            title: "Bienvenue".to_string(),
            message: format!(
                "Votre compte {} a été créé. Prise de fonction le {}.",
                user.role.session_role().label(),
                payroll.effective_from.format("%d/%m/%Y")
            ),
        };
        if let Err(err) = self.notifier.notify(&notification) {
            warn!(user = %user.id, error = %err, "welcome notification not delivered");
            warnings.push(err.to_string());
        }

        Ok(OnboardingOutcome {
            user,
            payroll,
            warnings,
        })
    }

    fn compensate(
        &self,
        session: &SchoolSession,
        user_id: &UserId,
        source: StaffStoreError,
    ) -> OnboardingError {
        warn!(user = %user_id, error = %source, "payroll insert failed; removing account");
        match self.directory.delete_user(&session.school_id, user_id) {
            Ok(()) => OnboardingError::Payroll {
                source,
                compensated: true,
            },
            Err(rollback) => {
                error!(
                    user = %user_id,
                    error = %rollback,
                    "account left without payroll row"
                );
                OnboardingError::CompensationFailed {
                    user_id: user_id.clone(),
                    payroll: source,
                    rollback,
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Validation(#[from] OnboardingValidationError),
    #[error("account creation failed: {0}")]
    Directory(#[from] StaffStoreError),
    #[error("payroll creation failed: {source}")]
    Payroll {
        source: StaffStoreError,
        compensated: bool,
    },
    #[error("payroll creation failed ({payroll}) and account {user_id} could not be removed ({rollback})")]
    CompensationFailed {
        user_id: UserId,
        payroll: StaffStoreError,
        rollback: StaffStoreError,
    },
}
