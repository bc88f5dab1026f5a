use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::session::Role;
use crate::tuition::domain::{SchoolId, Xof};

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayrollId(pub String);

/// Roles a staff member can be onboarded into. Parents get accounts elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Accountant,
    Secretary,
    Hr,
    Teacher,
}

impl StaffRole {
    pub const fn session_role(self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::Accountant => Role::Accountant,
            Self::Secretary => Role::Secretary,
            Self::Hr => Role::Hr,
            Self::Teacher => Role::Teacher,
        }
    }
}

/// Signup payload handed to the user directory. Holds the password, so it is never logged.
#[derive(Clone)]
pub struct NewUserAccount {
    pub school_id: SchoolId,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: StaffRole,
}

impl std::fmt::Debug for NewUserAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUserAccount")
            .field("school_id", &self.school_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub school_id: SchoolId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: StaffRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollEntry {
    pub id: PayrollId,
    pub school_id: SchoolId,
    pub user_id: UserId,
    pub position: String,
    pub base_salary: Xof,
    pub effective_from: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffNotification {
    pub school_id: SchoolId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
}

/// Body of `POST /api/v1/staff`.
#[derive(Clone, Deserialize)]
pub struct OnboardingRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: StaffRole,
    /// Defaults to the role name.
    #[serde(default)]
    pub position: Option<String>,
    pub base_salary: Xof,
    pub start_date: NaiveDate,
}

impl std::fmt::Debug for OnboardingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingRequest")
            .field("email", &self.email)
            .field("role", &self.role)
            .field("start_date", &self.start_date)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardingValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("email address is malformed")]
    InvalidEmail,
    #[error("password must be at least 6 characters")]
    PasswordTooShort,
    #[error("password confirmation does not match")]
    PasswordMismatch,
    #[error("base salary cannot be negative")]
    NegativeSalary,
}

impl OnboardingRequest {
    pub fn validate(&self) -> Result<(), OnboardingValidationError> {
        for (field, value) in [
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(OnboardingValidationError::Required(field));
            }
        }

        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(OnboardingValidationError::InvalidEmail),
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(OnboardingValidationError::PasswordTooShort);
        }
        if self.password != self.password_confirmation {
            return Err(OnboardingValidationError::PasswordMismatch);
        }
        if self.base_salary < 0 {
            return Err(OnboardingValidationError::NegativeSalary);
        }
        Ok(())
    }

    pub fn position_or_default(&self) -> String {
        self.position
            .as_deref()
            .map(str::trim)
            .filter(|position| !position.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.role.session_role().label().to_string())
    }
}

/// What a successful onboarding produced. `warnings` lists best-effort steps that failed.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingOutcome {
    pub user: UserAccount,
    pub payroll: PayrollEntry,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OnboardingRequest {
        OnboardingRequest {
            email: "a.traore@ecole.ci".into(),
            password: "secret1".into(),
            password_confirmation: "secret1".into(),
            first_name: "Awa".into(),
            last_name: "Traoré".into(),
            phone: None,
            role: StaffRole::Teacher,
            position: None,
            base_salary: 180_000,
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid"),
        }
    }

    #[test]
    fn accepts_complete_request() {
        assert_eq!(request().validate(), Ok(()));
    }

    #[test]
    fn password_rules_are_enforced() {
        let mut short = request();
        short.password = "12345".into();
        short.password_confirmation = "12345".into();
        assert_eq!(
            short.validate(),
            Err(OnboardingValidationError::PasswordTooShort)
        );

        let mut mismatch = request();
        mismatch.password_confirmation = "secret2".into();
        assert_eq!(
            mismatch.validate(),
            Err(OnboardingValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn email_needs_a_domain() {
        let mut bad = request();
        bad.email = "awa@localhost".into();
        assert_eq!(bad.validate(), Err(OnboardingValidationError::InvalidEmail));
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", request());
        assert!(!rendered.contains("secret1"));
    }
}
