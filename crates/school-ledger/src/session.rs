//! Request-scoped caller context. Handlers build one per request and pass it down explicitly.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::tuition::domain::SchoolId;

pub const SCHOOL_HEADER: &str = "x-school-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Accountant,
    Secretary,
    Hr,
    Teacher,
    Parent,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "accountant" | "comptable" => Some(Self::Accountant),
            "secretary" | "secretaire" => Some(Self::Secretary),
            "hr" | "rh" => Some(Self::Hr),
            "teacher" | "enseignant" => Some(Self::Teacher),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Administrateur",
            Self::Accountant => "Comptable",
            Self::Secretary => "Secrétaire",
            Self::Hr => "Ressources humaines",
            Self::Teacher => "Enseignant",
            Self::Parent => "Parent",
        }
    }
}

/// Roles allowed to touch fee structures and the payment ledger.
pub const FINANCE_ROLES: &[Role] = &[Role::Admin, Role::Accountant];
/// Roles allowed to create classes and enroll students.
pub const REGISTRAR_ROLES: &[Role] = &[Role::Admin, Role::Secretary];
/// Roles allowed to onboard staff.
pub const STAFF_ROLES: &[Role] = &[Role::Admin, Role::Hr];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolSession {
    pub school_id: SchoolId,
    pub user_id: Option<String>,
    pub role: Role,
}

impl SchoolSession {
    pub fn new(school_id: impl Into<String>, role: Role) -> Self {
        Self {
            school_id: SchoolId(school_id.into()),
            user_id: None,
            role,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, SessionError> {
        let school_id = header_value(headers, SCHOOL_HEADER).ok_or(SessionError::MissingSchool)?;
        let raw_role = header_value(headers, ROLE_HEADER).ok_or(SessionError::MissingRole)?;
        let role = Role::parse(&raw_role).ok_or(SessionError::UnknownRole(raw_role))?;

        Ok(Self {
            school_id: SchoolId(school_id),
            user_id: header_value(headers, USER_HEADER),
            role,
        })
    }

    pub fn require(&self, allowed: &[Role], action: &'static str) -> Result<(), SessionError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(SessionError::Forbidden {
                role: self.role,
                action,
            })
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("missing x-school-id header")]
    MissingSchool,
    #[error("missing x-user-role header")]
    MissingRole,
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("role {role:?} may not {action}")]
    Forbidden { role: Role, action: &'static str },
}
