//! Authentication module.
//!
//! The chat core only needs to turn a bearer credential into an identity;
//! login, registration and token issuance live in the surrounding platform.

mod jwt;

pub use jwt::{JwtAuthenticator, JwtClaims};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Platform role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Student.
    Student,
    /// Teacher.
    Teacher,
    /// Alumnus / alumna.
    Alumni,
    /// Programme coordinator.
    Coordinator,
    /// Administrator.
    Admin,
}

impl UserRole {
    /// String representation used in tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Alumni => "alumni",
            UserRole::Coordinator => "coordinator",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            "alumni" => Ok(UserRole::Alumni),
            "coordinator" => Ok(UserRole::Coordinator),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// User ID.
    pub user_id: i64,
    /// Platform role.
    pub role: UserRole,
}

impl Identity {
    /// Create a new identity.
    pub fn new(user_id: i64, role: UserRole) -> Self {
        Self { user_id, role }
    }
}

/// Turns a bearer credential into an identity.
///
/// Implementations reject bad or expired credentials with
/// [`ChatError::Unauthorized`](crate::ChatError::Unauthorized).
pub trait Authenticator: Send + Sync {
    /// Validate `credential` and return who it belongs to.
    fn authenticate(&self, credential: &str) -> Result<Identity>;
}
