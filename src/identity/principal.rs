use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Teacher accounts; registered manually.
    Admin,
    /// Derived from the marks dataset on every ingestion.
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }

    /// Label used in access-denied messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin (Teacher)",
            Role::Student => "Student",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            other => Err(AppError::user("invalid_role", format!("Unknown role '{}'", other))),
        }
    }
}

/// A login principal as held by the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: i64,
    pub handle: String,
    pub contact: Option<String>,
    /// `salt$digest`, see [`crate::identity::hash_password`].
    pub secret_hash: String,
    pub role: Role,
}

impl Identity {
    pub fn is(&self, role: Role) -> bool { self.role == role }
}
