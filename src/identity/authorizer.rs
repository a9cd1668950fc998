//! Role-based access policy.
//!
//! Every operation the HTTP layer exposes names its gate here, so the whole
//! permission matrix is visible in one table. The matrix is intentionally
//! asymmetric: admins may read statistics and listings but not the
//! student-only self profile.

use tracing::debug;

use super::principal::{Identity, Role};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Any identity that survived token verification and store lookup.
    Authenticated,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterAdmin,
    IngestDataset,
    UpdateRecord,
    ListRecords,
    ViewStatistics,
    ViewCharts,
    SelfProfile,
}

impl Operation {
    pub fn gate(&self) -> Gate {
        match self {
            Operation::RegisterAdmin | Operation::IngestDataset | Operation::UpdateRecord => Gate::Role(Role::Admin),
            Operation::ListRecords | Operation::ViewStatistics | Operation::ViewCharts => Gate::Authenticated,
            Operation::SelfProfile => Gate::Role(Role::Student),
        }
    }
}

/// `Role × RequiredRole -> Allow | Deny(reason)`.
pub fn evaluate(actual: Role, required: Role) -> Decision {
    if actual == required {
        Decision::Allow
    } else {
        Decision::Deny(format!("Access denied. {} role required.", required.display_name()))
    }
}

/// Pass the identity through unchanged when its role matches, otherwise `Forbidden`.
pub fn require_role(identity: Identity, required: Role) -> AppResult<Identity> {
    match evaluate(identity.role, required) {
        Decision::Allow => Ok(identity),
        Decision::Deny(reason) => {
            debug!(target: "gradebook::auth", user = %identity.handle, role = %identity.role, required = %required, "access denied");
            Err(AppError::forbidden("forbidden", reason))
        }
    }
}

pub fn authorize(identity: Identity, op: Operation) -> AppResult<Identity> {
    match op.gate() {
        Gate::Authenticated => Ok(identity),
        Gate::Role(role) => require_role(identity, role),
    }
}
