//! Identity, credentials and access control.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod password;
mod session;
mod provider;
mod authorizer;

pub use principal::{Identity, Role};
pub use password::{hash_password, verify_password};
pub use session::{Claims, TokenError, TokenIssuer, TOKEN_TYPE};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse, RegisterRequest};
pub use authorizer::{authorize, evaluate, require_role, Decision, Gate, Operation};
