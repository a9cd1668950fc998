use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::authorizer::{authorize, Operation};
use super::password::{hash_password, verify_password};
use super::principal::{Identity, Role};
use super::session::{TokenIssuer, TOKEN_TYPE};
use crate::error::{AppError, AppResult};
use crate::storage::SharedStore;

/// Verified when the handle is unknown so both login failure paths cost the same.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| hash_password("gradebook-dummy-secret").unwrap_or_default());

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "RegisterRequest::default_role")]
    pub role: String,
}

impl RegisterRequest {
    fn default_role() -> String { Role::Admin.as_str().to_string() }
}

pub trait AuthProvider: Send + Sync {
    /// Exchange credentials for a bearer token.
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
    /// Verify a bearer token and load the identity it names.
    fn resolve(&self, token: &str) -> AppResult<Identity>;
}

pub struct LocalAuthProvider {
    store: SharedStore,
    tokens: TokenIssuer,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, tokens: TokenIssuer) -> Self { Self { store, tokens } }

    pub fn tokens(&self) -> &TokenIssuer { &self.tokens }

    /// Register a teacher account.
    ///
    /// Until the first admin exists anyone may register; afterwards `caller`
    /// must be an authenticated admin.
    pub fn register(&self, caller: Option<Identity>, req: &RegisterRequest) -> AppResult<Identity> {
        let username = req.username.trim();
        let email = req.email.trim();
        if username.is_empty() || email.is_empty() || req.password.is_empty() {
            return Err(AppError::user("invalid_registration", "Username, email and password are required"));
        }
        let role: Role = req.role.parse()?;
        if role != Role::Admin {
            return Err(AppError::user(
                "student_registration",
                "Only admin (teacher) accounts can be registered manually. Student accounts are auto-created on data upload.",
            ));
        }
        let secret_hash = hash_password(&req.password)?;
        let created = self.store.transaction(|t| {
            if t.count_role(Role::Admin) > 0 {
                let caller = caller.ok_or_else(|| AppError::auth("missing_token", "Not authenticated"))?;
                authorize(caller, Operation::RegisterAdmin)?;
            }
            t.insert_identity(username, Some(email), secret_hash, Role::Admin)
        })?;
        info!(target: "gradebook::auth", user = %created.handle, "admin registered");
        Ok(created)
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let stored = self.store.read(|t| t.identity_by_handle(&req.username).map(|i| (i.handle.clone(), i.secret_hash.clone())));
        let verified = match &stored {
            Some((_, hash)) => verify_password(&req.password, hash),
            None => {
                let _ = verify_password(&req.password, &DUMMY_HASH);
                false
            }
        };
        let Some((handle, _)) = stored.filter(|_| verified) else {
            warn!(target: "gradebook::auth", "failed login attempt");
            return Err(AppError::auth("invalid_credentials", INVALID_CREDENTIALS));
        };
        let access_token = self.tokens.issue(&handle)?;
        info!(target: "gradebook::auth", user = %handle, "login");
        Ok(LoginResponse { access_token, token_type: TOKEN_TYPE })
    }

    fn resolve(&self, token: &str) -> AppResult<Identity> {
        let handle = self.tokens.verify(token)?;
        // A valid token for an identity removed by re-ingestion must not authenticate.
        self.store
            .read(|t| t.identity_by_handle(&handle).cloned())
            .ok_or_else(|| AppError::auth("invalid_token", "Invalid or expired token"))
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
