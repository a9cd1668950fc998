use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;

/// Returned next to every access token, as OAuth2 password flows expect.
pub const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or its signature is invalid: {0}")]
    Invalid(String),
    #[error("token carries no subject")]
    MissingSubject,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::internal("token_signing", msg),
            other => {
                debug!(target: "gradebook::auth", "rejected bearer token: {}", other);
                AppError::auth("invalid_token", "Invalid or expired token")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens whose subject is an identity handle.
///
/// The verifier has no store access: callers must still resolve the handle and
/// treat a missing identity as unauthenticated.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub const ALGORITHM: Algorithm = Algorithm::HS256;

    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Self::ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.jwt_secret(), Duration::minutes(cfg.token_ttl_minutes))
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, handle: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(handle, self.ttl)
    }

    pub fn issue_with_ttl(&self, handle: &str, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims { sub: Some(handle.to_string()), iat: now.timestamp(), exp: (now + ttl).timestamp() };
        encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, returning the subject handle.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;
        match data.claims.sub {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => Err(TokenError::MissingSubject),
        }
    }
}
