use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::AppState;
use crate::error::AppError;
use crate::identity::{AuthProvider, Identity};

/// Authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Rejects with `Auth` (401 + bearer challenge) when the header is missing,
/// malformed, expired, or names an identity that no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

/// Like [`CurrentIdentity`], but an absent header yields `None`. A header
/// that is present but invalid is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else { return Ok(None) };
    let raw = value
        .to_str()
        .map_err(|_| AppError::auth("invalid_token", "Invalid Authorization header"))?;
    let (scheme, token) = raw.trim().split_once(' ').unwrap_or((raw, ""));
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::auth("invalid_token", "Authorization header must be in format: Bearer <token>"));
    }
    Ok(Some(token.trim()))
}

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or_else(|| AppError::auth("missing_token", "Not authenticated"))?;
        Ok(CurrentIdentity(state.auth.resolve(token)?))
    }
}

impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeIdentity(Some(state.auth.resolve(token)?))),
            None => Ok(MaybeIdentity(None)),
        }
    }
}
