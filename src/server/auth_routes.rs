use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::State;
use axum::{Form, Json};
use serde_json::{json, Value};

use super::extract::{CurrentIdentity, MaybeIdentity};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::{authorize, AuthProvider, LoginRequest, LoginResponse, Operation, RegisterRequest};

/// `POST /auth/register`: JSON body, open until the first admin exists.
pub(super) async fn register(
    State(state): State<AppState>,
    MaybeIdentity(caller): MaybeIdentity,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = body.map_err(|e| AppError::user("invalid_body", e.body_text()))?;
    let created = state.auth.register(caller, &req)?;
    Ok(Json(json!({ "message": format!("Admin '{}' registered successfully", created.handle) })))
}

/// `POST /auth/login`: OAuth2-style form with `username` and `password`.
pub(super) async fn login(
    State(state): State<AppState>,
    body: Result<Form<LoginRequest>, FormRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Form(req) = body.map_err(|e| AppError::user("invalid_body", e.body_text()))?;
    Ok(Json(state.auth.login(&req)?))
}

/// `GET /auth/me`: the caller's own profile and mark record. Students only.
pub(super) async fn me(State(state): State<AppState>, CurrentIdentity(who): CurrentIdentity) -> AppResult<Json<Value>> {
    let who = authorize(who, Operation::SelfProfile)?;
    let record = state.store.read(|t| t.mark_for_identity(who.id).cloned());
    let mut body = json!({
        "id": who.id,
        "username": who.handle,
        "role": who.role,
    });
    if let Some(m) = record {
        body["marks_details"] = json!({
            "student_id": m.student_id,
            "student_name": m.student_name,
            "time_study": m.time_study,
            "marks": m.marks,
        });
    }
    Ok(Json(body))
}
