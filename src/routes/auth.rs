use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::{load_current_user, AuthUser};
use crate::models::user::{DbUser, User};
use crate::utils::verify_password;

const BAD_CREDENTIALS: &str = "invalid employee id or password";

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ADMIN001")]
    pub employee_id: String,
    #[schema(example = "admin123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let employee_id = payload.employee_id.trim().to_uppercase();

    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, employee_id, name, role, department_id, password_hash, created_at, updated_at \
         FROM users WHERE employee_id = ?",
    )
    .bind(&employee_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&payload.password, &db_user.password_hash) {
        tracing::warn!(employee_id = %employee_id, "login failed");
        return Err(AppError::unauthorized(BAD_CREDENTIALS));
    }

    let user = load_current_user(&state.pool, db_user.id)
        .await?
        .ok_or_else(|| AppError::unauthorized(BAD_CREDENTIALS))?;

    let access_token = state.jwt.encode(&user)?;
    tracing::info!(employee_id = %user.employee_id, "login successful");

    Ok(Json(LoginResponse {
        user,
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let claims = state.jwt.decode(&payload.token)?;

    // The subject must still exist; claims are re-issued from the current
    // row, not copied from the old token.
    let user = load_current_user(&state.pool, claims.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid or expired token"))?;

    let access_token = state.jwt.encode(&user)?;
    tracing::info!(employee_id = %user.employee_id, "token refreshed");

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User))
)]
pub async fn me(auth: AuthUser) -> AppResult<Json<User>> {
    Ok(Json(auth.user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged"))
)]
pub async fn logout(auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    // Tokens are stateless and cannot be revoked before expiry; logout is an
    // acknowledgement for the client.
    tracing::info!(employee_id = %auth.user.employee_id, "logout");
    Ok(Json(MessageResponse {
        message: "logged out".to_string(),
    }))
}
