use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::AppError;
use crate::models::user::User;

const INVALID_TOKEN: &str = "invalid or expired token";

/// Immutable signing configuration, read once at startup and threaded
/// through `AppState`.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_minutes: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret =
            std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_minutes = std::env::var("JWT_EXP_MINUTES")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(30))
            .map_err(|_| AppError::configuration("JWT_EXP_MINUTES must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_minutes,
        })
    }

    /// Issues a token from a snapshot of the identity. Role and department
    /// are copied into the claims; later changes to the user do not alter
    /// tokens already in flight.
    pub fn encode(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.exp_minutes);

        let claims = Claims {
            user_id: user.id,
            employee_id: user.employee_id.clone(),
            name: user.name.clone(),
            role: user.role,
            department_id: user.department_id,
            token_type: "access_token".to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign token: {err}")))
    }

    /// Verifies signature and expiry. Every failure mode (bad signature,
    /// malformed structure, missing or past expiry) collapses into the same
    /// outcome so callers cannot probe which check failed.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::token(INVALID_TOKEN))
    }

    pub fn expires_in_seconds(&self) -> i64 {
        self.exp_minutes * 60
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub employee_id: String,
    pub name: String,
    pub role: Role,
    pub department_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Loads the identity referenced by a verified token. The claims are only a
/// snapshot; authorization decisions use the current row.
pub async fn load_current_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.id, u.employee_id, u.name, u.role, u.department_id, d.name AS department_name, u.created_at, u.updated_at \
         FROM users u LEFT JOIN departments d ON d.id = u.department_id WHERE u.id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        let user = load_current_user(&state.pool, claims.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized(INVALID_TOKEN))?;

        Ok(AuthUser { user })
    }
}

/// Optional-auth variant: resolves the identity when a valid token is
/// present, otherwise yields no identity instead of rejecting.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(OptionalAuthUser(None));
        };

        let Ok(claims) = state.jwt.decode(token) else {
            return Ok(OptionalAuthUser(None));
        };

        let user = load_current_user(&state.pool, claims.user_id).await?;
        Ok(OptionalAuthUser(user))
    }
}
