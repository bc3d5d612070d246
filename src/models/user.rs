use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;

/// 2-4 uppercase letters followed by 3-6 digits, e.g. EMP001.
static EMPLOYEE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2,4}\d{3,6}$").expect("employee id pattern must compile"));

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\s.\-']+$").expect("name pattern must compile"));

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    #[schema(example = "EMP001")]
    pub employee_id: String,
    #[schema(example = "Amara Okafor")]
    pub name: String,
    pub role: Role,
    pub department_id: Uuid,
    pub department_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full row including the credential hash. Never serialized; routes convert
/// to `User` before responding.
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub employee_id: String,
    pub name: String,
    pub role: Role,
    pub department_id: Uuid,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    #[schema(example = "EMP001")]
    pub employee_id: String,
    #[schema(example = "Amara Okafor")]
    pub name: String,
    #[schema(example = "ward1pass")]
    pub password: String,
    pub role: Role,
    pub department_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordUpdateRequest {
    pub current_password: String,
    #[schema(example = "ward1pass2")]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Validates and upper-normalizes an employee identifier.
pub fn validate_employee_id(value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if !EMPLOYEE_ID_RE.is_match(value) {
        return Err(AppError::validation(
            "employee id must be 2-4 letters followed by 3-6 digits (e.g. EMP001)",
        ));
    }
    Ok(value.to_uppercase())
}

pub fn validate_name(value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.len() < 2 || value.len() > 255 {
        return Err(AppError::validation("name must be 2-255 characters"));
    }
    if !NAME_RE.is_match(value) {
        return Err(AppError::validation(
            "name can only contain letters, spaces, dots, hyphens, and apostrophes",
        ));
    }
    Ok(value.to_string())
}

pub fn validate_password(value: &str) -> Result<(), AppError> {
    if value.len() < 6 {
        return Err(AppError::validation("password must be at least 6 characters"));
    }
    if !value.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation("password must contain at least one letter"));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("password must contain at least one digit"));
    }
    Ok(())
}
