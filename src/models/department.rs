use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum DepartmentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Department {
    pub id: Uuid,
    #[schema(example = "Ward 1")]
    pub name: String,
    pub status: DepartmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentCreateRequest {
    #[schema(example = "Ward 1")]
    pub name: String,
    pub status: Option<DepartmentStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentUpdateRequest {
    pub name: Option<String>,
    pub status: Option<DepartmentStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentListResponse {
    pub departments: Vec<Department>,
    pub total: i64,
}

/// Slim entry for the pre-login dropdown; `status` is only populated for
/// authenticated callers.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentOption {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DepartmentStatus>,
}

pub fn validate_department_name(value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() || value.len() > 100 {
        return Err(AppError::validation("department name must be 1-100 characters"));
    }
    Ok(value.to_string())
}
