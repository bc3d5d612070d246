use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;

/// Closed role vocabulary. Authorization is a flat allow-list per endpoint;
/// there is no hierarchy or inheritance between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
pub enum Role {
    Doctor,
    Nurse,
    #[serde(rename = "Lab Technician")]
    #[sqlx(rename = "Lab Technician")]
    LabTechnician,
    Pharmacist,
    Administrator,
    Receptionist,
    Radiologist,
    Physiotherapist,
    Dietitian,
    #[serde(rename = "Social Worker")]
    #[sqlx(rename = "Social Worker")]
    SocialWorker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "Doctor",
            Role::Nurse => "Nurse",
            Role::LabTechnician => "Lab Technician",
            Role::Pharmacist => "Pharmacist",
            Role::Administrator => "Administrator",
            Role::Receptionist => "Receptionist",
            Role::Radiologist => "Radiologist",
            Role::Physiotherapist => "Physiotherapist",
            Role::Dietitian => "Dietitian",
            Role::SocialWorker => "Social Worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Doctor" => Ok(Role::Doctor),
            "Nurse" => Ok(Role::Nurse),
            "Lab Technician" => Ok(Role::LabTechnician),
            "Pharmacist" => Ok(Role::Pharmacist),
            "Administrator" => Ok(Role::Administrator),
            "Receptionist" => Ok(Role::Receptionist),
            "Radiologist" => Ok(Role::Radiologist),
            "Physiotherapist" => Ok(Role::Physiotherapist),
            "Dietitian" => Ok(Role::Dietitian),
            "Social Worker" => Ok(Role::SocialWorker),
            other => Err(AppError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Exact-match membership test against the caller's current role.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        return Ok(());
    }

    tracing::warn!(
        user = %user.employee_id,
        role = %user.role,
        "role check failed"
    );

    let roles = allowed
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    Err(AppError::forbidden(format!(
        "access denied, required roles: {roles}"
    )))
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    require_role(user, &[Role::Administrator])
}

/// Management-grade reads: administrators plus doctors, intentionally coarse.
pub fn require_management(user: &User) -> Result<(), AppError> {
    require_role(user, &[Role::Administrator, Role::Doctor])
}

/// Department-scoped access. Administrators pass regardless of department
/// when the override is enabled; everyone else must belong to the target
/// department.
pub fn require_department_access(
    user: &User,
    department_id: Uuid,
    allow_admin_override: bool,
) -> Result<(), AppError> {
    if allow_admin_override && user.role == Role::Administrator {
        return Ok(());
    }

    if user.department_id == department_id {
        return Ok(());
    }

    tracing::warn!(
        user = %user.employee_id,
        user_department = %user.department_id,
        target_department = %department_id,
        "department access denied"
    );

    Err(AppError::forbidden(
        "access denied, insufficient department permissions",
    ))
}
