use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppResult;
use crate::models::department::DepartmentStatus;
use crate::utils::{hash_password, utc_now};

pub const DEFAULT_ADMIN_EMPLOYEE_ID: &str = "ADMIN001";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_ADMIN_DEPARTMENT: &str = "Administration";

/// First-run bootstrap: makes sure an Administration department and a default
/// administrator account exist so the system is reachable after a fresh
/// deployment. Returns true when the admin account was created.
pub async fn ensure_default_admin(pool: &SqlitePool) -> AppResult<bool> {
    let department_id = ensure_admin_department(pool).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE employee_id = ?")
        .bind(DEFAULT_ADMIN_EMPLOYEE_ID)
        .fetch_one(pool)
        .await?;

    if existing > 0 {
        tracing::debug!("default admin already present, skipping seed");
        return Ok(false);
    }

    let now = utc_now();
    let password_hash = hash_password(DEFAULT_ADMIN_PASSWORD)?;

    sqlx::query(
        "INSERT INTO users (id, employee_id, name, role, department_id, password_hash, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(DEFAULT_ADMIN_EMPLOYEE_ID)
    .bind("System Administrator")
    .bind(Role::Administrator)
    .bind(department_id)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(employee_id = DEFAULT_ADMIN_EMPLOYEE_ID, "default admin created");
    tracing::warn!("change the default admin password after first login");

    Ok(true)
}

async fn ensure_admin_department(pool: &SqlitePool) -> AppResult<Uuid> {
    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM departments WHERE name = ?")
        .bind(DEFAULT_ADMIN_DEPARTMENT)
        .fetch_optional(pool)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO departments (id, name, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(DEFAULT_ADMIN_DEPARTMENT)
    .bind(DepartmentStatus::Active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(name = DEFAULT_ADMIN_DEPARTMENT, "default department created");
    Ok(id)
}
