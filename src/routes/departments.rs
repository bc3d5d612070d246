use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz;
use crate::errors::{AppError, AppResult};
use crate::jwt::{AuthUser, OptionalAuthUser};
use crate::models::department::{
    validate_department_name, Department, DepartmentCreateRequest, DepartmentListResponse,
    DepartmentOption, DepartmentStatus, DepartmentUpdateRequest,
};
use crate::utils::utc_now;

#[utoipa::path(
    post,
    path = "/departments",
    tag = "Departments",
    request_body = DepartmentCreateRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Department name already exists")
    )
)]
pub async fn create_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<DepartmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Department>)> {
    authz::require_admin(&auth.user)?;

    let name = validate_department_name(&payload.name)?;
    ensure_name_available(&state.pool, &name, None).await?;

    let now = utc_now();
    let department_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO departments (id, name, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(department_id)
    .bind(&name)
    .bind(payload.status.unwrap_or(DepartmentStatus::Active))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let department = fetch_department(&state.pool, department_id).await?;
    tracing::info!(name = %department.name, "department created");

    Ok((StatusCode::CREATED, Json(department)))
}

#[utoipa::path(
    get,
    path = "/departments",
    tag = "Departments",
    responses((status = 200, description = "List departments", body = DepartmentListResponse))
)]
pub async fn list_departments(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DepartmentListResponse>> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, name, status, created_at, updated_at FROM departments ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    let total = departments.len() as i64;
    Ok(Json(DepartmentListResponse { departments, total }))
}

#[utoipa::path(
    get,
    path = "/departments/active",
    tag = "Departments",
    responses((status = 200, description = "Active departments", body = [DepartmentOption]))
)]
pub async fn active_departments(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
) -> AppResult<Json<Vec<DepartmentOption>>> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, name, status, created_at, updated_at FROM departments WHERE status = ? ORDER BY name",
    )
    .bind(DepartmentStatus::Active)
    .fetch_all(&state.pool)
    .await?;

    // Anonymous callers (the pre-login department picker) get id and name
    // only; authenticated callers also see the status field.
    let authenticated = user.is_some();
    let options = departments
        .into_iter()
        .map(|dept| DepartmentOption {
            id: dept.id,
            name: dept.name,
            status: authenticated.then_some(dept.status),
        })
        .collect();

    Ok(Json(options))
}

#[utoipa::path(
    get,
    path = "/departments/{id}",
    tag = "Departments",
    params(("id" = Uuid, Path, description = "Department id")),
    responses((status = 200, description = "Department detail", body = Department))
)]
pub async fn get_department(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Department>> {
    let department = fetch_department(&state.pool, id).await?;
    Ok(Json(department))
}

#[utoipa::path(
    put,
    path = "/departments/{id}",
    tag = "Departments",
    params(("id" = Uuid, Path, description = "Department id")),
    request_body = DepartmentUpdateRequest,
    responses((status = 200, description = "Department updated", body = Department))
)]
pub async fn update_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DepartmentUpdateRequest>,
) -> AppResult<Json<Department>> {
    authz::require_admin(&auth.user)?;

    let mut department = fetch_department(&state.pool, id).await?;

    if let Some(name) = payload.name.as_deref() {
        let name = validate_department_name(name)?;
        ensure_name_available(&state.pool, &name, Some(id)).await?;
        department.name = name;
    }
    if let Some(status) = payload.status {
        department.status = status;
    }

    let now = utc_now();
    sqlx::query("UPDATE departments SET name = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(&department.name)
        .bind(department.status)
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    department.updated_at = now;
    tracing::info!(name = %department.name, "department updated");

    Ok(Json(department))
}

#[utoipa::path(
    delete,
    path = "/departments/{id}",
    tag = "Departments",
    params(("id" = Uuid, Path, description = "Department id")),
    responses((status = 204, description = "Department deleted"))
)]
pub async fn delete_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authz::require_admin(&auth.user)?;

    // Deleting a department that still has staff trips the FK constraint and
    // surfaces as an infrastructure error.
    let affected = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("department not found"));
    }

    tracing::info!(department_id = %id, "department deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_name_available(
    pool: &SqlitePool,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    // The name column is COLLATE NOCASE, so equality here is case-insensitive.
    let count: i64 = match exclude {
        Some(id) => {
            sqlx::query_scalar("SELECT COUNT(1) FROM departments WHERE name = ? AND id != ?")
                .bind(name)
                .bind(id)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(1) FROM departments WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await?
        }
    };

    if count > 0 {
        return Err(AppError::conflict(format!(
            "department with name '{name}' already exists"
        )));
    }

    Ok(())
}

async fn fetch_department(pool: &SqlitePool, department_id: Uuid) -> AppResult<Department> {
    sqlx::query_as::<_, Department>(
        "SELECT id, name, status, created_at, updated_at FROM departments WHERE id = ?",
    )
    .bind(department_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("department not found"))
}
