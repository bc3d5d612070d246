use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, Role};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::department::DepartmentStatus;
use crate::models::user::{
    validate_employee_id, validate_name, validate_password, PasswordUpdateRequest, User,
    UserCreateRequest, UserListResponse, UserUpdateRequest,
};
use crate::routes::auth::MessageResponse;
use crate::utils::{hash_password, utc_now, verify_password};

const USER_COLUMNS: &str =
    "u.id, u.employee_id, u.name, u.role, u.department_id, d.name AS department_name, \
     u.created_at, u.updated_at";

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 409, description = "Employee id already exists")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    authz::require_admin(&auth.user)?;

    let employee_id = validate_employee_id(&payload.employee_id)?;
    let name = validate_name(&payload.name)?;
    validate_password(&payload.password)?;
    ensure_employee_id_available(&state.pool, &employee_id).await?;

    // The department must exist and be active at creation time; this is not
    // re-validated for existing users when a department is later retired.
    let status: Option<DepartmentStatus> =
        sqlx::query_scalar("SELECT status FROM departments WHERE id = ?")
            .bind(payload.department_id)
            .fetch_optional(&state.pool)
            .await?;
    if status != Some(DepartmentStatus::Active) {
        return Err(AppError::validation("department not found or inactive"));
    }

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, employee_id, name, role, department_id, password_hash, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&employee_id)
    .bind(&name)
    .bind(payload.role)
    .bind(payload.department_id)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let user = fetch_user(&state.pool, user_id).await?;
    tracing::info!(employee_id = %user.employee_id, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(
        ("skip" = Option<i64>, Query, description = "Rows to skip"),
        ("limit" = Option<i64>, Query, description = "Max rows to return (1-100)")
    ),
    responses((status = 200, description = "List users", body = UserListResponse))
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<UserListResponse>> {
    authz::require_management(&auth.user)?;

    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 100);

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         ORDER BY u.created_at LIMIT ? OFFSET ?"
    );
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(limit)
        .bind(skip)
        .fetch_all(&state.pool)
        .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users")
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(UserListResponse {
        users,
        total,
        page: skip / limit + 1,
        per_page: limit,
    }))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "User detail", body = User))
)]
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let user = fetch_user(&state.pool, id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/users/employee/{employee_id}",
    tag = "Users",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses((status = 200, description = "User detail", body = User))
)]
pub async fn get_user_by_employee_id(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(employee_id): Path<String>,
) -> AppResult<Json<User>> {
    let employee_id = employee_id.trim().to_uppercase();

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         WHERE u.employee_id = ?"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(&employee_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses((status = 200, description = "User updated", body = User))
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    authz::require_admin(&auth.user)?;

    let mut user = fetch_user(&state.pool, id).await?;

    if let Some(name) = payload.name.as_deref() {
        user.name = validate_name(name)?;
    }
    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(department_id) = payload.department_id {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM departments WHERE id = ?")
            .bind(department_id)
            .fetch_one(&state.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::validation("department not found"));
        }
        user.department_id = department_id;
    }

    let now = utc_now();
    sqlx::query("UPDATE users SET name = ?, role = ?, department_id = ?, updated_at = ? WHERE id = ?")
        .bind(&user.name)
        .bind(user.role)
        .bind(user.department_id)
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    let user = fetch_user(&state.pool, id).await?;
    tracing::info!(employee_id = %user.employee_id, "user updated");

    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}/password",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = PasswordUpdateRequest,
    responses((status = 200, description = "Password updated"))
)]
pub async fn update_password(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PasswordUpdateRequest>,
) -> AppResult<Json<MessageResponse>> {
    // Self-service: the current password is the gate, whoever presents it.
    let stored_hash: Option<String> = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let stored_hash = stored_hash.ok_or_else(|| AppError::not_found("user not found"))?;

    if !verify_password(&payload.current_password, &stored_hash) {
        return Err(AppError::validation("current password is incorrect"));
    }

    validate_password(&payload.new_password)?;
    let password_hash = hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(Json(MessageResponse {
        message: "password updated".to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 204, description = "User deleted"))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authz::require_admin(&auth.user)?;

    // Hard delete; report audit columns fall back to NULL via the FK.
    let affected = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/search/{term}",
    tag = "Users",
    params(("term" = String, Path, description = "Name or employee id fragment")),
    responses((status = 200, description = "Matching users", body = UserListResponse))
)]
pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(term): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<UserListResponse>> {
    authz::require_management(&auth.user)?;

    let limit = params.limit.clamp(1, 100);
    let pattern = format!("%{}%", term.trim());

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         WHERE u.name LIKE ? OR u.employee_id LIKE ? ORDER BY u.name LIMIT ?"
    );
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;

    let total = users.len() as i64;
    Ok(Json(UserListResponse {
        users,
        total,
        page: 1,
        per_page: limit,
    }))
}

#[utoipa::path(
    get,
    path = "/users/department/{department_id}",
    tag = "Users",
    params(("department_id" = Uuid, Path, description = "Department id")),
    responses((status = 200, description = "Users in department", body = UserListResponse))
)]
pub async fn users_by_department(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(department_id): Path<Uuid>,
) -> AppResult<Json<UserListResponse>> {
    authz::require_department_access(&auth.user, department_id, true)?;

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         WHERE u.department_id = ? ORDER BY u.name"
    );
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(department_id)
        .fetch_all(&state.pool)
        .await?;

    let total = users.len() as i64;
    Ok(Json(UserListResponse {
        users,
        total,
        page: 1,
        per_page: total.max(1),
    }))
}

#[utoipa::path(
    get,
    path = "/users/role/{role}",
    tag = "Users",
    params(("role" = String, Path, description = "Role name, e.g. Doctor")),
    responses((status = 200, description = "Users with role", body = UserListResponse))
)]
pub async fn users_by_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(role): Path<String>,
) -> AppResult<Json<UserListResponse>> {
    authz::require_management(&auth.user)?;

    let role: Role = role.parse()?;

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         WHERE u.role = ? ORDER BY u.name"
    );
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(role)
        .fetch_all(&state.pool)
        .await?;

    let total = users.len() as i64;
    Ok(Json(UserListResponse {
        users,
        total,
        page: 1,
        per_page: total.max(1),
    }))
}

async fn ensure_employee_id_available(pool: &SqlitePool, employee_id: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE employee_id = ?")
        .bind(employee_id)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict(format!(
            "employee id '{employee_id}' already exists"
        )));
    }

    Ok(())
}

async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> AppResult<User> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN departments d ON d.id = u.department_id \
         WHERE u.id = ?"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}
