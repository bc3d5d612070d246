use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

use wardops::{create_app, ensure_default_admin};

async fn setup() -> Result<(TempDir, SqlitePool, Router)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    ensure_default_admin(&pool).await?;

    let app = create_app(pool.clone()).await?;
    Ok((dir, pool, app))
}

async fn send(app: &Router, req: Request<Body>) -> Result<(StatusCode, Value)> {
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

fn request(method: &str, uri: &str, token: Option<&str>, payload: Option<&Value>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match payload {
        Some(payload) => {
            builder = builder.header("content-type", "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };
    Ok(builder.body(body)?)
}

async fn login(app: &Router, employee_id: &str, password: &str) -> Result<String> {
    let (status, login) = send(
        app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(&json!({"employee_id": employee_id, "password": password})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "login failed for {employee_id}: {login}");
    Ok(login["access_token"].as_str().context("missing token")?.to_string())
}

async fn create_department(app: &Router, admin: &str, name: &str) -> Result<Value> {
    let (status, dept) = send(
        app,
        request("POST", "/departments", Some(admin), Some(&json!({ "name": name })))?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "department create failed: {dept}");
    Ok(dept)
}

async fn create_user(
    app: &Router,
    admin: &str,
    employee_id: &str,
    role: &str,
    department_id: &Value,
) -> Result<Value> {
    let (status, user) = send(
        app,
        request(
            "POST",
            "/users",
            Some(admin),
            Some(&json!({
                "employee_id": employee_id,
                "name": "Test Staff",
                "password": "staff123",
                "role": role,
                "department_id": department_id,
            })),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "user create failed: {user}");
    Ok(user)
}

#[tokio::test]
async fn admin_creates_and_reads_users() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let admin = login(&app, "ADMIN001", "admin123").await?;

    let dept = create_department(&app, &admin, "Ward 1").await?;
    let user = create_user(&app, &admin, "WD101", "Doctor", &dept["id"]).await?;

    assert_eq!(user["employee_id"], "WD101");
    assert_eq!(user["role"], "Doctor");
    assert_eq!(user["department_name"], "Ward 1");

    let (status, by_id) = send(
        &app,
        request(
            "GET",
            &format!("/users/{}", user["id"].as_str().context("missing id")?),
            Some(&admin),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["employee_id"], "WD101");

    // employee-id lookup upper-normalizes the path segment
    let (status, by_employee) = send(
        &app,
        request("GET", "/users/employee/wd101", Some(&admin), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_employee["id"], user["id"]);

    Ok(())
}

#[tokio::test]
async fn create_user_validation_and_conflicts() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let admin = login(&app, "ADMIN001", "admin123").await?;
    let dept = create_department(&app, &admin, "Ward 1").await?;

    create_user(&app, &admin, "WD101", "Nurse", &dept["id"]).await?;

    // duplicate employee id
    let (status, payload) = send(
        &app,
        request(
            "POST",
            "/users",
            Some(&admin),
            Some(&json!({
                "employee_id": "WD101",
                "name": "Someone Else",
                "password": "staff123",
                "role": "Nurse",
                "department_id": dept["id"],
            })),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT, "expected conflict: {payload}");

    // malformed employee ids
    for bad in ["emp1", "12345", "E001"] {
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/users",
                Some(&admin),
                Some(&json!({
                    "employee_id": bad,
                    "name": "Bad Id",
                    "password": "staff123",
                    "role": "Nurse",
                    "department_id": dept["id"],
                })),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "employee id {bad} should be rejected");
    }

    // weak passwords
    for bad in ["short", "lettersonly", "123456789"] {
        let (status, _) = send(
            &app,
            request(
                "POST",
                "/users",
                Some(&admin),
                Some(&json!({
                    "employee_id": "WD102",
                    "name": "Weak Password",
                    "password": bad,
                    "role": "Nurse",
                    "department_id": dept["id"],
                })),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "password {bad} should be rejected");
    }

    // unknown department
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/users",
            Some(&admin),
            Some(&json!({
                "employee_id": "WD103",
                "name": "No Department",
                "password": "staff123",
                "role": "Nurse",
                "department_id": "00000000-0000-0000-0000-000000000000",
            })),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn role_guards_on_user_listing() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let admin = login(&app, "ADMIN001", "admin123").await?;
    let dept = create_department(&app, &admin, "Ward 1").await?;

    create_user(&app, &admin, "WD101", "Doctor", &dept["id"]).await?;
    create_user(&app, &admin, "WD102", "Nurse", &dept["id"]).await?;

    let doctor = login(&app, "WD101", "staff123").await?;
    let nurse = login(&app, "WD102", "staff123").await?;

    // creation is admin-only
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/users",
            Some(&doctor),
            Some(&json!({
                "employee_id": "WD104",
                "name": "Not Allowed",
                "password": "staff123",
                "role": "Nurse",
                "department_id": dept["id"],
            })),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // listing is management-grade: admin and doctor yes, nurse no
    let (status, listing) = send(&app, request("GET", "/users", Some(&doctor), None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 3);

    let (status, _) = send(&app, request("GET", "/users", Some(&nurse), None)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // role filter requires a recognized role
    let (status, by_role) = send(&app, request("GET", "/users/role/Nurse", Some(&doctor), None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_role["total"], 1);

    let (status, _) = send(
        &app,
        request("GET", "/users/role/Supervisor", Some(&doctor), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // search is management-grade too
    let (status, found) = send(
        &app,
        request("GET", "/users/search/WD10", Some(&doctor), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["total"], 2);

    Ok(())
}

#[tokio::test]
async fn admin_updates_and_deletes_users() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let admin = login(&app, "ADMIN001", "admin123").await?;
    let ward = create_department(&app, &admin, "Ward 1").await?;
    let icu = create_department(&app, &admin, "ICU").await?;

    let user = create_user(&app, &admin, "WD101", "Nurse", &ward["id"]).await?;
    let user_id = user["id"].as_str().context("missing id")?.to_string();

    let (status, updated) = send(
        &app,
        request(
            "PUT",
            &format!("/users/{user_id}"),
            Some(&admin),
            Some(&json!({"name": "Renamed Nurse", "role": "Doctor", "department_id": icu["id"]})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Renamed Nurse");
    assert_eq!(updated["role"], "Doctor");
    assert_eq!(updated["department_name"], "ICU");

    // moving to a non-existent department is a validation error
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/users/{user_id}"),
            Some(&admin),
            Some(&json!({"department_id": "00000000-0000-0000-0000-000000000000"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/users/{user_id}"), Some(&admin), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("GET", &format!("/users/{user_id}"), Some(&admin), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn password_change_requires_current_password() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let admin = login(&app, "ADMIN001", "admin123").await?;
    let dept = create_department(&app, &admin, "Ward 1").await?;

    let user = create_user(&app, &admin, "WD101", "Nurse", &dept["id"]).await?;
    let user_id = user["id"].as_str().context("missing id")?.to_string();
    let nurse = login(&app, "WD101", "staff123").await?;

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/users/{user_id}/password"),
            Some(&nurse),
            Some(&json!({"current_password": "wrong999", "new_password": "fresh123"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/users/{user_id}/password"),
            Some(&nurse),
            Some(&json!({"current_password": "staff123", "new_password": "fresh123"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // old password no longer works, new one does
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(&json!({"employee_id": "WD101", "password": "staff123"})),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login(&app, "WD101", "fresh123").await?;

    Ok(())
}
