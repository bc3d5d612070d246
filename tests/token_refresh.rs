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

fn post_json(uri: &str, token: Option<&str>, payload: &Value) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(payload.to_string()))?)
}

async fn admin_token(app: &Router) -> Result<String> {
    let (status, login) = send(
        app,
        post_json(
            "/auth/login",
            None,
            &json!({"employee_id": "ADMIN001", "password": "admin123"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "admin login failed: {login}");
    Ok(login["access_token"].as_str().context("missing token")?.to_string())
}

#[tokio::test]
async fn refresh_issues_a_working_token() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let token = admin_token(&app).await?;

    let (status, refreshed) =
        send(&app, post_json("/auth/refresh", None, &json!({ "token": token }))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["token_type"], "bearer");

    let new_token = refreshed["access_token"].as_str().context("missing token")?;
    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("authorization", format!("Bearer {new_token}"))
        .body(Body::empty())?;
    let (status, me) = send(&app, req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["employee_id"], "ADMIN001");

    Ok(())
}

#[tokio::test]
async fn refresh_rejects_garbage_tokens() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;

    let (status, _) = send(
        &app,
        post_json("/auth/refresh", None, &json!({"token": "garbage.token.here"}))?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn refresh_fails_for_a_deleted_user() -> Result<()> {
    let (_dir, _pool, app) = setup().await?;
    let admin = admin_token(&app).await?;

    // department for the short-lived account
    let (status, dept) = send(
        &app,
        post_json("/departments", Some(&admin), &json!({"name": "Ward 1"}))?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, user) = send(
        &app,
        post_json(
            "/users",
            Some(&admin),
            &json!({
                "employee_id": "WD101",
                "name": "Transient Nurse",
                "password": "nurse123",
                "role": "Nurse",
                "department_id": dept["id"],
            }),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, login) = send(
        &app,
        post_json(
            "/auth/login",
            None,
            &json!({"employee_id": "WD101", "password": "nurse123"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let nurse_token = login["access_token"].as_str().context("missing token")?.to_string();

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/users/{}", user["id"].as_str().context("missing id")?))
        .header("authorization", format!("Bearer {admin}"))
        .body(Body::empty())?;
    let (status, _) = send(&app, req).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // the token still verifies cryptographically, but the subject is gone
    let (status, _) = send(
        &app,
        post_json("/auth/refresh", None, &json!({ "token": nurse_token }))?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}
