use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, departments, health, reports, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool, jwt_config);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/", post(users::create_user))
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id", put(users::update_user))
        .route("/:id", delete(users::delete_user))
        .route("/:id/password", put(users::update_password))
        .route("/employee/:employee_id", get(users::get_user_by_employee_id))
        .route("/search/:term", get(users::search_users))
        .route("/department/:department_id", get(users::users_by_department))
        .route("/role/:role", get(users::users_by_role));

    let department_routes = Router::new()
        .route("/", post(departments::create_department))
        .route("/", get(departments::list_departments))
        .route("/active", get(departments::active_departments))
        .route("/:id", get(departments::get_department))
        .route("/:id", put(departments::update_department))
        .route("/:id", delete(departments::delete_department));

    let report_routes = Router::new()
        .route("/", get(reports::list_reports))
        .route("/monthly", post(reports::save_report))
        .route("/monthly/submit", post(reports::submit_report))
        .route("/monthly/:year/:month", get(reports::get_report))
        .route("/monthly/:year/:month", delete(reports::delete_report))
        .route("/monthly/:year/:month/approve", put(reports::approve_report))
        .route("/year/:year", get(reports::reports_by_year))
        .route("/statistics/:year", get(reports::year_statistics));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/departments", department_routes)
        .nest("/reports", report_routes)
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
