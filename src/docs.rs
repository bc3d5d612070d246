use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::login,
        routes::auth::refresh,
        routes::auth::me,
        routes::auth::logout,
        routes::users::create_user,
        routes::users::list_users,
        routes::users::get_user,
        routes::users::get_user_by_employee_id,
        routes::users::update_user,
        routes::users::update_password,
        routes::users::delete_user,
        routes::users::search_users,
        routes::users::users_by_department,
        routes::users::users_by_role,
        routes::departments::create_department,
        routes::departments::list_departments,
        routes::departments::active_departments,
        routes::departments::get_department,
        routes::departments::update_department,
        routes::departments::delete_department,
        routes::reports::save_report,
        routes::reports::get_report,
        routes::reports::reports_by_year,
        routes::reports::list_reports,
        routes::reports::submit_report,
        routes::reports::approve_report,
        routes::reports::delete_report,
        routes::reports::year_statistics,
        routes::health::health,
    ),
    components(
        schemas(
            crate::authz::Role,
            models::user::User,
            models::user::UserCreateRequest,
            models::user::UserUpdateRequest,
            models::user::PasswordUpdateRequest,
            models::user::UserListResponse,
            models::department::Department,
            models::department::DepartmentStatus,
            models::department::DepartmentCreateRequest,
            models::department::DepartmentUpdateRequest,
            models::department::DepartmentListResponse,
            models::department::DepartmentOption,
            models::report::MonthlyReport,
            models::report::ReportStatus,
            models::report::ReportResponse,
            models::report::SaveReportRequest,
            models::report::SubmitReportRequest,
            models::report::YearStatistics,
            routes::auth::LoginRequest,
            routes::auth::LoginResponse,
            routes::auth::RefreshRequest,
            routes::auth::RefreshResponse,
            routes::auth::MessageResponse,
            routes::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication and token lifecycle"),
        (name = "Users", description = "Staff administration"),
        (name = "Departments", description = "Department administration"),
        (name = "Reports", description = "Monthly ward statistical reports"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_routes() -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .persist_authorization(true);

    let doc_json =
        Arc::new(serde_json::to_value(ApiDoc::openapi()).expect("OpenAPI serialization must succeed"));

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}
