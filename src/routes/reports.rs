use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::report::{
    first_of_month, validate_report_key, MonthlyReport, ReportResponse, ReportStatus, SaveReportRequest,
    SubmitReportRequest, YearStatistics,
};
use crate::routes::users::ListParams;
use crate::utils::utc_now;

#[utoipa::path(
    post,
    path = "/reports/monthly",
    tag = "Reports",
    request_body = SaveReportRequest,
    responses(
        (status = 200, description = "Report saved", body = ReportResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn save_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SaveReportRequest>,
) -> AppResult<Json<ReportResponse>> {
    payload.validate()?;

    let report_date = first_of_month(payload.year, payload.month)?;
    let now = utc_now();

    // Single atomic upsert keyed on (year, month): no read-then-write window
    // for two concurrent saves of the same month. The stored status only
    // changes when the payload explicitly carries one; created_by is fixed at
    // first insert.
    sqlx::query(
        "INSERT INTO ward_monthly_reports (\
            year, month, report_date, \
            total_beds, total_beds_hdu, total_beds_ward, total_beds_isolation, \
            admissions_male, admissions_female, admissions_ah, admissions_amca, admissions_sama, \
            admissions_ku, admissions_munt, admissions_ward02, admissions_isolation, admissions_hdu_unit, \
            bed_occupancy_rate, avg_length_of_stay, midnight_total, discharges, lama, re_admissions, discharge_same_day, \
            transfer_to_other_hospitals, transfer_from_other_hospitals, weekday_transfers_in, weekday_transfers_out, \
            weekend_transfers_in, weekend_transfers_out, missing, number_of_death, death_within_24hrs, death_within_48hrs, death_rate, \
            no_of_hd, xray_inward, xray_departmental, ecg_inward, ecg_departmental, abg, wit_meetings, \
            referrals_cardiology, referrals_chest_physician, referrals_radiodiagnosis, referrals_heumatology, referrals_others, total_referrals, \
            status, created_by, last_updated_by, created_at, updated_at) \
         VALUES (?, ?, ?, \
            ?, ?, ?, ?, \
            ?, ?, ?, ?, ?, \
            ?, ?, ?, ?, ?, \
            ?, ?, ?, ?, ?, ?, ?, \
            ?, ?, ?, ?, \
            ?, ?, ?, ?, ?, ?, ?, \
            ?, ?, ?, ?, ?, ?, ?, \
            ?, ?, ?, ?, ?, ?, \
            COALESCE(?, 'draft'), ?, ?, ?, ?) \
         ON CONFLICT(year, month) DO UPDATE SET \
            report_date = excluded.report_date, \
            total_beds = excluded.total_beds, \
            total_beds_hdu = excluded.total_beds_hdu, \
            total_beds_ward = excluded.total_beds_ward, \
            total_beds_isolation = excluded.total_beds_isolation, \
            admissions_male = excluded.admissions_male, \
            admissions_female = excluded.admissions_female, \
            admissions_ah = excluded.admissions_ah, \
            admissions_amca = excluded.admissions_amca, \
            admissions_sama = excluded.admissions_sama, \
            admissions_ku = excluded.admissions_ku, \
            admissions_munt = excluded.admissions_munt, \
            admissions_ward02 = excluded.admissions_ward02, \
            admissions_isolation = excluded.admissions_isolation, \
            admissions_hdu_unit = excluded.admissions_hdu_unit, \
            bed_occupancy_rate = excluded.bed_occupancy_rate, \
            avg_length_of_stay = excluded.avg_length_of_stay, \
            midnight_total = excluded.midnight_total, \
            discharges = excluded.discharges, \
            lama = excluded.lama, \
            re_admissions = excluded.re_admissions, \
            discharge_same_day = excluded.discharge_same_day, \
            transfer_to_other_hospitals = excluded.transfer_to_other_hospitals, \
            transfer_from_other_hospitals = excluded.transfer_from_other_hospitals, \
            weekday_transfers_in = excluded.weekday_transfers_in, \
            weekday_transfers_out = excluded.weekday_transfers_out, \
            weekend_transfers_in = excluded.weekend_transfers_in, \
            weekend_transfers_out = excluded.weekend_transfers_out, \
            missing = excluded.missing, \
            number_of_death = excluded.number_of_death, \
            death_within_24hrs = excluded.death_within_24hrs, \
            death_within_48hrs = excluded.death_within_48hrs, \
            death_rate = excluded.death_rate, \
            no_of_hd = excluded.no_of_hd, \
            xray_inward = excluded.xray_inward, \
            xray_departmental = excluded.xray_departmental, \
            ecg_inward = excluded.ecg_inward, \
            ecg_departmental = excluded.ecg_departmental, \
            abg = excluded.abg, \
            wit_meetings = excluded.wit_meetings, \
            referrals_cardiology = excluded.referrals_cardiology, \
            referrals_chest_physician = excluded.referrals_chest_physician, \
            referrals_radiodiagnosis = excluded.referrals_radiodiagnosis, \
            referrals_heumatology = excluded.referrals_heumatology, \
            referrals_others = excluded.referrals_others, \
            total_referrals = excluded.total_referrals, \
            status = COALESCE(?, ward_monthly_reports.status), \
            last_updated_by = excluded.last_updated_by, \
            updated_at = excluded.updated_at",
    )
    .bind(payload.year)
    .bind(payload.month)
    .bind(report_date)
    .bind(payload.total_beds)
    .bind(payload.total_beds_hdu)
    .bind(payload.total_beds_ward)
    .bind(payload.total_beds_isolation)
    .bind(payload.admissions_male)
    .bind(payload.admissions_female)
    .bind(payload.admissions_ah)
    .bind(payload.admissions_amca)
    .bind(payload.admissions_sama)
    .bind(payload.admissions_ku)
    .bind(payload.admissions_munt)
    .bind(payload.admissions_ward02)
    .bind(payload.admissions_isolation)
    .bind(payload.admissions_hdu_unit)
    .bind(payload.bed_occupancy_rate)
    .bind(payload.avg_length_of_stay)
    .bind(payload.midnight_total)
    .bind(payload.discharges)
    .bind(payload.lama)
    .bind(payload.re_admissions)
    .bind(payload.discharge_same_day)
    .bind(payload.transfer_to_other_hospitals)
    .bind(payload.transfer_from_other_hospitals)
    .bind(payload.weekday_transfers_in)
    .bind(payload.weekday_transfers_out)
    .bind(payload.weekend_transfers_in)
    .bind(payload.weekend_transfers_out)
    .bind(payload.missing)
    .bind(payload.number_of_death)
    .bind(payload.death_within_24hrs)
    .bind(payload.death_within_48hrs)
    .bind(payload.death_rate)
    .bind(payload.no_of_hd)
    .bind(payload.xray_inward)
    .bind(payload.xray_departmental)
    .bind(payload.ecg_inward)
    .bind(payload.ecg_departmental)
    .bind(payload.abg)
    .bind(payload.wit_meetings)
    .bind(payload.referrals_cardiology)
    .bind(payload.referrals_chest_physician)
    .bind(payload.referrals_radiodiagnosis)
    .bind(payload.referrals_heumatology)
    .bind(payload.referrals_others)
    .bind(payload.total_referrals)
    .bind(payload.status)
    .bind(auth.user.id)
    .bind(auth.user.id)
    .bind(now)
    .bind(now)
    .bind(payload.status)
    .execute(&state.pool)
    .await?;

    let report = find_report(&state.pool, payload.year, payload.month)
        .await?
        .ok_or_else(|| AppError::internal("report missing after save"))?;

    tracing::info!(
        year = payload.year,
        month = payload.month,
        employee_id = %auth.user.employee_id,
        "report saved"
    );

    Ok(Json(report.into()))
}

#[utoipa::path(
    get,
    path = "/reports/monthly/{year}/{month}",
    tag = "Reports",
    params(
        ("year" = i64, Path, description = "Report year"),
        ("month" = i64, Path, description = "Report month (1-12)")
    ),
    responses(
        (status = 200, description = "Report detail", body = ReportResponse),
        (status = 404, description = "No report for this month")
    )
)]
pub async fn get_report(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((year, month)): Path<(i64, i64)>,
) -> AppResult<Json<ReportResponse>> {
    validate_report_key(year, month)?;

    let report = find_report(&state.pool, year, month)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("no monthly report found for {month:02}/{year}"))
        })?;

    Ok(Json(report.into()))
}

#[utoipa::path(
    get,
    path = "/reports/year/{year}",
    tag = "Reports",
    params(("year" = i64, Path, description = "Report year")),
    responses((status = 200, description = "Reports for the year", body = [ReportResponse]))
)]
pub async fn reports_by_year(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(year): Path<i64>,
) -> AppResult<Json<Vec<ReportResponse>>> {
    validate_report_key(year, 1)?;

    let reports = sqlx::query_as::<_, MonthlyReport>(
        "SELECT * FROM ward_monthly_reports WHERE year = ? ORDER BY month",
    )
    .bind(year)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(reports.into_iter().map(ReportResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/reports",
    tag = "Reports",
    params(
        ("skip" = Option<i64>, Query, description = "Rows to skip"),
        ("limit" = Option<i64>, Query, description = "Max rows to return (1-100)")
    ),
    responses((status = 200, description = "All reports, newest first", body = [ReportResponse]))
)]
pub async fn list_reports(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<ReportResponse>>> {
    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 100);

    let reports = sqlx::query_as::<_, MonthlyReport>(
        "SELECT * FROM ward_monthly_reports ORDER BY year DESC, month DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(reports.into_iter().map(ReportResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/reports/monthly/submit",
    tag = "Reports",
    request_body = SubmitReportRequest,
    responses(
        (status = 200, description = "Report submitted", body = ReportResponse),
        (status = 400, description = "Missing report or already approved")
    )
)]
pub async fn submit_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SubmitReportRequest>,
) -> AppResult<Json<ReportResponse>> {
    validate_report_key(payload.year, payload.month)?;

    let report = find_report(&state.pool, payload.year, payload.month)
        .await?
        .ok_or_else(|| {
            AppError::validation(format!(
                "no report found for {}/{}",
                payload.year, payload.month
            ))
        })?;

    if report.status == ReportStatus::Approved {
        return Err(AppError::validation("cannot submit an already approved report"));
    }

    // Re-submitting a submitted report is accepted; it just refreshes the
    // audit fields.
    let report = set_status(
        &state.pool,
        payload.year,
        payload.month,
        ReportStatus::Submitted,
        auth.user.id,
    )
    .await?;

    tracing::info!(year = payload.year, month = payload.month, "report submitted for approval");
    Ok(Json(report.into()))
}

#[utoipa::path(
    put,
    path = "/reports/monthly/{year}/{month}/approve",
    tag = "Reports",
    params(
        ("year" = i64, Path, description = "Report year"),
        ("month" = i64, Path, description = "Report month (1-12)")
    ),
    responses(
        (status = 200, description = "Report approved", body = ReportResponse),
        (status = 400, description = "Missing report or not submitted"),
        (status = 403, description = "Approver role required")
    )
)]
pub async fn approve_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((year, month)): Path<(i64, i64)>,
) -> AppResult<Json<ReportResponse>> {
    // Authorization lives at the route; the state machine below only guards
    // status transitions.
    authz::require_admin(&auth.user)?;
    validate_report_key(year, month)?;

    let report = find_report(&state.pool, year, month)
        .await?
        .ok_or_else(|| AppError::validation(format!("no report found for {year}/{month}")))?;

    if report.status != ReportStatus::Submitted {
        return Err(AppError::validation("can only approve submitted reports"));
    }

    let report = set_status(
        &state.pool,
        year,
        month,
        ReportStatus::Approved,
        auth.user.id,
    )
    .await?;

    tracing::info!(year, month, approver = %auth.user.employee_id, "report approved");
    Ok(Json(report.into()))
}

#[utoipa::path(
    delete,
    path = "/reports/monthly/{year}/{month}",
    tag = "Reports",
    params(
        ("year" = i64, Path, description = "Report year"),
        ("month" = i64, Path, description = "Report month (1-12)")
    ),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 400, description = "Missing report or not a draft")
    )
)]
pub async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((year, month)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    validate_report_key(year, month)?;

    let report = find_report(&state.pool, year, month)
        .await?
        .ok_or_else(|| AppError::validation(format!("no report found for {year}/{month}")))?;

    if report.status != ReportStatus::Draft {
        return Err(AppError::validation("can only delete draft reports"));
    }

    sqlx::query("DELETE FROM ward_monthly_reports WHERE year = ? AND month = ?")
        .bind(year)
        .bind(month)
        .execute(&state.pool)
        .await?;

    tracing::info!(year, month, employee_id = %auth.user.employee_id, "draft report deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/reports/statistics/{year}",
    tag = "Reports",
    params(("year" = i64, Path, description = "Report year")),
    responses((status = 200, description = "Yearly statistics", body = YearStatistics))
)]
pub async fn year_statistics(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(year): Path<i64>,
) -> AppResult<Json<YearStatistics>> {
    validate_report_key(year, 1)?;

    let reports = sqlx::query_as::<_, MonthlyReport>(
        "SELECT * FROM ward_monthly_reports WHERE year = ? ORDER BY month",
    )
    .bind(year)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(YearStatistics::compute(year, &reports)))
}

async fn find_report(
    pool: &SqlitePool,
    year: i64,
    month: i64,
) -> AppResult<Option<MonthlyReport>> {
    let report = sqlx::query_as::<_, MonthlyReport>(
        "SELECT * FROM ward_monthly_reports WHERE year = ? AND month = ?",
    )
    .bind(year)
    .bind(month)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

async fn set_status(
    pool: &SqlitePool,
    year: i64,
    month: i64,
    status: ReportStatus,
    actor_id: uuid::Uuid,
) -> AppResult<MonthlyReport> {
    sqlx::query(
        "UPDATE ward_monthly_reports SET status = ?, last_updated_by = ?, updated_at = ? \
         WHERE year = ? AND month = ?",
    )
    .bind(status)
    .bind(actor_id)
    .bind(utc_now())
    .bind(year)
    .bind(month)
    .execute(pool)
    .await?;

    find_report(pool, year, month)
        .await?
        .ok_or_else(|| AppError::internal("report missing after status update"))
}
