use crate::{
    auth::CurrentUser,
    dtos::analytics::{
        AttendanceParams, AttendanceResponse, MaterialAnalyticsParams, MaterialOverviewResponse,
        SessionOverviewResponse,
    },
    error::ApiError,
    extract::ApiQuery,
    state::AppState,
};
use axum::{
    Json,
    extract::State,
};
use chrono::Utc;
use database::services::{OwnerScope, analytics::AnalyticsService};
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(material_analytics))
        .routes(routes!(session_analytics))
        .routes(routes!(attendance_analytics))
}

/// Totals and top lists over the materials in scope
#[utoipa::path(
    get,
    path = "/analytics/materials",
    params(MaterialAnalyticsParams),
    responses(
        (status = 200, description = "Material statistics", body = MaterialOverviewResponse)
    ),
    security(("jwt" = [])),
    tag = "Analytics"
)]
pub async fn material_analytics(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<MaterialAnalyticsParams>,
) -> Result<Json<MaterialOverviewResponse>, ApiError> {
    let scope = params
        .scope
        .unwrap_or_else(|| OwnerScope::default_for(&current.principal));
    let overview =
        AnalyticsService::material_overview(&state.db, &current.principal, scope, params.top_n)
            .await?;
    Ok(Json(overview.into()))
}

/// Session counts and attendance over the caller's sessions
#[utoipa::path(
    get,
    path = "/analytics/sessions",
    responses(
        (status = 200, description = "Session statistics", body = SessionOverviewResponse),
        (status = 403, description = "Only teachers and admins")
    ),
    security(("jwt" = [])),
    tag = "Analytics"
)]
pub async fn session_analytics(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<SessionOverviewResponse>, ApiError> {
    let overview = AnalyticsService::session_overview(&state.db, &current.principal).await?;
    Ok(Json(overview.into()))
}

/// A student's attendance rate over past sessions
#[utoipa::path(
    get,
    path = "/analytics/attendance",
    params(AttendanceParams),
    responses(
        (status = 200, description = "Attendance summary", body = AttendanceResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Student not found")
    ),
    security(("jwt" = [])),
    tag = "Analytics"
)]
pub async fn attendance_analytics(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<AttendanceParams>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let student_id = params.student_id.unwrap_or(current.user.id);
    let summary =
        AnalyticsService::attendance_for(&state.db, &current.principal, student_id, Utc::now())
            .await?;
    Ok(Json(summary.into()))
}
