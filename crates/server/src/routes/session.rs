use crate::{
    auth::CurrentUser,
    dtos::{
        common::PaginationMeta,
        session::{
            AttendeeResponse, CreateSessionRequest, JoinResponse, PaginatedSessionsResponse,
            SessionDetailsResponse, SessionQueryParams, SessionResponse, UpdateSessionRequest,
        },
    },
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use database::services::session::SessionService;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_sessions, create_session))
        .routes(routes!(get_session, update_session, delete_session))
        .routes(routes!(join_session))
        .routes(routes!(cancel_session))
        .routes(routes!(list_attendees))
}

/// List sessions: teachers see their own, students the ones they may join
#[utoipa::path(
    get,
    path = "/sessions",
    params(SessionQueryParams),
    responses(
        (status = 200, description = "Sessions retrieved successfully", body = PaginatedSessionsResponse),
        (status = 400, description = "Invalid query parameters")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<SessionQueryParams>,
) -> Result<Json<PaginatedSessionsResponse>, ApiError> {
    let pagination = params.pagination();
    let page =
        SessionService::list(&state.db, &current.principal, params.into_filter(), pagination)
            .await?;
    let meta = PaginationMeta::from(&page);

    Ok(Json(PaginatedSessionsResponse {
        sessions: page.items.into_iter().map(Into::into).collect(),
        pagination: meta,
    }))
}

/// Schedule a session. If the conferencing provider is unavailable the
/// session is still created, with a placeholder meeting.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session scheduled", body = SessionDetailsResponse),
        (status = 400, description = "Invalid session"),
        (status = 403, description = "Only teachers and admins schedule sessions")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionDetailsResponse>), ApiError> {
    let scheduled = SessionService::create(
        &state.db,
        state.provider.as_ref(),
        &current.principal,
        req.into(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(scheduled.into())))
}

/// Get a session with its materials and attendee count
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session found", body = SessionDetailsResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Session not found")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetailsResponse>, ApiError> {
    let details = SessionService::get(&state.db, &current.principal, id).await?;
    Ok(Json(details.into()))
}

/// Update a session; the provider meeting follows on a best-effort basis
#[utoipa::path(
    patch,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Session updated", body = SessionResponse),
        (status = 400, description = "Invalid update or status transition"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Session not found")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn update_session(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = SessionService::update(
        &state.db,
        state.provider.as_ref(),
        &current.principal,
        id,
        req.into(),
    )
    .await?;
    Ok(Json(session.into()))
}

/// Delete a session with its attendance records
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Session not found")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    SessionService::delete(&state.db, state.provider.as_ref(), &current.principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a session as a student; attendance is recorded once
#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Joined", body = JoinResponse),
        (status = 400, description = "Session is not open for joining"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Session not found")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn join_session(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinResponse>, ApiError> {
    let joined = SessionService::join(&state.db, &current.principal, id).await?;
    Ok(Json(joined.into()))
}

/// Cancel a session
#[utoipa::path(
    post,
    path = "/sessions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session cancelled", body = SessionResponse),
        (status = 400, description = "Session already ended or cancelled"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Session not found")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session =
        SessionService::cancel(&state.db, state.provider.as_ref(), &current.principal, id).await?;
    Ok(Json(session.into()))
}

/// Students who joined a session, for its owner
#[utoipa::path(
    get,
    path = "/sessions/{id}/attendees",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Attendance records", body = Vec<AttendeeResponse>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Session not found")
    ),
    security(("jwt" = [])),
    tag = "Sessions"
)]
pub async fn list_attendees(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendeeResponse>>, ApiError> {
    let attendees = SessionService::attendees(&state.db, &current.principal, id).await?;
    Ok(Json(attendees.into_iter().map(Into::into).collect()))
}
