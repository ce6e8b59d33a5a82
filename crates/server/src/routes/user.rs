use crate::{
    auth::CurrentUser,
    dtos::user::{CreateUserRequest, StudentQueryParams, UpdateEnrollmentRequest, UserResponse},
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use database::services::user::UserService;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(me))
        .routes(routes!(create_user))
        .routes(routes!(list_students))
        .routes(routes!(update_enrollment))
}

/// The caller's own account
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "No account for this identity")
    ),
    security(("jwt" = [])),
    tag = "Users"
)]
pub async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(current.user.into())
}

/// Register an account for an identity-provider subject
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid user or subject already registered"),
        (status = 403, description = "Only admins register users")
    ),
    security(("jwt" = [])),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = UserService::register(&state.db, &current.principal, req.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Students, optionally narrowed by grade or program
#[utoipa::path(
    get,
    path = "/students",
    params(StudentQueryParams),
    responses(
        (status = 200, description = "Students", body = Vec<UserResponse>),
        (status = 403, description = "Only teachers and admins")
    ),
    security(("jwt" = [])),
    tag = "Users"
)]
pub async fn list_students(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<StudentQueryParams>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let students =
        UserService::list_students(&state.db, &current.principal, params.grade, params.program)
            .await?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

/// Change a student's grade or program
#[utoipa::path(
    patch,
    path = "/students/{id}/enrollment",
    params(("id" = Uuid, Path, description = "Student ID")),
    request_body = UpdateEnrollmentRequest,
    responses(
        (status = 200, description = "Enrollment updated", body = UserResponse),
        (status = 400, description = "Invalid grade or not a student"),
        (status = 403, description = "Only teachers and admins"),
        (status = 404, description = "Student not found")
    ),
    security(("jwt" = [])),
    tag = "Users"
)]
pub async fn update_enrollment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateEnrollmentRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let student = UserService::update_enrollment(
        &state.db,
        &current.principal,
        id,
        req.grade,
        req.program,
    )
    .await?;
    Ok(Json(student.into()))
}
