use crate::{dtos::course::CourseResponse, state::AppState};
use axum::Json;
use models::course::Course;
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_courses))
}

/// The fixed course catalog
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "Course catalog", body = Vec<CourseResponse>)
    ),
    tag = "Courses"
)]
pub async fn get_courses() -> Json<Vec<CourseResponse>> {
    Json(Course::all().into_iter().map(Into::into).collect())
}
