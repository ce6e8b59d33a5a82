use models::course::Course;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseResponse {
    pub name: String,
    pub color: String,
    pub icon: String,
    pub description: String,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            name: course.name(),
            color: course.color().to_string(),
            icon: course.icon().to_string(),
            description: course.description().to_string(),
        }
    }
}
