use chrono::{DateTime, Utc};
use database::{entities::users, services::user::NewUser};
use models::enrollment::{Program, Role};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    #[schema(value_type = String)]
    pub role: Role,
    pub grade: Option<i16>,
    #[schema(value_type = Option<String>)]
    pub program: Option<Program>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            grade: user.grade,
            program: user.program,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Subject claim the identity provider issues for this user
    pub subject: String,
    pub name: String,
    pub email: Option<String>,
    #[schema(value_type = String)]
    pub role: Role,
    pub grade: Option<i16>,
    #[schema(value_type = Option<String>)]
    pub program: Option<Program>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            subject: req.subject,
            name: req.name,
            email: req.email,
            role: req.role,
            grade: req.grade,
            program: req.program,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEnrollmentRequest {
    pub grade: Option<i16>,
    #[schema(value_type = Option<String>)]
    pub program: Option<Program>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StudentQueryParams {
    pub grade: Option<i16>,
    #[param(value_type = Option<String>)]
    pub program: Option<Program>,
}
