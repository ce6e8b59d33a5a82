use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::error::ServiceError;
use log::error;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("no account is registered for this identity")]
    NotRegistered,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<DbErr> for ApiError {
    fn from(e: DbErr) -> Self {
        Self::Service(ServiceError::Database(e))
    }
}

/// JSON body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable error kind
    pub error: &'static str,
    pub message: String,
    /// The offending input field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotRegistered => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(e) => match e {
                ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
                ServiceError::NotFound { .. } | ServiceError::FileMissing => StatusCode::NOT_FOUND,
                ServiceError::AccessDenied => StatusCode::FORBIDDEN,
                ServiceError::DuplicateName { .. } | ServiceError::CyclicHierarchy => {
                    StatusCode::CONFLICT
                }
                ServiceError::InvalidParent
                | ServiceError::InvalidFolder
                | ServiceError::NoFile => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Blob(_) | ServiceError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotRegistered => "not_registered",
            Self::BadRequest(_) => "bad_request",
            Self::Service(e) => match e {
                ServiceError::Validation { .. } => "validation",
                ServiceError::NotFound { .. } => "not_found",
                ServiceError::AccessDenied => "access_denied",
                ServiceError::DuplicateName { .. } => "duplicate_name",
                ServiceError::CyclicHierarchy => "cyclic_hierarchy",
                ServiceError::InvalidParent => "invalid_parent",
                ServiceError::InvalidFolder => "invalid_folder",
                ServiceError::NoFile => "no_file",
                ServiceError::FileMissing => "file_missing",
                ServiceError::ExternalService(_) => "external_service",
                ServiceError::Blob(_) | ServiceError::Database(_) => "internal",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage and database details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        let field = match &self {
            Self::Service(ServiceError::Validation { field, .. }) => Some(*field),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.kind(),
            message,
            field,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (ServiceError::validation("name", "empty"), StatusCode::BAD_REQUEST),
            (ServiceError::not_found("folder", Uuid::nil()), StatusCode::NOT_FOUND),
            (ServiceError::AccessDenied, StatusCode::FORBIDDEN),
            (
                ServiceError::DuplicateName {
                    name: "Unit 1".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (ServiceError::CyclicHierarchy, StatusCode::CONFLICT),
            (ServiceError::InvalidParent, StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::InvalidFolder, StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::NoFile, StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::FileMissing, StatusCode::NOT_FOUND),
            (
                ServiceError::Database(DbErr::Custom("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotRegistered.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let response =
            ApiError::from(DbErr::Custom("password=hunter2".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let validation = ApiError::from(ServiceError::validation("grade", "out of range"));
        assert_eq!(validation.kind(), "validation");
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
