use crate::{blob::BlobError, conferencing::ProviderError};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the services to their callers
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("access denied")]
    AccessDenied,

    #[error("a folder named {name:?} already exists here")]
    DuplicateName { name: String },

    #[error("a folder cannot be its own ancestor")]
    CyclicHierarchy,

    #[error("parent folder does not exist or is not owned by the caller")]
    InvalidParent,

    #[error("folder does not exist or is not owned by the caller")]
    InvalidFolder,

    #[error("material has no stored file")]
    NoFile,

    #[error("stored file is missing")]
    FileMissing,

    #[error("external service failed: {0}")]
    ExternalService(#[from] ProviderError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
