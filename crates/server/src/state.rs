use database::{blob::BlobStore, blob::UploadPolicy, conferencing::ConferencingProvider};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub blob_store: Arc<dyn BlobStore>,
    pub provider: Arc<dyn ConferencingProvider>,
    pub upload_policy: UploadPolicy,
    pub admin_subjects: Arc<[String]>,
}
