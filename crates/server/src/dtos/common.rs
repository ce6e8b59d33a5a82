use chrono::{DateTime, Utc};
use database::{
    entities::shares,
    services::{DeletionReport, Page},
};
use models::access::Permission;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<&Page<T>> for PaginationMeta {
    fn from(page: &Page<T>) -> Self {
        Self {
            page: page.page,
            per_page: page.per_page,
            total_pages: page.total_pages,
            total_items: page.total_items,
            has_next: page.page < page.total_pages,
            has_prev: page.page > 1,
        }
    }
}

pub fn default_page() -> u64 {
    1
}

pub fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletionResponse {
    pub folders_deleted: u64,
    pub materials_deleted: u64,
    /// Files that could not be removed from storage
    pub warnings: Vec<String>,
}

impl From<DeletionReport> for DeletionResponse {
    fn from(report: DeletionReport) -> Self {
        Self {
            folders_deleted: report.folders_deleted,
            materials_deleted: report.materials_deleted,
            warnings: report.warnings,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShareRequest {
    pub user_ids: Vec<Uuid>,
    /// One of `read`, `write` or `admin`
    #[schema(value_type = String)]
    pub permission: Permission,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String)]
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<shares::Model> for ShareResponse {
    fn from(share: shares::Model) -> Self {
        Self {
            id: share.id,
            user_id: share.user_id,
            permission: share.permission,
            created_at: share.created_at,
            updated_at: share.updated_at,
        }
    }
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`,
/// `null` becomes `Some(None)`
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_absent_and_null_fields() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);

        let null: Patch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(null.description, Some(None));

        let set: Patch = serde_json::from_str(r#"{"description": "x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }

    #[test]
    fn test_pagination_meta() {
        let page = Page {
            items: vec![1, 2],
            page: 2,
            per_page: 2,
            total_items: 5,
            total_pages: 3,
        };
        let meta = PaginationMeta::from(&page);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }
}
