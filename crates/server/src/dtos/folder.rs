use super::common::{PaginationMeta, default_page, default_per_page, deserialize_some};
use chrono::{DateTime, Utc};
use database::{
    entities::folders,
    services::{
        OwnerScope, Pagination,
        folder::{FolderFilter, FolderPatch, FolderSort, NewFolder},
    },
};
use models::{course::Course, enrollment::Program};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct FolderResponse {
    pub id: Uuid,
    pub name: String,
    /// Slash-joined names from the root down to this folder
    pub path: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    #[schema(value_type = String)]
    pub course: Course,
    pub grade: i16,
    #[schema(value_type = String)]
    pub program: Program,
    pub parent_id: Option<Uuid>,
    pub color: String,
    pub icon: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<folders::Model> for FolderResponse {
    fn from(folder: folders::Model) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            path: folder.path,
            description: folder.description,
            owner_id: folder.owner_id,
            course: folder.course,
            grade: folder.grade,
            program: folder.program,
            parent_id: folder.parent_id,
            color: folder.color,
            icon: folder.icon,
            is_public: folder.is_public,
            created_at: folder.created_at,
            updated_at: folder.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedFoldersResponse {
    pub folders: Vec<FolderResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    pub name: String,
    #[schema(value_type = String)]
    pub course: Course,
    pub grade: i16,
    #[schema(value_type = String)]
    pub program: Program,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl From<CreateFolderRequest> for NewFolder {
    fn from(req: CreateFolderRequest) -> Self {
        Self {
            name: req.name,
            course: req.course,
            grade: req.grade,
            program: req.program,
            parent_id: req.parent_id,
            description: req.description,
            color: req.color,
            icon: req.icon,
            is_public: req.is_public,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFolderRequest {
    pub name: Option<String>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_public: Option<bool>,
    #[schema(value_type = Option<String>)]
    pub course: Option<Course>,
    pub grade: Option<i16>,
    #[schema(value_type = Option<String>)]
    pub program: Option<Program>,
}

impl From<UpdateFolderRequest> for FolderPatch {
    fn from(req: UpdateFolderRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            color: req.color,
            icon: req.icon,
            is_public: req.is_public,
            course: req.course,
            grade: req.grade,
            program: req.program,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveFolderRequest {
    /// `null` moves the folder to the root
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FolderQueryParams {
    #[serde(default = "default_page")]
    pub page: u64,

    #[serde(default = "default_per_page")]
    pub per_page: u64,

    /// `mine` or `eligible`; defaults by role
    #[param(value_type = Option<String>)]
    pub scope: Option<OwnerScope>,
    #[param(value_type = Option<String>)]
    pub course: Option<Course>,
    pub grade: Option<i16>,
    #[param(value_type = Option<String>)]
    pub program: Option<Program>,
    pub parent_id: Option<Uuid>,
    /// Only folders without a parent
    #[serde(default)]
    pub roots_only: bool,
    /// `newest`, `oldest` or `name`
    #[param(value_type = Option<String>)]
    pub sort: Option<FolderSort>,
}

impl FolderQueryParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }

    pub fn into_filter(self, default_scope: OwnerScope) -> FolderFilter {
        FolderFilter {
            scope: self.scope.unwrap_or(default_scope),
            course: self.course,
            grade: self.grade,
            program: self.program,
            parent_id: self.parent_id,
            roots_only: self.roots_only,
            sort: self.sort.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FolderSortParams {
    #[param(value_type = Option<String>)]
    pub sort: Option<FolderSort>,
}
