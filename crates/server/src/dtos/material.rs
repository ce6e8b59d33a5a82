use super::common::{PaginationMeta, default_page, default_per_page, deserialize_some};
use chrono::{DateTime, Utc};
use database::{
    blob::FileRef,
    entities::materials,
    services::{
        OwnerScope, Pagination,
        material::{MaterialFilter, MaterialPatch, MaterialSort, NewMaterial},
    },
};
use models::{
    course::Course,
    enrollment::Program,
    material::{MaterialType, Priority},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// A stored upload, as returned by `PUT /uploads` and attached to new materials
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileReference {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
}

impl From<FileRef> for FileReference {
    fn from(file: FileRef) -> Self {
        Self {
            name: file.name,
            path: file.path,
            size: file.size,
            mime_type: file.mime_type,
        }
    }
}

impl From<FileReference> for FileRef {
    fn from(file: FileReference) -> Self {
        Self {
            name: file.name,
            path: file.path,
            size: file.size,
            mime_type: file.mime_type,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadParams {
    /// Original file name; its extension decides whether the upload is accepted
    pub filename: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterialResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub material_type: MaterialType,
    pub owner_id: Uuid,
    #[schema(value_type = String)]
    pub course: Course,
    pub grade: i16,
    #[schema(value_type = String)]
    pub program: Program,
    pub folder_id: Option<Uuid>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub url: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
    #[schema(value_type = String)]
    pub priority: Priority,
    pub view_count: i32,
    pub download_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<materials::Model> for MaterialResponse {
    fn from(material: materials::Model) -> Self {
        Self {
            id: material.id,
            title: material.title,
            description: material.description,
            material_type: material.material_type,
            owner_id: material.owner_id,
            course: material.course,
            grade: material.grade,
            program: material.program,
            folder_id: material.folder_id,
            file_name: material.file_name,
            file_size: material.file_size,
            mime_type: material.mime_type,
            url: material.url,
            tags: material.tags.0,
            is_public: material.is_public,
            due_date: material.due_date,
            priority: material.priority,
            view_count: material.view_count,
            download_count: material.download_count,
            created_at: material.created_at,
            updated_at: material.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedMaterialsResponse {
    pub materials: Vec<MaterialResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMaterialRequest {
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub material_type: MaterialType,
    #[schema(value_type = String)]
    pub course: Course,
    pub grade: i16,
    #[schema(value_type = String)]
    pub program: Program,
    pub folder_id: Option<Uuid>,
    /// Required for every type except `link`
    pub file: Option<FileReference>,
    /// Required for `link`
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub priority: Priority,
}

impl From<CreateMaterialRequest> for NewMaterial {
    fn from(req: CreateMaterialRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            material_type: req.material_type,
            course: req.course,
            grade: req.grade,
            program: req.program,
            folder_id: req.folder_id,
            file: req.file.map(FileRef::from),
            url: req.url,
            tags: req.tags,
            is_public: req.is_public,
            due_date: req.due_date,
            priority: req.priority,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    /// `null` clears the due date
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[schema(value_type = Option<String>)]
    pub priority: Option<Priority>,
    /// `null` takes the material out of its folder
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<Uuid>)]
    pub folder_id: Option<Option<Uuid>>,
    #[schema(value_type = Option<String>)]
    pub course: Option<Course>,
    pub grade: Option<i16>,
    #[schema(value_type = Option<String>)]
    pub program: Option<Program>,
}

impl From<UpdateMaterialRequest> for MaterialPatch {
    fn from(req: UpdateMaterialRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            url: req.url,
            tags: req.tags,
            is_public: req.is_public,
            due_date: req.due_date,
            priority: req.priority,
            folder_id: req.folder_id,
            course: req.course,
            grade: req.grade,
            program: req.program,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MaterialQueryParams {
    #[serde(default = "default_page")]
    pub page: u64,

    #[serde(default = "default_per_page")]
    pub per_page: u64,

    #[param(value_type = Option<String>)]
    pub scope: Option<OwnerScope>,
    #[param(value_type = Option<String>)]
    pub course: Option<Course>,
    pub grade: Option<i16>,
    #[param(value_type = Option<String>)]
    pub program: Option<Program>,
    #[param(value_type = Option<String>)]
    pub material_type: Option<MaterialType>,
    pub folder_id: Option<Uuid>,
    /// Ranks results by relevance instead of `sort`
    pub search: Option<String>,
    /// `newest`, `oldest`, `title`, `most_viewed` or `most_downloaded`
    #[param(value_type = Option<String>)]
    pub sort: Option<MaterialSort>,
}

impl MaterialQueryParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }

    pub fn into_filter(self, default_scope: OwnerScope) -> MaterialFilter {
        MaterialFilter {
            scope: self.scope.unwrap_or(default_scope),
            course: self.course,
            grade: self.grade,
            program: self.program,
            material_type: self.material_type,
            folder_id: self.folder_id,
            search: self.search,
            sort: self.sort.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MaterialSortParams {
    #[param(value_type = Option<String>)]
    pub sort: Option<MaterialSort>,
}
