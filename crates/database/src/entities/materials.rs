use models::{
    course::Course,
    enrollment::Program,
    material::{MaterialType, Priority},
};
use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Free-form labels stored as a JSON array
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// Trims, drops empties and removes duplicates while keeping first-seen order
    pub fn normalized(tags: Vec<String>) -> Self {
        let mut out: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim();
            if !tag.is_empty() && !out.iter().any(|t| t == tag) {
                out.push(tag.to_owned());
            }
        }
        Tags(out)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub material_type: MaterialType,
    pub owner_id: Uuid,
    pub course: Course,
    pub grade: i16,
    pub program: Program,
    pub folder_id: Option<Uuid>,
    // Stored file; always absent for links
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,
    pub tags: Tags,
    pub is_public: bool,
    pub due_date: Option<DateTimeUtc>,
    pub priority: Priority,
    pub view_count: i32,
    pub download_count: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::folders::Entity",
        from = "Column::FolderId",
        to = "super::folders::Column::Id"
    )]
    Folder,
    #[sea_orm(has_many = "super::session_materials::Entity")]
    SessionMaterials,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::folders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Folder.def()
    }
}

impl Related<super::session_materials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SessionMaterials.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
