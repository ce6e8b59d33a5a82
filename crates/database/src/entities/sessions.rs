use models::{
    course::Course,
    enrollment::Program,
    session::{MeetingKind, SessionStatus},
};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub course: Course,
    pub grade: i16,
    pub program: Program,
    pub owner_id: Uuid,
    pub external_id: String,
    #[sea_orm(column_type = "Text")]
    pub join_url: String,
    #[sea_orm(column_type = "Text")]
    pub start_url: String,
    pub password: Option<String>,
    pub meeting_kind: MeetingKind,
    #[sea_orm(column_type = "Text", nullable)]
    pub placeholder_reason: Option<String>,
    pub scheduled_at: DateTimeUtc,
    pub duration_minutes: i32,
    pub status: SessionStatus,
    pub open_enrollment: bool,
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
    #[sea_orm(has_many = "super::session_attendees::Entity")]
    Attendees,
    #[sea_orm(has_many = "super::session_materials::Entity")]
    SessionMaterials,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::session_attendees::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendees.def()
    }
}

impl Related<super::session_materials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SessionMaterials.def()
    }
}

// Many-to-many relationship with materials
impl Related<super::materials::Entity> for Entity {
    fn to() -> RelationDef {
        super::session_materials::Relation::Material.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::session_materials::Relation::Session.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
