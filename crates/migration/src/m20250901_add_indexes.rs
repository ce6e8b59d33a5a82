use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Sibling lookups during create/rename and child listing
        manager
            .create_index(
                Index::create()
                    .name("idx_folders_owner_parent_name")
                    .table(Folders::Table)
                    .col(Folders::OwnerId)
                    .col(Folders::ParentId)
                    .col(Folders::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_folders_parent_id")
                    .table(Folders::Table)
                    .col(Folders::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_materials_folder_id")
                    .table(Materials::Table)
                    .col(Materials::FolderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_materials_owner_id")
                    .table(Materials::Table)
                    .col(Materials::OwnerId)
                    .to_owned(),
            )
            .await?;

        // Eligibility filtering for students
        manager
            .create_index(
                Index::create()
                    .name("idx_materials_course_grade_program")
                    .table(Materials::Table)
                    .col(Materials::Course)
                    .col(Materials::Grade)
                    .col(Materials::Program)
                    .to_owned(),
            )
            .await?;

        // At most one grant per (entity, user); upserts conflict on this key
        manager
            .create_index(
                Index::create()
                    .name("idx_shares_target_user")
                    .table(Shares::Table)
                    .col(Shares::Target)
                    .col(Shares::TargetId)
                    .col(Shares::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_owner_id")
                    .table(Sessions::Table)
                    .col(Sessions::OwnerId)
                    .to_owned(),
            )
            .await?;

        // A student is recorded at most once per session
        manager
            .create_index(
                Index::create()
                    .name("idx_session_attendees_session_student")
                    .table(SessionAttendees::Table)
                    .col(SessionAttendees::SessionId)
                    .col(SessionAttendees::StudentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_session_materials_session_material")
                    .table(SessionMaterials::Table)
                    .col(SessionMaterials::SessionId)
                    .col(SessionMaterials::MaterialId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_session_materials_session_material",
            "idx_session_attendees_session_student",
            "idx_sessions_owner_id",
            "idx_shares_target_user",
            "idx_materials_course_grade_program",
            "idx_materials_owner_id",
            "idx_materials_folder_id",
            "idx_folders_parent_id",
            "idx_folders_owner_parent_name",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(Iden)]
enum Folders {
    Table,
    OwnerId,
    ParentId,
    Name,
}

#[derive(Iden)]
enum Materials {
    Table,
    FolderId,
    OwnerId,
    Course,
    Grade,
    Program,
}

#[derive(Iden)]
enum Shares {
    Table,
    Target,
    TargetId,
    UserId,
}

#[derive(Iden)]
enum Sessions {
    Table,
    OwnerId,
}

#[derive(Iden)]
enum SessionAttendees {
    Table,
    SessionId,
    StudentId,
}

#[derive(Iden)]
enum SessionMaterials {
    Table,
    SessionId,
    MaterialId,
}
