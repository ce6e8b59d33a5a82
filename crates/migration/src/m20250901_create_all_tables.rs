use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Users::Subject)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Email).string())
                    .col(ColumnDef::new(Users::Role).text().not_null())
                    .col(ColumnDef::new(Users::Grade).small_integer())
                    .col(ColumnDef::new(Users::Program).text())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Create folders table (self-referencing through parent_id)
        manager
            .create_table(
                Table::create()
                    .table(Folders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Folders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Folders::Name).string().not_null())
                    .col(ColumnDef::new(Folders::Path).text().not_null())
                    .col(ColumnDef::new(Folders::Description).text())
                    .col(ColumnDef::new(Folders::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Folders::Course).text().not_null())
                    .col(ColumnDef::new(Folders::Grade).small_integer().not_null())
                    .col(ColumnDef::new(Folders::Program).text().not_null())
                    .col(ColumnDef::new(Folders::ParentId).uuid())
                    .col(ColumnDef::new(Folders::Color).string().not_null())
                    .col(ColumnDef::new(Folders::Icon).string().not_null())
                    .col(
                        ColumnDef::new(Folders::IsPublic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Folders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Folders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-folders-owner_id")
                            .from(Folders::Table, Folders::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    // Subtrees are deleted child-first by the folder service
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-folders-parent_id")
                            .from(Folders::Table, Folders::ParentId)
                            .to(Folders::Table, Folders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Create materials table
        manager
            .create_table(
                Table::create()
                    .table(Materials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Materials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Materials::Title).string().not_null())
                    .col(ColumnDef::new(Materials::Description).text())
                    .col(ColumnDef::new(Materials::MaterialType).text().not_null())
                    .col(ColumnDef::new(Materials::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Materials::Course).text().not_null())
                    .col(ColumnDef::new(Materials::Grade).small_integer().not_null())
                    .col(ColumnDef::new(Materials::Program).text().not_null())
                    .col(ColumnDef::new(Materials::FolderId).uuid())
                    .col(ColumnDef::new(Materials::FileName).string())
                    .col(ColumnDef::new(Materials::FilePath).string())
                    .col(ColumnDef::new(Materials::FileSize).big_integer())
                    .col(ColumnDef::new(Materials::MimeType).string())
                    .col(ColumnDef::new(Materials::Url).text())
                    .col(ColumnDef::new(Materials::Tags).json().not_null())
                    .col(
                        ColumnDef::new(Materials::IsPublic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Materials::DueDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Materials::Priority).text().not_null())
                    .col(
                        ColumnDef::new(Materials::ViewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Materials::DownloadCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Materials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Materials::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-materials-owner_id")
                            .from(Materials::Table, Materials::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-materials-folder_id")
                            .from(Materials::Table, Materials::FolderId)
                            .to(Folders::Table, Folders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Create shares table; a grant points at either a folder or a material
        manager
            .create_table(
                Table::create()
                    .table(Shares::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Shares::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Shares::Target).text().not_null())
                    .col(ColumnDef::new(Shares::TargetId).uuid().not_null())
                    .col(ColumnDef::new(Shares::UserId).uuid().not_null())
                    .col(ColumnDef::new(Shares::Permission).text().not_null())
                    .col(
                        ColumnDef::new(Shares::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shares::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-shares-user_id")
                            .from(Shares::Table, Shares::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create sessions table
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::Title).string().not_null())
                    .col(ColumnDef::new(Sessions::Description).text())
                    .col(ColumnDef::new(Sessions::Course).text().not_null())
                    .col(ColumnDef::new(Sessions::Grade).small_integer().not_null())
                    .col(ColumnDef::new(Sessions::Program).text().not_null())
                    .col(ColumnDef::new(Sessions::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Sessions::ExternalId).string().not_null())
                    .col(ColumnDef::new(Sessions::JoinUrl).text().not_null())
                    .col(ColumnDef::new(Sessions::StartUrl).text().not_null())
                    .col(ColumnDef::new(Sessions::Password).string())
                    .col(ColumnDef::new(Sessions::MeetingKind).text().not_null())
                    .col(ColumnDef::new(Sessions::PlaceholderReason).text())
                    .col(
                        ColumnDef::new(Sessions::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::DurationMinutes)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sessions::Status).text().not_null())
                    .col(
                        ColumnDef::new(Sessions::OpenEnrollment)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sessions-owner_id")
                            .from(Sessions::Table, Sessions::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create session_attendees junction table (many-to-many)
        manager
            .create_table(
                Table::create()
                    .table(SessionAttendees::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionAttendees::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessionAttendees::SessionId).uuid().not_null())
                    .col(ColumnDef::new(SessionAttendees::StudentId).uuid().not_null())
                    .col(
                        ColumnDef::new(SessionAttendees::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-session_attendees-session_id")
                            .from(SessionAttendees::Table, SessionAttendees::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-session_attendees-student_id")
                            .from(SessionAttendees::Table, SessionAttendees::StudentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create session_materials junction table (many-to-many)
        manager
            .create_table(
                Table::create()
                    .table(SessionMaterials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessionMaterials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessionMaterials::SessionId).uuid().not_null())
                    .col(ColumnDef::new(SessionMaterials::MaterialId).uuid().not_null())
                    .col(
                        ColumnDef::new(SessionMaterials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-session_materials-session_id")
                            .from(SessionMaterials::Table, SessionMaterials::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-session_materials-material_id")
                            .from(SessionMaterials::Table, SessionMaterials::MaterialId)
                            .to(Materials::Table, Materials::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order due to foreign key constraints
        manager
            .drop_table(Table::drop().table(SessionMaterials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SessionAttendees::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Shares::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Materials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Folders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Subject,
    Name,
    Email,
    Role,
    Grade,
    Program,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Folders {
    Table,
    Id,
    Name,
    Path,
    Description,
    OwnerId,
    Course,
    Grade,
    Program,
    ParentId,
    Color,
    Icon,
    IsPublic,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Materials {
    Table,
    Id,
    Title,
    Description,
    MaterialType,
    OwnerId,
    Course,
    Grade,
    Program,
    FolderId,
    FileName,
    FilePath,
    FileSize,
    MimeType,
    Url,
    Tags,
    IsPublic,
    DueDate,
    Priority,
    ViewCount,
    DownloadCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Shares {
    Table,
    Id,
    Target,
    TargetId,
    UserId,
    Permission,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Sessions {
    Table,
    Id,
    Title,
    Description,
    Course,
    Grade,
    Program,
    OwnerId,
    ExternalId,
    JoinUrl,
    StartUrl,
    Password,
    MeetingKind,
    PlaceholderReason,
    ScheduledAt,
    DurationMinutes,
    Status,
    OpenEnrollment,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum SessionAttendees {
    Table,
    Id,
    SessionId,
    StudentId,
    JoinedAt,
}

#[derive(Iden)]
enum SessionMaterials {
    Table,
    Id,
    SessionId,
    MaterialId,
    CreatedAt,
}
