use crate::{
    access::{AccessTarget, Principal, authorize, can_access, ensure_author, ensure_owner},
    blob::BlobStore,
    entities::{folders, materials, shares},
    error::{ServiceError, ServiceResult},
    services::{
        DeletionReport, OwnerScope, Page, Pagination, eligibility_condition,
        material::{MaterialService, MaterialSort},
        optional_text, required_text,
        share::ShareService,
        validate_grade,
    },
};
use chrono::Utc;
use futures::Stream;
use log::{debug, info};
use models::{
    access::{Action, Permission, ShareTarget},
    course::Course,
    enrollment::Program,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub course: Course,
    pub grade: i16,
    pub program: Program,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_public: bool,
}

/// Partial update; `None` leaves a field untouched and `Some(None)` clears
/// the description
#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_public: Option<bool>,
    pub course: Option<Course>,
    pub grade: Option<i16>,
    pub program: Option<Program>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderSort {
    #[default]
    Newest,
    Oldest,
    Name,
}

#[derive(Debug, Clone, Default)]
pub struct FolderFilter {
    pub scope: OwnerScope,
    pub course: Option<Course>,
    pub grade: Option<i16>,
    pub program: Option<Program>,
    pub parent_id: Option<Uuid>,
    /// Only folders without a parent; ignored when `parent_id` is set
    pub roots_only: bool,
    pub sort: FolderSort,
}

pub struct FolderService;

impl FolderService {
    pub const DEFAULT_COLOR: &'static str = "#3B82F6";
    pub const DEFAULT_ICON: &'static str = "folder";
    const MAX_NAME_LEN: usize = 255;

    pub async fn create_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        folder: NewFolder,
    ) -> ServiceResult<folders::Model> {
        ensure_author(principal)?;
        let name = Self::validate_name(&folder.name)?;
        validate_grade(folder.grade)?;
        let color = match folder.color {
            Some(color) => Self::validate_color(&color)?,
            None => Self::DEFAULT_COLOR.to_owned(),
        };
        let icon = match folder.icon {
            Some(icon) => required_text("icon", &icon)?,
            None => Self::DEFAULT_ICON.to_owned(),
        };

        let parent = match folder.parent_id {
            Some(parent_id) => Some(Self::owned_parent(db, principal, parent_id).await?),
            None => None,
        };
        Self::ensure_unique_name(db, principal.id, folder.parent_id, &name, None).await?;

        let now = Utc::now();
        let created = folders::ActiveModel {
            id: Set(Uuid::new_v4()),
            path: Set(Self::child_path(parent.as_ref().map(|p| p.path.as_str()), &name)),
            name: Set(name),
            description: Set(optional_text(folder.description)),
            owner_id: Set(principal.id),
            course: Set(folder.course),
            grade: Set(folder.grade),
            program: Set(folder.program),
            parent_id: Set(folder.parent_id),
            color: Set(color),
            icon: Set(icon),
            is_public: Set(folder.is_public),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!("Created folder {} at {:?}", created.id, created.path);
        Ok(created)
    }

    /// Fetches a folder the principal may read
    pub async fn get_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<folders::Model> {
        let folder = Self::find(db, id).await?;
        let grant = ShareService::grant_for(db, ShareTarget::Folder, id, principal.id).await?;
        authorize(principal, &AccessTarget::folder(&folder, grant), Action::Read)?;
        Ok(folder)
    }

    /// Renames a folder and rewrites the cached paths of its whole subtree
    pub async fn rename_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        new_name: &str,
    ) -> ServiceResult<folders::Model> {
        Self::update_folder(
            db,
            principal,
            id,
            FolderPatch {
                name: Some(new_name.to_owned()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn update_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        patch: FolderPatch,
    ) -> ServiceResult<folders::Model> {
        let mut folder = Self::find(db, id).await?;
        ensure_owner(principal, folder.owner_id)?;

        let txn = db.begin().await?;

        if let Some(name) = patch.name {
            let name = Self::validate_name(&name)?;
            if name != folder.name {
                Self::ensure_unique_name(&txn, folder.owner_id, folder.parent_id, &name, Some(id))
                    .await?;
                let parent_path = Self::parent_path(&txn, folder.parent_id).await?;
                let parent_id = folder.parent_id;
                folder = Self::relocate(&txn, folder, name, parent_id, parent_path).await?;
            }
        }

        let mut model: folders::ActiveModel = folder.into();
        if let Some(description) = patch.description {
            model.description = Set(optional_text(description));
        }
        if let Some(color) = patch.color {
            model.color = Set(Self::validate_color(&color)?);
        }
        if let Some(icon) = patch.icon {
            model.icon = Set(required_text("icon", &icon)?);
        }
        if let Some(is_public) = patch.is_public {
            model.is_public = Set(is_public);
        }
        if let Some(course) = patch.course {
            model.course = Set(course);
        }
        if let Some(grade) = patch.grade {
            validate_grade(grade)?;
            model.grade = Set(grade);
        }
        if let Some(program) = patch.program {
            model.program = Set(program);
        }
        model.updated_at = Set(Utc::now());

        let updated = model.update(&txn).await?;
        txn.commit().await?;

        Ok(updated)
    }

    /// Moves a folder under a new parent (or to the root), refusing moves
    /// that would make a folder its own ancestor
    pub async fn move_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> ServiceResult<folders::Model> {
        let folder = Self::find(db, id).await?;
        ensure_owner(principal, folder.owner_id)?;

        if folder.parent_id == new_parent_id {
            return Ok(folder);
        }

        let txn = db.begin().await?;

        let parent_path = match new_parent_id {
            Some(parent_id) => {
                if parent_id == folder.id {
                    return Err(ServiceError::CyclicHierarchy);
                }
                let parent = Self::owned_parent(&txn, principal, parent_id).await?;
                if Self::ancestor_ids(&txn, parent.id).await?.contains(&folder.id) {
                    return Err(ServiceError::CyclicHierarchy);
                }
                Some(parent.path)
            }
            None => None,
        };

        Self::ensure_unique_name(&txn, folder.owner_id, new_parent_id, &folder.name, Some(id))
            .await?;

        let name = folder.name.clone();
        let moved = Self::relocate(&txn, folder, name, new_parent_id, parent_path).await?;
        txn.commit().await?;

        info!("Moved folder {} to {:?}", moved.id, moved.path);
        Ok(moved)
    }

    /// Deletes a folder, every folder below it and all materials they contain.
    ///
    /// The subtree is collected with an explicit worklist and removed deepest
    /// first. Stored files are released best-effort; failures are reported in
    /// the returned warnings and do not stop record deletion. Retrying after a
    /// partial failure is safe.
    pub async fn delete_folder(
        db: &DatabaseConnection,
        store: &dyn BlobStore,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<DeletionReport> {
        let root = Self::find(db, id).await?;
        ensure_owner(principal, root.owner_id)?;

        let subtree = Self::subtree_ids(db, root.id).await?;
        let mut report = DeletionReport::default();

        // Pre-order reversed: every folder comes after all of its descendants
        for folder_id in subtree.into_iter().rev() {
            let contained = materials::Entity::find()
                .filter(materials::Column::FolderId.eq(folder_id))
                .all(db)
                .await?;

            for material in &contained {
                let (deleted, warning) = MaterialService::purge(db, store, material).await?;
                if deleted {
                    report.materials_deleted += 1;
                }
                report.warnings.extend(warning);
            }

            ShareService::delete_all(db, ShareTarget::Folder, folder_id).await?;
            let result = folders::Entity::delete_by_id(folder_id).exec(db).await?;
            report.folders_deleted += result.rows_affected;

            debug!(
                "Deleted folder {folder_id} with {} material(s)",
                contained.len()
            );
        }

        info!(
            "Deleted folder {} ({} folders, {} materials, {} warnings)",
            root.id,
            report.folders_deleted,
            report.materials_deleted,
            report.warnings.len()
        );
        Ok(report)
    }

    pub async fn share_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        subjects: &[Uuid],
        permission: Permission,
    ) -> ServiceResult<Vec<shares::Model>> {
        ShareService::share(db, principal, ShareTarget::Folder, id, subjects, permission).await
    }

    /// Direct subfolders of a readable folder that the principal may also read
    pub async fn list_children(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        sort: FolderSort,
    ) -> ServiceResult<Vec<folders::Model>> {
        let parent = Self::get_folder(db, principal, id).await?;
        let children = Self::children_query(parent.id, sort).all(db).await?;
        Ok(Self::readable(db, principal, children).await?)
    }

    /// Materials directly inside a readable folder that the principal may read
    pub async fn list_materials(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        sort: MaterialSort,
    ) -> ServiceResult<Vec<materials::Model>> {
        let folder = Self::get_folder(db, principal, id).await?;
        let contained = MaterialService::folder_query(folder.id, sort).all(db).await?;
        Ok(MaterialService::readable(db, principal, contained).await?)
    }

    /// Unexecuted query for the direct subfolders of `parent_id`. It can be
    /// paged, streamed or re-run by the caller.
    pub fn children_query(parent_id: Uuid, sort: FolderSort) -> Select<folders::Entity> {
        Self::apply_sort(
            folders::Entity::find().filter(folders::Column::ParentId.eq(parent_id)),
            sort,
        )
    }

    /// Streams the direct subfolders of `parent_id` one row at a time.
    /// No access check is applied.
    pub async fn stream_children(
        db: &DatabaseConnection,
        parent_id: Uuid,
        sort: FolderSort,
    ) -> Result<impl Stream<Item = Result<folders::Model, DbErr>> + Send + '_, DbErr> {
        Self::children_query(parent_id, sort).stream(db).await
    }

    pub async fn list_folders(
        db: &DatabaseConnection,
        principal: &Principal,
        filter: FolderFilter,
        pagination: Pagination,
    ) -> ServiceResult<Page<folders::Model>> {
        pagination.validate()?;

        let mut condition =
            Condition::all().add(Self::scope_condition(db, principal, filter.scope).await?);

        if let Some(course) = filter.course {
            condition = condition.add(folders::Column::Course.eq(course));
        }
        if let Some(grade) = filter.grade {
            condition = condition.add(folders::Column::Grade.eq(grade));
        }
        if let Some(program) = filter.program {
            condition = condition.add(folders::Column::Program.eq(program));
        }
        if let Some(parent_id) = filter.parent_id {
            condition = condition.add(folders::Column::ParentId.eq(parent_id));
        } else if filter.roots_only {
            condition = condition.add(folders::Column::ParentId.is_null());
        }

        let query = Self::apply_sort(folders::Entity::find().filter(condition), filter.sort);

        let total_items = query.clone().count(db).await?;
        let items = query
            .paginate(db, pagination.per_page)
            .fetch_page(pagination.page - 1) // SeaORM uses 0-based pages
            .await?;

        Ok(Page::new(items, pagination, total_items))
    }

    /// Ancestor chain of a readable folder, from the root down to the folder
    pub async fn breadcrumbs(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<Vec<folders::Model>> {
        let folder = Self::get_folder(db, principal, id).await?;

        let mut chain = vec![folder];
        let mut seen = HashSet::from([id]);
        while let Some(parent_id) = chain.last().and_then(|f| f.parent_id) {
            if !seen.insert(parent_id) {
                break;
            }
            match folders::Entity::find_by_id(parent_id).one(db).await? {
                Some(parent) => chain.push(parent),
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    pub(crate) async fn find<C: ConnectionTrait>(db: &C, id: Uuid) -> ServiceResult<folders::Model> {
        folders::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("folder", id))
    }

    /// Keeps the folders the principal can read, batching the grant lookup
    pub(crate) async fn readable(
        db: &DatabaseConnection,
        principal: &Principal,
        candidates: Vec<folders::Model>,
    ) -> Result<Vec<folders::Model>, DbErr> {
        let ids = candidates.iter().map(|f| f.id).collect();
        let grants =
            ShareService::grants_for_user(db, ShareTarget::Folder, ids, principal.id).await?;

        Ok(candidates
            .into_iter()
            .filter(|f| {
                let target = AccessTarget::folder(f, grants.get(&f.id).copied());
                can_access(principal, &target, Action::Read)
            })
            .collect())
    }

    async fn scope_condition(
        db: &DatabaseConnection,
        principal: &Principal,
        scope: OwnerScope,
    ) -> Result<Condition, DbErr> {
        Ok(match scope {
            OwnerScope::Mine => Condition::all().add(folders::Column::OwnerId.eq(principal.id)),
            OwnerScope::Eligible => {
                let mut visible = Condition::any().add(folders::Column::IsPublic.eq(true));

                let shared = ShareService::shared_ids(db, ShareTarget::Folder, principal.id).await?;
                if !shared.is_empty() {
                    visible = visible.add(folders::Column::Id.is_in(shared));
                }
                if let Some(eligible) =
                    eligibility_condition(folders::Column::Grade, folders::Column::Program, principal)
                {
                    visible = visible.add(eligible);
                }
                visible
            }
        })
    }

    fn apply_sort(query: Select<folders::Entity>, sort: FolderSort) -> Select<folders::Entity> {
        match sort {
            FolderSort::Newest => query.order_by_desc(folders::Column::CreatedAt),
            FolderSort::Oldest => query.order_by_asc(folders::Column::CreatedAt),
            FolderSort::Name => query.order_by_asc(folders::Column::Name),
        }
    }

    fn validate_name(name: &str) -> ServiceResult<String> {
        let name = required_text("name", name)?;
        if name.contains('/') {
            return Err(ServiceError::validation("name", "must not contain '/'"));
        }
        if name.chars().count() > Self::MAX_NAME_LEN {
            return Err(ServiceError::validation(
                "name",
                format!("must be at most {} characters", Self::MAX_NAME_LEN),
            ));
        }
        Ok(name)
    }

    /// Accepts `#RRGGBB`
    fn validate_color(color: &str) -> ServiceResult<String> {
        let color = color.trim();
        let is_hex = color.len() == 7
            && color.starts_with('#')
            && color.chars().skip(1).all(|c| c.is_ascii_hexdigit());

        if is_hex {
            Ok(color.to_owned())
        } else {
            Err(ServiceError::validation("color", "expected #RRGGBB"))
        }
    }

    fn child_path(parent_path: Option<&str>, name: &str) -> String {
        match parent_path {
            Some(parent_path) => format!("{parent_path}/{name}"),
            None => name.to_owned(),
        }
    }

    async fn owned_parent<C: ConnectionTrait>(
        db: &C,
        principal: &Principal,
        parent_id: Uuid,
    ) -> ServiceResult<folders::Model> {
        match folders::Entity::find_by_id(parent_id).one(db).await? {
            Some(parent) if parent.owner_id == principal.id => Ok(parent),
            _ => Err(ServiceError::InvalidParent),
        }
    }

    async fn parent_path<C: ConnectionTrait>(
        db: &C,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Option<String>> {
        let Some(parent_id) = parent_id else {
            return Ok(None);
        };

        folders::Entity::find_by_id(parent_id)
            .select_only()
            .column(folders::Column::Path)
            .into_tuple::<String>()
            .one(db)
            .await?
            .map(Some)
            .ok_or(ServiceError::InvalidParent)
    }

    /// Sibling names are unique per owner and parent
    async fn ensure_unique_name<C: ConnectionTrait>(
        db: &C,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        exclude: Option<Uuid>,
    ) -> ServiceResult<()> {
        let mut query = folders::Entity::find()
            .filter(folders::Column::OwnerId.eq(owner_id))
            .filter(folders::Column::Name.eq(name));

        query = match parent_id {
            Some(parent_id) => query.filter(folders::Column::ParentId.eq(parent_id)),
            None => query.filter(folders::Column::ParentId.is_null()),
        };
        if let Some(exclude) = exclude {
            query = query.filter(folders::Column::Id.ne(exclude));
        }

        if query.count(db).await? > 0 {
            return Err(ServiceError::DuplicateName {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Ids of `id`'s ancestors, nearest first
    async fn ancestor_ids<C: ConnectionTrait>(db: &C, id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let mut ancestors = Vec::new();
        let mut current = id;

        loop {
            let parent = folders::Entity::find_by_id(current)
                .select_only()
                .column(folders::Column::ParentId)
                .into_tuple::<Option<Uuid>>()
                .one(db)
                .await?
                .flatten();

            match parent {
                Some(parent_id) if parent_id == id || ancestors.contains(&parent_id) => {
                    return Err(ServiceError::CyclicHierarchy);
                }
                Some(parent_id) => {
                    ancestors.push(parent_id);
                    current = parent_id;
                }
                None => return Ok(ancestors),
            }
        }
    }

    /// `id` and every folder below it, in pre-order
    async fn subtree_ids(db: &DatabaseConnection, id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let mut pending = vec![id];
        let mut seen = HashSet::new();
        let mut order = Vec::new();

        while let Some(folder_id) = pending.pop() {
            if !seen.insert(folder_id) {
                continue;
            }
            order.push(folder_id);

            let children = folders::Entity::find()
                .select_only()
                .column(folders::Column::Id)
                .filter(folders::Column::ParentId.eq(folder_id))
                .into_tuple::<Uuid>()
                .all(db)
                .await?;
            pending.extend(children);
        }

        Ok(order)
    }

    /// Saves a new name/parent for `folder` and recomputes the cached path of
    /// the folder and of every descendant
    async fn relocate<C: ConnectionTrait>(
        db: &C,
        folder: folders::Model,
        name: String,
        parent_id: Option<Uuid>,
        parent_path: Option<String>,
    ) -> ServiceResult<folders::Model> {
        let now = Utc::now();
        let path = Self::child_path(parent_path.as_deref(), &name);

        let mut model: folders::ActiveModel = folder.into();
        model.name = Set(name);
        model.parent_id = Set(parent_id);
        model.path = Set(path);
        model.updated_at = Set(now);
        let updated = model.update(db).await?;

        let mut pending = vec![(updated.id, updated.path.clone())];
        let mut seen = HashSet::from([updated.id]);
        let mut repaired = 0u64;

        while let Some((parent_id, parent_path)) = pending.pop() {
            let children = folders::Entity::find()
                .filter(folders::Column::ParentId.eq(parent_id))
                .all(db)
                .await?;

            for child in children {
                if !seen.insert(child.id) {
                    return Err(ServiceError::CyclicHierarchy);
                }

                let path = Self::child_path(Some(&parent_path), &child.name);
                if child.path != path {
                    let mut model: folders::ActiveModel = child.clone().into();
                    model.path = Set(path.clone());
                    model.updated_at = Set(now);
                    model.update(db).await?;
                    repaired += 1;
                }
                pending.push((child.id, path));
            }
        }

        debug!("Repaired {repaired} descendant path(s) of folder {}", updated.id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blob::{UploadPolicy, store_upload},
        services::material::NewMaterial,
        test_support::{FlakyBlobStore, db, student, teacher},
    };
    use futures::TryStreamExt;
    use models::material::{MaterialType, Priority};
    use rstest::rstest;

    fn folder(name: &str, parent_id: Option<Uuid>) -> NewFolder {
        NewFolder {
            name: name.to_string(),
            course: Course::Biochemistry,
            grade: 12,
            program: Program::Both,
            parent_id,
            description: None,
            color: None,
            icon: None,
            is_public: false,
        }
    }

    async fn create(
        db: &DatabaseConnection,
        owner: &Principal,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> folders::Model {
        FolderService::create_folder(db, owner, folder(name, parent_id))
            .await
            .unwrap()
    }

    async fn add_pdf(
        db: &DatabaseConnection,
        store: &FlakyBlobStore,
        owner: &Principal,
        folder_id: Uuid,
        title: &str,
    ) -> materials::Model {
        let file = store_upload(store, UploadPolicy::default(), owner.id, "doc.pdf", b"pdf")
            .await
            .unwrap();

        MaterialService::create(
            db,
            owner,
            NewMaterial {
                title: title.to_string(),
                description: None,
                material_type: MaterialType::Pdf,
                course: Course::Biochemistry,
                grade: 12,
                program: Program::Est,
                folder_id: Some(folder_id),
                file: Some(file),
                url: None,
                tags: vec![],
                is_public: false,
                due_date: None,
                priority: Priority::High,
            },
        )
        .await
        .unwrap()
    }

    async fn path_of(db: &DatabaseConnection, id: Uuid) -> String {
        FolderService::find(db, id).await.unwrap().path
    }

    #[rstest]
    #[tokio::test]
    async fn test_path_is_materialized_on_create(#[future] db: DatabaseConnection) {
        let db = db.await;
        let owner = Principal::from(&teacher(&db).await);

        let root = create(&db, &owner, "Lecture Materials", None).await;
        let week = create(&db, &owner, "Week 1", Some(root.id)).await;
        let day = create(&db, &owner, "  Monday ", Some(week.id)).await;

        assert_eq!(root.path, "Lecture Materials");
        assert_eq!(week.path, "Lecture Materials/Week 1");
        assert_eq!(day.name, "Monday");
        assert_eq!(day.path, "Lecture Materials/Week 1/Monday");
        assert_eq!(root.color, FolderService::DEFAULT_COLOR);
        assert_eq!(root.icon, FolderService::DEFAULT_ICON);
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_validation(#[future] db: DatabaseConnection) {
        let db = db.await;
        let owner = Principal::from(&teacher(&db).await);
        let other = Principal::from(&teacher(&db).await);
        let pupil = Principal::from(&student(&db, 12, Program::Est).await);

        let root = create(&db, &owner, "Unit 1", None).await;
        create(&db, &owner, "Labs", Some(root.id)).await;

        let duplicate =
            FolderService::create_folder(&db, &owner, folder("Labs", Some(root.id))).await;
        assert!(matches!(duplicate, Err(ServiceError::DuplicateName { .. })));

        // Same name is fine at another level or for another owner
        create(&db, &owner, "Labs", None).await;
        create(&db, &other, "Labs", None).await;

        let missing =
            FolderService::create_folder(&db, &owner, folder("X", Some(Uuid::new_v4()))).await;
        assert!(matches!(missing, Err(ServiceError::InvalidParent)));

        let foreign = FolderService::create_folder(&db, &other, folder("X", Some(root.id))).await;
        assert!(matches!(foreign, Err(ServiceError::InvalidParent)));

        let slash = FolderService::create_folder(&db, &owner, folder("a/b", None)).await;
        assert!(matches!(slash, Err(ServiceError::Validation { field: "name", .. })));

        let blank = FolderService::create_folder(&db, &owner, folder("  ", None)).await;
        assert!(matches!(blank, Err(ServiceError::Validation { field: "name", .. })));

        let bad_color = FolderService::create_folder(
            &db,
            &owner,
            NewFolder {
                color: Some("blue".to_string()),
                ..folder("Colored", None)
            },
        )
        .await;
        assert!(matches!(bad_color, Err(ServiceError::Validation { field: "color", .. })));

        let by_student = FolderService::create_folder(&db, &pupil, folder("Mine", None)).await;
        assert!(matches!(by_student, Err(ServiceError::AccessDenied)));
    }

    #[rstest]
    #[tokio::test]
    async fn test_rename_repairs_descendant_paths(#[future] db: DatabaseConnection) {
        let db = db.await;
        let owner = Principal::from(&teacher(&db).await);

        let root = create(&db, &owner, "Unit 1", None).await;
        let child = create(&db, &owner, "Labs", Some(root.id)).await;
        let grandchild = create(&db, &owner, "Week 2", Some(child.id)).await;
        create(&db, &owner, "Unit 2", None).await;

        let renamed = FolderService::rename_folder(&db, &owner, root.id, "Unit One")
            .await
            .unwrap();
        assert_eq!(renamed.path, "Unit One");
        assert_eq!(path_of(&db, child.id).await, "Unit One/Labs");
        assert_eq!(path_of(&db, grandchild.id).await, "Unit One/Labs/Week 2");

        let clash = FolderService::rename_folder(&db, &owner, root.id, "Unit 2").await;
        assert!(matches!(clash, Err(ServiceError::DuplicateName { .. })));
        assert_eq!(path_of(&db, child.id).await, "Unit One/Labs");

        // Renaming to the current name is not a clash with itself
        FolderService::rename_folder(&db, &owner, root.id, "Unit One")
            .await
            .unwrap();
    }

    #[rstest]
    #[tokio::test]
    async fn test_move_rejects_cycles(#[future] db: DatabaseConnection) {
        let db = db.await;
        let owner = Principal::from(&teacher(&db).await);

        let root = create(&db, &owner, "A", None).await;
        let child = create(&db, &owner, "B", Some(root.id)).await;
        let grandchild = create(&db, &owner, "C", Some(child.id)).await;

        let into_self = FolderService::move_folder(&db, &owner, root.id, Some(root.id)).await;
        assert!(matches!(into_self, Err(ServiceError::CyclicHierarchy)));

        let into_descendant =
            FolderService::move_folder(&db, &owner, root.id, Some(grandchild.id)).await;
        assert!(matches!(into_descendant, Err(ServiceError::CyclicHierarchy)));
        assert_eq!(path_of(&db, root.id).await, "A");

        let moved = FolderService::move_folder(&db, &owner, child.id, None)
            .await
            .unwrap();
        assert_eq!(moved.parent_id, None);
        assert_eq!(moved.path, "B");
        assert_eq!(path_of(&db, grandchild.id).await, "B/C");

        let back = FolderService::move_folder(&db, &owner, grandchild.id, Some(root.id))
            .await
            .unwrap();
        assert_eq!(back.path, "A/C");
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_removes_subtree_despite_blob_failures(#[future] db: DatabaseConnection) {
        let db = db.await;
        let store = FlakyBlobStore::failing_deletes(usize::MAX);
        let owner = Principal::from(&teacher(&db).await);
        let reader = student(&db, 12, Program::Est).await;

        let root = create(&db, &owner, "Course", None).await;
        let unit = create(&db, &owner, "Unit", Some(root.id)).await;
        let week = create(&db, &owner, "Week", Some(unit.id)).await;
        let sibling = create(&db, &owner, "Extra", Some(root.id)).await;
        let untouched = create(&db, &owner, "Elsewhere", None).await;

        add_pdf(&db, &store, &owner, root.id, "Syllabus").await;
        let shared = add_pdf(&db, &store, &owner, week.id, "Lab 1").await;
        add_pdf(&db, &store, &owner, week.id, "Lab 2").await;
        add_pdf(&db, &store, &owner, sibling.id, "Extra reading").await;
        let kept = add_pdf(&db, &store, &owner, untouched.id, "Keep me").await;

        MaterialService::share(&db, &owner, shared.id, &[reader.id], Permission::Read)
            .await
            .unwrap();
        FolderService::share_folder(&db, &owner, unit.id, &[reader.id], Permission::Write)
            .await
            .unwrap();

        let report = FolderService::delete_folder(&db, &store, &owner, root.id)
            .await
            .unwrap();
        assert_eq!(report.folders_deleted, 4);
        assert_eq!(report.materials_deleted, 4);
        assert_eq!(report.warnings.len(), 4);

        let subtree = [root.id, unit.id, week.id, sibling.id];
        let folders_left = folders::Entity::find()
            .filter(folders::Column::Id.is_in(subtree))
            .count(&db)
            .await
            .unwrap();
        let materials_left = materials::Entity::find()
            .filter(materials::Column::FolderId.is_in(subtree))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(folders_left, 0);
        assert_eq!(materials_left, 0);

        let grants_left = shares::Entity::find().count(&db).await.unwrap();
        assert_eq!(grants_left, 0);

        assert!(MaterialService::find(&db, kept.id).await.is_ok());
        assert!(FolderService::find(&db, untouched.id).await.is_ok());

        let retry = FolderService::delete_folder(&db, &store, &owner, root.id).await;
        assert!(matches!(retry, Err(ServiceError::NotFound { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_is_owner_only(#[future] db: DatabaseConnection) {
        let db = db.await;
        let store = FlakyBlobStore::new();
        let owner = Principal::from(&teacher(&db).await);
        let other = Principal::from(&teacher(&db).await);
        let root = create(&db, &owner, "Mine", None).await;

        let result = FolderService::delete_folder(&db, &store, &other, root.id).await;
        assert!(matches!(result, Err(ServiceError::AccessDenied)));

        let report = FolderService::delete_folder(&db, &store, &owner, root.id)
            .await
            .unwrap();
        assert_eq!(report.folders_deleted, 1);
        assert!(report.warnings.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_listings_respect_access(#[future] db: DatabaseConnection) {
        let db = db.await;
        let store = FlakyBlobStore::new();
        let owner = Principal::from(&teacher(&db).await);
        let eligible = Principal::from(&student(&db, 12, Program::Act).await);
        let outsider = Principal::from(&student(&db, 9, Program::Act).await);

        let root = FolderService::create_folder(
            &db,
            &owner,
            NewFolder {
                is_public: true,
                ..folder("Shared Space", None)
            },
        )
        .await
        .unwrap();
        FolderService::create_folder(
            &db,
            &owner,
            NewFolder {
                program: Program::Est,
                ..folder("b-open", Some(root.id))
            },
        )
        .await
        .unwrap();
        FolderService::create_folder(
            &db,
            &owner,
            NewFolder {
                grade: 11,
                program: Program::Est,
                ..folder("a-restricted", Some(root.id))
            },
        )
        .await
        .unwrap();
        add_pdf(&db, &store, &owner, root.id, "Notes").await;

        let names = |children: Vec<folders::Model>| {
            children.into_iter().map(|f| f.name).collect::<Vec<_>>()
        };

        let all = FolderService::list_children(&db, &owner, root.id, FolderSort::Name)
            .await
            .unwrap();
        assert_eq!(names(all), vec!["a-restricted", "b-open"]);

        let visible = FolderService::list_children(&db, &eligible, root.id, FolderSort::Name)
            .await
            .unwrap();
        assert_eq!(names(visible), vec!["b-open"]);

        // The public root is readable, its private children are not
        let none = FolderService::list_children(&db, &outsider, root.id, FolderSort::Name)
            .await
            .unwrap();
        assert!(none.is_empty());

        let notes = FolderService::list_materials(&db, &eligible, root.id, MaterialSort::Newest)
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        let hidden = FolderService::list_materials(&db, &outsider, root.id, MaterialSort::Newest)
            .await
            .unwrap();
        assert!(hidden.is_empty());

        // The unchecked stream sees every child and can be re-run
        for _ in 0..2 {
            let streamed: Vec<folders::Model> =
                FolderService::stream_children(&db, root.id, FolderSort::Name)
                    .await
                    .unwrap()
                    .try_collect()
                    .await
                    .unwrap();
            assert_eq!(names(streamed), vec!["a-restricted", "b-open"]);
        }

        let page = FolderService::list_folders(
            &db,
            &owner,
            FolderFilter {
                scope: OwnerScope::Mine,
                roots_only: true,
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
        assert_eq!(page.total_items, 1);

        let eligible_page = FolderService::list_folders(
            &db,
            &eligible,
            FolderFilter::default(),
            Pagination::default(),
        )
        .await
        .unwrap();
        assert_eq!(eligible_page.total_items, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn test_breadcrumbs_and_update(#[future] db: DatabaseConnection) {
        let db = db.await;
        let owner = Principal::from(&teacher(&db).await);

        let root = create(&db, &owner, "Root", None).await;
        let child = create(&db, &owner, "Child", Some(root.id)).await;
        let leaf = create(&db, &owner, "Leaf", Some(child.id)).await;

        let crumbs = FolderService::breadcrumbs(&db, &owner, leaf.id).await.unwrap();
        let ids: Vec<Uuid> = crumbs.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![root.id, child.id, leaf.id]);

        let updated = FolderService::update_folder(
            &db,
            &owner,
            child.id,
            FolderPatch {
                name: Some("Renamed".to_string()),
                description: Some(Some("Week notes".to_string())),
                color: Some("#10b981".to_string()),
                is_public: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.path, "Root/Renamed");
        assert_eq!(updated.description.as_deref(), Some("Week notes"));
        assert_eq!(updated.color, "#10b981");
        assert!(updated.is_public);
        assert_eq!(path_of(&db, leaf.id).await, "Root/Renamed/Leaf");

        let cleared = FolderService::update_folder(
            &db,
            &owner,
            child.id,
            FolderPatch {
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.color, "#10b981");
    }
}
