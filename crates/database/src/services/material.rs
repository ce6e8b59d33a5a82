use crate::{
    access::{AccessTarget, Principal, authorize, can_access, ensure_author, ensure_owner},
    blob::{BlobError, BlobStore, FileRef, release_blob},
    entities::{folders, materials, shares},
    error::{ServiceError, ServiceResult},
    services::{
        DeletionReport, OwnerScope, Page, Pagination, eligibility_condition, optional_text,
        required_text, share::ShareService, validate_grade,
    },
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use models::{
    access::{Action, Permission, ShareTarget},
    course::Course,
    enrollment::Program,
    material::{MaterialType, Priority},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub title: String,
    pub description: Option<String>,
    pub material_type: MaterialType,
    pub course: Course,
    pub grade: i16,
    pub program: Program,
    pub folder_id: Option<Uuid>,
    /// Required for every type except links
    pub file: Option<FileRef>,
    /// Required for links, forbidden otherwise
    pub url: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
}

/// Partial update. Outer `None` leaves a field untouched, `Some(None)`
/// clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct MaterialPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub folder_id: Option<Option<Uuid>>,
    pub course: Option<Course>,
    pub grade: Option<i16>,
    pub program: Option<Program>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialSort {
    #[default]
    Newest,
    Oldest,
    Title,
    MostViewed,
    MostDownloaded,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialFilter {
    pub scope: OwnerScope,
    pub course: Option<Course>,
    pub grade: Option<i16>,
    pub program: Option<Program>,
    pub material_type: Option<MaterialType>,
    pub folder_id: Option<Uuid>,
    /// Switches ordering to relevance, see [`relevance`]
    pub search: Option<String>,
    pub sort: MaterialSort,
}

/// A stored file handed out by [`MaterialService::download`]
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct MaterialService;

impl MaterialService {
    pub async fn create(
        db: &DatabaseConnection,
        principal: &Principal,
        material: NewMaterial,
    ) -> ServiceResult<materials::Model> {
        ensure_author(principal)?;
        let title = required_text("title", &material.title)?;
        validate_grade(material.grade)?;
        let (file, url) =
            Self::validate_source(principal, material.material_type, material.file, material.url)?;

        if let Some(folder_id) = material.folder_id {
            Self::ensure_folder(db, principal, folder_id).await?;
        }

        let now = Utc::now();
        let created = materials::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            description: Set(optional_text(material.description)),
            material_type: Set(material.material_type),
            owner_id: Set(principal.id),
            course: Set(material.course),
            grade: Set(material.grade),
            program: Set(material.program),
            folder_id: Set(material.folder_id),
            file_name: Set(file.as_ref().map(|f| f.name.clone())),
            file_path: Set(file.as_ref().map(|f| f.path.clone())),
            file_size: Set(file.as_ref().map(|f| f.size)),
            mime_type: Set(file.map(|f| f.mime_type)),
            url: Set(url),
            tags: Set(materials::Tags::normalized(material.tags)),
            is_public: Set(material.is_public),
            due_date: Set(material.due_date),
            priority: Set(material.priority),
            view_count: Set(0),
            download_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(
            "Created {} material {} for {}",
            created.material_type, created.id, principal.id
        );
        Ok(created)
    }

    /// Read-authorized fetch. Every successful call counts as one view.
    pub async fn get(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<materials::Model> {
        let material = Self::find(db, id).await?;
        Self::authorize_read(db, principal, &material).await?;

        Self::increment(db, id, materials::Column::ViewCount).await?;
        Self::find(db, id).await
    }

    pub async fn update(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        patch: MaterialPatch,
    ) -> ServiceResult<materials::Model> {
        let material = Self::find(db, id).await?;
        ensure_owner(principal, material.owner_id)?;

        if let Some(Some(folder_id)) = patch.folder_id {
            Self::ensure_folder(db, principal, folder_id).await?;
        }

        let is_link = material.material_type.is_link();
        let mut model: materials::ActiveModel = material.into();

        if let Some(title) = patch.title {
            model.title = Set(required_text("title", &title)?);
        }
        if let Some(description) = patch.description {
            model.description = Set(optional_text(description));
        }
        if let Some(url) = patch.url {
            if !is_link {
                return Err(ServiceError::validation("url", "only links carry a URL"));
            }
            model.url = Set(Some(Self::validate_url(&url)?));
        }
        if let Some(tags) = patch.tags {
            model.tags = Set(materials::Tags::normalized(tags));
        }
        if let Some(is_public) = patch.is_public {
            model.is_public = Set(is_public);
        }
        if let Some(due_date) = patch.due_date {
            model.due_date = Set(due_date);
        }
        if let Some(priority) = patch.priority {
            model.priority = Set(priority);
        }
        if let Some(folder_id) = patch.folder_id {
            model.folder_id = Set(folder_id);
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

        Ok(model.update(db).await?)
    }

    /// Deletes a material record. The stored file is released best-effort.
    pub async fn delete(
        db: &DatabaseConnection,
        store: &dyn BlobStore,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<DeletionReport> {
        let material = Self::find(db, id).await?;
        ensure_owner(principal, material.owner_id)?;

        let (deleted, warning) = Self::purge(db, store, &material).await?;
        if !deleted {
            return Err(ServiceError::not_found("material", id));
        }

        info!("Deleted material {id}");
        Ok(DeletionReport {
            folders_deleted: 0,
            materials_deleted: 1,
            warnings: warning.into_iter().collect(),
        })
    }

    pub async fn download(
        db: &DatabaseConnection,
        store: &dyn BlobStore,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<Download> {
        let material = Self::find(db, id).await?;
        Self::authorize_read(db, principal, &material).await?;

        let path = match (&material.file_path, material.material_type.is_link()) {
            (Some(path), false) => path,
            _ => return Err(ServiceError::NoFile),
        };

        let bytes = match store.get(path).await {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound(_)) => return Err(ServiceError::FileMissing),
            Err(e) => return Err(e.into()),
        };

        Self::increment(db, id, materials::Column::DownloadCount).await?;

        Ok(Download {
            file_name: material.file_name.unwrap_or_else(|| material.title.clone()),
            mime_type: material
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_owned()),
            bytes,
        })
    }

    pub async fn share(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
        subjects: &[Uuid],
        permission: Permission,
    ) -> ServiceResult<Vec<shares::Model>> {
        ShareService::share(db, principal, ShareTarget::Material, id, subjects, permission).await
    }

    /// Filtered, paged listing. A search term ranks by relevance (ties by
    /// recency); otherwise `filter.sort` applies.
    pub async fn list(
        db: &DatabaseConnection,
        principal: &Principal,
        filter: MaterialFilter,
        pagination: Pagination,
    ) -> ServiceResult<Page<materials::Model>> {
        pagination.validate()?;

        let condition = Self::filter_condition(db, principal, &filter).await?;
        let query = materials::Entity::find().filter(condition);
        let tokens = filter.search.as_deref().map(search_tokens).unwrap_or_default();

        if tokens.is_empty() {
            let query = Self::apply_sort(query, filter.sort);
            let total_items = query.clone().count(db).await?;
            let items = query
                .paginate(db, pagination.per_page)
                .fetch_page(pagination.page - 1)
                .await?;

            return Ok(Page::new(items, pagination, total_items));
        }

        let mut ranked: Vec<(u32, materials::Model)> = query
            .all(db)
            .await?
            .into_iter()
            .map(|m| (relevance(&m, &tokens), m))
            .filter(|(score, _)| *score > 0)
            .collect();
        ranked.sort_by_key(|(score, m)| (Reverse(*score), Reverse(m.created_at)));

        debug!("Search {tokens:?} matched {} material(s)", ranked.len());
        Ok(pagination.slice(ranked.into_iter().map(|(_, m)| m).collect()))
    }

    /// Unexecuted query for the materials directly inside a folder
    pub fn folder_query(folder_id: Uuid, sort: MaterialSort) -> Select<materials::Entity> {
        Self::apply_sort(
            materials::Entity::find().filter(materials::Column::FolderId.eq(folder_id)),
            sort,
        )
    }

    /// Keeps the materials the principal can read, batching the grant lookup
    pub async fn readable(
        db: &DatabaseConnection,
        principal: &Principal,
        candidates: Vec<materials::Model>,
    ) -> Result<Vec<materials::Model>, DbErr> {
        let ids = candidates.iter().map(|m| m.id).collect();
        let grants =
            ShareService::grants_for_user(db, ShareTarget::Material, ids, principal.id).await?;

        Ok(candidates
            .into_iter()
            .filter(|m| {
                let target = AccessTarget::material(m, grants.get(&m.id).copied());
                can_access(principal, &target, Action::Read)
            })
            .collect())
    }

    /// Releases the stored file, then removes the record and its grants.
    /// Returns whether the record still existed, plus the blob warning if the
    /// file could not be released.
    pub(crate) async fn purge(
        db: &DatabaseConnection,
        store: &dyn BlobStore,
        material: &materials::Model,
    ) -> Result<(bool, Option<String>), DbErr> {
        let warning = match &material.file_path {
            Some(path) => release_blob(store, path).await,
            None => None,
        };

        ShareService::delete_all(db, ShareTarget::Material, material.id).await?;
        let result = materials::Entity::delete_by_id(material.id).exec(db).await?;

        Ok((result.rows_affected > 0, warning))
    }

    pub(crate) async fn find(db: &DatabaseConnection, id: Uuid) -> ServiceResult<materials::Model> {
        materials::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("material", id))
    }

    async fn authorize_read(
        db: &DatabaseConnection,
        principal: &Principal,
        material: &materials::Model,
    ) -> ServiceResult<()> {
        let grant =
            ShareService::grant_for(db, ShareTarget::Material, material.id, principal.id).await?;
        authorize(principal, &AccessTarget::material(material, grant), Action::Read)
    }

    /// Single-statement `SET column = column + 1`
    async fn increment(
        db: &DatabaseConnection,
        id: Uuid,
        column: materials::Column,
    ) -> ServiceResult<()> {
        let result = materials::Entity::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(materials::Column::Id.eq(id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("material", id));
        }
        Ok(())
    }

    pub(crate) async fn filter_condition(
        db: &DatabaseConnection,
        principal: &Principal,
        filter: &MaterialFilter,
    ) -> ServiceResult<Condition> {
        let scope = match filter.scope {
            OwnerScope::Mine => Condition::all().add(materials::Column::OwnerId.eq(principal.id)),
            OwnerScope::Eligible => {
                let mut visible = Condition::any().add(materials::Column::IsPublic.eq(true));

                let shared =
                    ShareService::shared_ids(db, ShareTarget::Material, principal.id).await?;
                if !shared.is_empty() {
                    visible = visible.add(materials::Column::Id.is_in(shared));
                }
                if let Some(eligible) = eligibility_condition(
                    materials::Column::Grade,
                    materials::Column::Program,
                    principal,
                ) {
                    visible = visible.add(eligible);
                }
                visible
            }
        };

        let mut condition = Condition::all().add(scope);
        if let Some(course) = filter.course {
            condition = condition.add(materials::Column::Course.eq(course));
        }
        if let Some(grade) = filter.grade {
            condition = condition.add(materials::Column::Grade.eq(grade));
        }
        if let Some(program) = filter.program {
            condition = condition.add(materials::Column::Program.eq(program));
        }
        if let Some(material_type) = filter.material_type {
            condition = condition.add(materials::Column::MaterialType.eq(material_type));
        }
        if let Some(folder_id) = filter.folder_id {
            condition = condition.add(materials::Column::FolderId.eq(folder_id));
        }
        Ok(condition)
    }

    fn apply_sort(query: Select<materials::Entity>, sort: MaterialSort) -> Select<materials::Entity> {
        match sort {
            MaterialSort::Newest => query.order_by_desc(materials::Column::CreatedAt),
            MaterialSort::Oldest => query.order_by_asc(materials::Column::CreatedAt),
            MaterialSort::Title => query.order_by_asc(materials::Column::Title),
            MaterialSort::MostViewed => query
                .order_by_desc(materials::Column::ViewCount)
                .order_by_desc(materials::Column::CreatedAt),
            MaterialSort::MostDownloaded => query
                .order_by_desc(materials::Column::DownloadCount)
                .order_by_desc(materials::Column::CreatedAt),
        }
    }

    /// Links carry a URL and nothing else; every other type carries an
    /// upload made by the same owner
    fn validate_source(
        principal: &Principal,
        material_type: MaterialType,
        file: Option<FileRef>,
        url: Option<String>,
    ) -> ServiceResult<(Option<FileRef>, Option<String>)> {
        let url = optional_text(url);

        if material_type.is_link() {
            if file.is_some() {
                return Err(ServiceError::validation("file", "links cannot carry a file"));
            }
            let url = url.ok_or_else(|| ServiceError::validation("url", "required for links"))?;
            return Ok((None, Some(Self::validate_url(&url)?)));
        }

        if url.is_some() {
            return Err(ServiceError::validation("url", "only links carry a URL"));
        }
        let file = file.ok_or_else(|| {
            ServiceError::validation("file", format!("required for {material_type} materials"))
        })?;
        if !file.path.starts_with(&format!("{}/", principal.id)) {
            return Err(ServiceError::validation("file", "unknown upload"));
        }
        Ok((Some(file), None))
    }

    fn validate_url(url: &str) -> ServiceResult<String> {
        let invalid = || ServiceError::validation("url", "expected an http(s) URL");
        let url = Url::parse(url.trim()).map_err(|_| invalid())?;

        let has_host = url.host_str().is_some_and(|host| !host.is_empty());
        if matches!(url.scheme(), "http" | "https") && has_host {
            Ok(url.into())
        } else {
            Err(invalid())
        }
    }

    async fn ensure_folder(
        db: &DatabaseConnection,
        principal: &Principal,
        folder_id: Uuid,
    ) -> ServiceResult<()> {
        match folders::Entity::find_by_id(folder_id).one(db).await? {
            Some(folder) if folder.owner_id == principal.id => Ok(()),
            _ => Err(ServiceError::InvalidFolder),
        }
    }
}

/// Lowercased, deduplicated query tokens
fn search_tokens(search: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in search.split_whitespace().map(str::to_lowercase) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Per token: 3 for a title hit, 2 for a tag hit, 1 for a description hit
pub fn relevance(material: &materials::Model, tokens: &[String]) -> u32 {
    let title = material.title.to_lowercase();
    let description = material
        .description
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let tags: Vec<String> = material.tags.0.iter().map(|t| t.to_lowercase()).collect();

    tokens
        .iter()
        .map(|token| {
            let mut score = 0;
            if title.contains(token.as_str()) {
                score += 3;
            }
            if tags.iter().any(|t| t.contains(token.as_str())) {
                score += 2;
            }
            if description.contains(token.as_str()) {
                score += 1;
            }
            score
        })
        .sum()
}
