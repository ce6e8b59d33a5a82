use crate::{
    access::{Principal, ensure_owner},
    entities::{folders, materials, shares, users},
    error::{ServiceError, ServiceResult},
};
use chrono::Utc;
use log::info;
use models::access::{Permission, ShareTarget};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::OnConflict,
};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

pub struct ShareService;

impl ShareService {
    /// Grants `permission` on a folder or material to each subject. Existing
    /// grants are updated in place, so there is never more than one grant per
    /// (entity, user).
    pub async fn share(
        db: &DatabaseConnection,
        principal: &Principal,
        target: ShareTarget,
        target_id: Uuid,
        subjects: &[Uuid],
        permission: Permission,
    ) -> ServiceResult<Vec<shares::Model>> {
        let owner_id = Self::owner_of(db, target, target_id).await?;
        ensure_owner(principal, owner_id)?;

        let subjects: Vec<Uuid> = subjects
            .iter()
            .copied()
            .filter(|id| *id != owner_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if subjects.is_empty() {
            return Err(ServiceError::validation(
                "subjects",
                "at least one user other than the owner is required",
            ));
        }

        let known = users::Entity::find()
            .filter(users::Column::Id.is_in(subjects.clone()))
            .count(db)
            .await?;
        if known != subjects.len() as u64 {
            return Err(ServiceError::validation("subjects", "unknown user"));
        }

        let now = Utc::now();
        for user_id in &subjects {
            let grant = shares::ActiveModel {
                id: Set(Uuid::new_v4()),
                target: Set(target),
                target_id: Set(target_id),
                user_id: Set(*user_id),
                permission: Set(permission),
                created_at: Set(now),
                updated_at: Set(now),
            };

            shares::Entity::insert(grant)
                .on_conflict(
                    OnConflict::columns([
                        shares::Column::Target,
                        shares::Column::TargetId,
                        shares::Column::UserId,
                    ])
                    .update_columns([shares::Column::Permission, shares::Column::UpdatedAt])
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }

        info!(
            "{} shared {target:?} {target_id} with {} user(s) at {permission:?}",
            principal.id,
            subjects.len()
        );

        Ok(shares::Entity::find()
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::TargetId.eq(target_id))
            .filter(shares::Column::UserId.is_in(subjects))
            .all(db)
            .await?)
    }

    /// Grants on an entity, for its owner
    pub async fn list_grants(
        db: &DatabaseConnection,
        principal: &Principal,
        target: ShareTarget,
        target_id: Uuid,
    ) -> ServiceResult<Vec<shares::Model>> {
        let owner_id = Self::owner_of(db, target, target_id).await?;
        ensure_owner(principal, owner_id)?;

        Ok(shares::Entity::find()
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::TargetId.eq(target_id))
            .order_by_asc(shares::Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Removes a user's grant. Returns whether a grant existed.
    pub async fn revoke(
        db: &DatabaseConnection,
        principal: &Principal,
        target: ShareTarget,
        target_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<bool> {
        let owner_id = Self::owner_of(db, target, target_id).await?;
        ensure_owner(principal, owner_id)?;

        let result = shares::Entity::delete_many()
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::TargetId.eq(target_id))
            .filter(shares::Column::UserId.eq(user_id))
            .exec(db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// The permission `user_id` holds on an entity, if any
    pub async fn grant_for<C: ConnectionTrait>(
        db: &C,
        target: ShareTarget,
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Permission>, DbErr> {
        shares::Entity::find()
            .select_only()
            .column(shares::Column::Permission)
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::TargetId.eq(target_id))
            .filter(shares::Column::UserId.eq(user_id))
            .into_tuple::<Permission>()
            .one(db)
            .await
    }

    /// Grants held by `user_id` on any of `target_ids`
    pub async fn grants_for_user<C: ConnectionTrait>(
        db: &C,
        target: ShareTarget,
        target_ids: Vec<Uuid>,
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, Permission>, DbErr> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let grants = shares::Entity::find()
            .select_only()
            .column(shares::Column::TargetId)
            .column(shares::Column::Permission)
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::TargetId.is_in(target_ids))
            .filter(shares::Column::UserId.eq(user_id))
            .into_tuple::<(Uuid, Permission)>()
            .all(db)
            .await?;

        Ok(grants.into_iter().collect())
    }

    /// Ids of every entity of this kind shared with `user_id`
    pub async fn shared_ids<C: ConnectionTrait>(
        db: &C,
        target: ShareTarget,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, DbErr> {
        shares::Entity::find()
            .select_only()
            .column(shares::Column::TargetId)
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::UserId.eq(user_id))
            .into_tuple::<Uuid>()
            .all(db)
            .await
    }

    /// Drops every grant attached to an entity that is being deleted
    pub async fn delete_all<C: ConnectionTrait>(
        db: &C,
        target: ShareTarget,
        target_id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = shares::Entity::delete_many()
            .filter(shares::Column::Target.eq(target))
            .filter(shares::Column::TargetId.eq(target_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn owner_of(
        db: &DatabaseConnection,
        target: ShareTarget,
        target_id: Uuid,
    ) -> ServiceResult<Uuid> {
        let owner = match target {
            ShareTarget::Folder => folders::Entity::find_by_id(target_id)
                .select_only()
                .column(folders::Column::OwnerId)
                .into_tuple::<Uuid>()
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("folder", target_id))?,
            ShareTarget::Material => materials::Entity::find_by_id(target_id)
                .select_only()
                .column(materials::Column::OwnerId)
                .into_tuple::<Uuid>()
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("material", target_id))?,
        };
        Ok(owner)
    }
}
