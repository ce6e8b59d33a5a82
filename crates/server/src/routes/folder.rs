use crate::{
    auth::CurrentUser,
    dtos::{
        common::{DeletionResponse, PaginationMeta, ShareRequest, ShareResponse},
        folder::{
            CreateFolderRequest, FolderQueryParams, FolderResponse, FolderSortParams,
            MoveFolderRequest, PaginatedFoldersResponse, UpdateFolderRequest,
        },
        material::{MaterialResponse, MaterialSortParams},
    },
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use database::{
    error::ServiceError,
    services::{OwnerScope, folder::FolderService, share::ShareService},
};
use models::access::ShareTarget;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_folders, create_folder))
        .routes(routes!(get_folder, update_folder, delete_folder))
        .routes(routes!(list_children))
        .routes(routes!(list_folder_materials))
        .routes(routes!(move_folder))
        .routes(routes!(list_folder_shares, share_folder))
        .routes(routes!(revoke_folder_share))
        .routes(routes!(get_breadcrumbs))
}

/// List folders visible to the caller
#[utoipa::path(
    get,
    path = "/folders",
    params(FolderQueryParams),
    responses(
        (status = 200, description = "Folders retrieved successfully", body = PaginatedFoldersResponse),
        (status = 400, description = "Invalid query parameters")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn list_folders(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<FolderQueryParams>,
) -> Result<Json<PaginatedFoldersResponse>, ApiError> {
    let pagination = params.pagination();
    let filter = params.into_filter(OwnerScope::default_for(&current.principal));

    let page =
        FolderService::list_folders(&state.db, &current.principal, filter, pagination).await?;
    let meta = PaginationMeta::from(&page);

    Ok(Json(PaginatedFoldersResponse {
        folders: page.items.into_iter().map(Into::into).collect(),
        pagination: meta,
    }))
}

/// Create a folder, optionally under a parent the caller owns
#[utoipa::path(
    post,
    path = "/folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = FolderResponse),
        (status = 400, description = "Invalid folder"),
        (status = 409, description = "A sibling folder has the same name"),
        (status = 422, description = "Parent folder is missing or not owned")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn create_folder(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>), ApiError> {
    let folder = FolderService::create_folder(&state.db, &current.principal, req.into()).await?;
    Ok((StatusCode::CREATED, Json(folder.into())))
}

/// Get a folder by ID
#[utoipa::path(
    get,
    path = "/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Folder found", body = FolderResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn get_folder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FolderResponse>, ApiError> {
    let folder = FolderService::get_folder(&state.db, &current.principal, id).await?;
    Ok(Json(folder.into()))
}

/// Update a folder; renaming repairs the paths of its descendants
#[utoipa::path(
    patch,
    path = "/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    request_body = UpdateFolderRequest,
    responses(
        (status = 200, description = "Folder updated", body = FolderResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found"),
        (status = 409, description = "A sibling folder has the same name")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn update_folder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let folder = FolderService::update_folder(&state.db, &current.principal, id, req.into()).await?;
    Ok(Json(folder.into()))
}

/// Delete a folder with every folder and material below it
#[utoipa::path(
    delete,
    path = "/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Folder tree deleted", body = DeletionResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn delete_folder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletionResponse>, ApiError> {
    let report = FolderService::delete_folder(
        &state.db,
        state.blob_store.as_ref(),
        &current.principal,
        id,
    )
    .await?;
    Ok(Json(report.into()))
}

/// List a folder's direct subfolders the caller can read
#[utoipa::path(
    get,
    path = "/folders/{id}/children",
    params(("id" = Uuid, Path, description = "Folder ID"), FolderSortParams),
    responses(
        (status = 200, description = "Subfolders retrieved successfully", body = Vec<FolderResponse>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn list_children(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiQuery(params): ApiQuery<FolderSortParams>,
) -> Result<Json<Vec<FolderResponse>>, ApiError> {
    let children = FolderService::list_children(
        &state.db,
        &current.principal,
        id,
        params.sort.unwrap_or_default(),
    )
    .await?;
    Ok(Json(children.into_iter().map(Into::into).collect()))
}

/// List the materials filed directly in a folder
#[utoipa::path(
    get,
    path = "/folders/{id}/materials",
    params(("id" = Uuid, Path, description = "Folder ID"), MaterialSortParams),
    responses(
        (status = 200, description = "Materials retrieved successfully", body = Vec<MaterialResponse>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn list_folder_materials(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiQuery(params): ApiQuery<MaterialSortParams>,
) -> Result<Json<Vec<MaterialResponse>>, ApiError> {
    let materials = FolderService::list_materials(
        &state.db,
        &current.principal,
        id,
        params.sort.unwrap_or_default(),
    )
    .await?;
    Ok(Json(materials.into_iter().map(Into::into).collect()))
}

/// Move a folder under a new parent, or to the root
#[utoipa::path(
    post,
    path = "/folders/{id}/move",
    params(("id" = Uuid, Path, description = "Folder ID")),
    request_body = MoveFolderRequest,
    responses(
        (status = 200, description = "Folder moved", body = FolderResponse),
        (status = 403, description = "Access denied"),
        (status = 409, description = "The move would create a cycle or a duplicate name"),
        (status = 422, description = "Target parent is missing or not owned")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn move_folder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<MoveFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let folder =
        FolderService::move_folder(&state.db, &current.principal, id, req.parent_id).await?;
    Ok(Json(folder.into()))
}

/// List the share grants on a folder
#[utoipa::path(
    get,
    path = "/folders/{id}/share",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Share grants", body = Vec<ShareResponse>),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn list_folder_shares(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ShareResponse>>, ApiError> {
    let grants =
        ShareService::list_grants(&state.db, &current.principal, ShareTarget::Folder, id).await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

/// Share a folder with users; sharing again replaces the permission
#[utoipa::path(
    post,
    path = "/folders/{id}/share",
    params(("id" = Uuid, Path, description = "Folder ID")),
    request_body = ShareRequest,
    responses(
        (status = 200, description = "Folder shared", body = Vec<ShareResponse>),
        (status = 400, description = "Unknown user"),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn share_folder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<ShareRequest>,
) -> Result<Json<Vec<ShareResponse>>, ApiError> {
    let grants = FolderService::share_folder(
        &state.db,
        &current.principal,
        id,
        &req.user_ids,
        req.permission,
    )
    .await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

/// Revoke a user's grant on a folder
#[utoipa::path(
    delete,
    path = "/folders/{id}/share/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Folder ID"),
        ("user_id" = Uuid, Path, description = "User whose grant is revoked")
    ),
    responses(
        (status = 204, description = "Grant revoked"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "No such grant")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn revoke_folder_share(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let revoked =
        ShareService::revoke(&state.db, &current.principal, ShareTarget::Folder, id, user_id)
            .await?;
    if !revoked {
        return Err(ServiceError::not_found("share", user_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Ancestors of a folder from the root down, the folder itself last
#[utoipa::path(
    get,
    path = "/folders/{id}/breadcrumbs",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Breadcrumb trail", body = Vec<FolderResponse>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("jwt" = [])),
    tag = "Folders"
)]
pub async fn get_breadcrumbs(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FolderResponse>>, ApiError> {
    let trail = FolderService::breadcrumbs(&state.db, &current.principal, id).await?;
    Ok(Json(trail.into_iter().map(Into::into).collect()))
}
