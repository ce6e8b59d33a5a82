use crate::{
    auth::CurrentUser,
    dtos::{
        common::{DeletionResponse, PaginationMeta, ShareRequest, ShareResponse},
        material::{
            CreateMaterialRequest, FileReference, MaterialQueryParams, MaterialResponse,
            PaginatedMaterialsResponse, UpdateMaterialRequest, UploadParams,
        },
    },
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use database::{
    access::ensure_author,
    blob::store_upload,
    error::ServiceError,
    services::{OwnerScope, material::MaterialService, share::ShareService},
};
use models::access::ShareTarget;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_materials, create_material))
        .routes(routes!(get_material, update_material, delete_material))
        .routes(routes!(download_material))
        .routes(routes!(list_material_shares, share_material))
        .routes(routes!(revoke_material_share))
        .routes(routes!(upload_file))
}

/// Search and list materials visible to the caller
#[utoipa::path(
    get,
    path = "/materials",
    params(MaterialQueryParams),
    responses(
        (status = 200, description = "Materials retrieved successfully", body = PaginatedMaterialsResponse),
        (status = 400, description = "Invalid query parameters")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<MaterialQueryParams>,
) -> Result<Json<PaginatedMaterialsResponse>, ApiError> {
    let pagination = params.pagination();
    let filter = params.into_filter(OwnerScope::default_for(&current.principal));

    let page = MaterialService::list(&state.db, &current.principal, filter, pagination).await?;
    let meta = PaginationMeta::from(&page);

    Ok(Json(PaginatedMaterialsResponse {
        materials: page.items.into_iter().map(Into::into).collect(),
        pagination: meta,
    }))
}

/// Create a material from an uploaded file or a link
#[utoipa::path(
    post,
    path = "/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = MaterialResponse),
        (status = 400, description = "Invalid material"),
        (status = 403, description = "Only teachers and admins create materials"),
        (status = 422, description = "Folder is missing or not owned")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<MaterialResponse>), ApiError> {
    let material = MaterialService::create(&state.db, &current.principal, req.into()).await?;
    Ok((StatusCode::CREATED, Json(material.into())))
}

/// Get a material; every successful read counts as a view
#[utoipa::path(
    get,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material found", body = MaterialResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Material not found")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MaterialResponse>, ApiError> {
    let material = MaterialService::get(&state.db, &current.principal, id).await?;
    Ok(Json(material.into()))
}

/// Update a material's metadata
#[utoipa::path(
    patch,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material ID")),
    request_body = UpdateMaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = MaterialResponse),
        (status = 400, description = "Invalid update"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Material not found")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateMaterialRequest>,
) -> Result<Json<MaterialResponse>, ApiError> {
    let material = MaterialService::update(&state.db, &current.principal, id, req.into()).await?;
    Ok(Json(material.into()))
}

/// Delete a material and its stored file
#[utoipa::path(
    delete,
    path = "/materials/{id}",
    params(("id" = Uuid, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material deleted", body = DeletionResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Material not found")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletionResponse>, ApiError> {
    let report =
        MaterialService::delete(&state.db, state.blob_store.as_ref(), &current.principal, id)
            .await?;
    Ok(Json(report.into()))
}

/// Download a material's file; counts as a download
#[utoipa::path(
    get,
    path = "/materials/{id}/download",
    params(("id" = Uuid, Path, description = "Material ID")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream", body = Vec<u8>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Material or stored file not found"),
        (status = 422, description = "Material has no file")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn download_material(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let download =
        MaterialService::download(&state.db, state.blob_store.as_ref(), &current.principal, id)
            .await?;

    let content_type = HeaderValue::from_str(&download.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, attachment(&download.file_name)),
        ],
        download.bytes,
    ))
}

/// `Content-Disposition` for a stored file name. Anything outside visible
/// ASCII, plus quotes and backslashes, becomes `_`.
fn attachment(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or(HeaderValue::from_static("attachment"))
}

/// List the share grants on a material
#[utoipa::path(
    get,
    path = "/materials/{id}/share",
    params(("id" = Uuid, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Share grants", body = Vec<ShareResponse>),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn list_material_shares(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ShareResponse>>, ApiError> {
    let grants =
        ShareService::list_grants(&state.db, &current.principal, ShareTarget::Material, id)
            .await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

/// Share a material with users; sharing again replaces the permission
#[utoipa::path(
    post,
    path = "/materials/{id}/share",
    params(("id" = Uuid, Path, description = "Material ID")),
    request_body = ShareRequest,
    responses(
        (status = 200, description = "Material shared", body = Vec<ShareResponse>),
        (status = 400, description = "Unknown user"),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn share_material(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<ShareRequest>,
) -> Result<Json<Vec<ShareResponse>>, ApiError> {
    let grants = MaterialService::share(
        &state.db,
        &current.principal,
        id,
        &req.user_ids,
        req.permission,
    )
    .await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

/// Revoke a user's grant on a material
#[utoipa::path(
    delete,
    path = "/materials/{id}/share/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Material ID"),
        ("user_id" = Uuid, Path, description = "User whose grant is revoked")
    ),
    responses(
        (status = 204, description = "Grant revoked"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "No such grant")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn revoke_material_share(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let revoked = ShareService::revoke(
        &state.db,
        &current.principal,
        ShareTarget::Material,
        id,
        user_id,
    )
    .await?;
    if !revoked {
        return Err(ServiceError::not_found("share", user_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Store a file for a material that is created afterwards
#[utoipa::path(
    put,
    path = "/uploads",
    params(UploadParams),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File stored", body = FileReference),
        (status = 400, description = "File type not allowed, empty or too large"),
        (status = 403, description = "Only teachers and admins upload files")
    ),
    security(("jwt" = [])),
    tag = "Materials"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(params): ApiQuery<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<FileReference>), ApiError> {
    ensure_author(&current.principal)?;

    let file = store_upload(
        state.blob_store.as_ref(),
        state.upload_policy,
        current.principal.id,
        &params.filename,
        &body,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(file.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_header_is_always_valid() {
        assert_eq!(
            attachment("Unit 1 notes.pdf"),
            "attachment; filename=\"Unit 1 notes.pdf\""
        );
        assert_eq!(
            attachment("a\nb\"c\\.pdf"),
            "attachment; filename=\"a_b_c_.pdf\""
        );
        assert_eq!(attachment("Übung.pdf"), "attachment; filename=\"_bung.pdf\"");
    }
}
