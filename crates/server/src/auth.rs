use crate::{error::ApiError, state::AppState};
use axum::{Extension, extract::FromRequestParts, http::request::Parts};
use database::{access::Principal, entities::users, services::user::UserService};
use tower_oauth2_resource_server::claims::DefaultClaims;

/// The registered account behind the request's bearer token
pub struct CurrentUser {
    pub user: users::Model,
    pub principal: Principal,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Inserted by the resource server layer once the JWT is validated
        let Extension(claims) = Extension::<DefaultClaims>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized)?;
        let subject = claims.sub.as_deref().ok_or(ApiError::Unauthorized)?;

        let user = UserService::resolve_subject(&state.db, subject, &state.admin_subjects)
            .await?
            .ok_or(ApiError::NotRegistered)?;

        Ok(Self {
            principal: Principal::from(&user),
            user,
        })
    }
}
