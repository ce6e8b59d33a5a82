use crate::{dtos::common::PaginationMeta, error::ErrorResponse};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// API Documentation. Paths are collected from the routers.
#[derive(OpenApi)]
#[openapi(
    components(schemas(ErrorResponse, PaginationMeta)),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Courses", description = "The course catalog"),
        (name = "Folders", description = "Folder hierarchy and sharing"),
        (name = "Materials", description = "Material catalog, uploads and downloads"),
        (name = "Sessions", description = "Video-conference sessions and attendance"),
        (name = "Analytics", description = "Usage and attendance statistics"),
        (name = "Users", description = "Accounts and student enrollment"),
    ),
    info(
        title = "Course Content API",
        version = "1.0.0",
        description = "Folders, materials and live sessions for EST and ACT exam preparation",
        license(
            name = "MIT OR Apache-2.0",
        )
    )
)]
pub struct ApiDoc;
