use crate::{
    config::{Config, ConfigError},
    doc::ApiDoc,
    routes::{analytics, course, folder, health, material, root, session, user},
    state::AppState,
    utils::shutdown::shutdown_signal,
};
use axum::{Router, extract::DefaultBodyLimit};
use database::{
    blob::{LocalBlobStore, UploadPolicy},
    conferencing::{ConferencingProvider, DisabledProvider, HttpMeetingProvider, ProviderError},
    db::create_connection,
};
use log::{error, info, warn};
use migration::{Migrator, MigratorTrait};
use sea_orm::DbErr;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_oauth2_resource_server::server::OAuth2ResourceServer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod config;
mod doc;
mod dtos;
mod error;
mod extract;
mod routes;
mod state;
mod utils {
    pub mod shutdown;
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("failed to build OAuth2 resource server: {0}")]
    Auth(String),

    #[error("failed to set up conferencing provider: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;

    let db = create_connection(&config.database_url, config.database_max_connections).await?;
    if config.run_migrations {
        info!("Applying pending migrations");
        Migrator::up(&db, None).await?;
    }

    let provider: Arc<dyn ConferencingProvider> = match &config.conferencing {
        Some(conferencing) => Arc::new(HttpMeetingProvider::new(
            conferencing.api_url.as_str(),
            conferencing.api_token.as_str(),
        )?),
        None => {
            warn!("No conferencing provider configured, sessions will use placeholder meetings");
            Arc::new(DisabledProvider)
        }
    };

    let state = AppState {
        db,
        blob_store: Arc::new(LocalBlobStore::new(config.upload_dir.clone())),
        provider,
        upload_policy: UploadPolicy {
            max_bytes: config.max_upload_bytes,
        },
        admin_subjects: config.admin_subjects.clone().into(),
    };

    let oauth2_resource_server = <OAuth2ResourceServer>::builder()
        .issuer_url(config.oidc_issuer_url.as_str())
        .build()
        .await
        .map_err(|e| StartupError::Auth(format!("{e:?}")))?;

    let (public, mut api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(root::root))
        .routes(routes!(health::health))
        .merge(course::router())
        .split_for_parts();

    let (protected, protected_api) = OpenApiRouter::new()
        .merge(folder::router())
        .merge(material::router())
        .merge(session::router())
        .merge(analytics::router())
        .merge(user::router())
        .split_for_parts();
    api.merge(protected_api);

    // Uploads are the only large bodies; the upload policy reports the precise limit
    let body_limit = usize::try_from(config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024);

    let app = Router::new()
        .merge(public)
        .merge(protected.layer(ServiceBuilder::new().layer(oauth2_resource_server.into_layer())))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", api))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Running axum on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
