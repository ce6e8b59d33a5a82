use axum::http::StatusCode;

/// Liveness probe, reporting the running version
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", content_type = "text/plain", body = String)
    ),
    tag = "Health"
)]
pub async fn root() -> (StatusCode, &'static str) {
    (StatusCode::OK, concat!("course content API ", env!("CARGO_PKG_VERSION")))
}
