//! `Json` and `Query` extractors whose rejections use the JSON error body

use crate::error::ApiError;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::try_from_uri(&parts.uri)
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{StatusCode, header},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Paging {
        page: u64,
    }

    fn parts(uri: &str) -> Parts {
        axum::http::Request::builder()
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn json(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_rejection_is_bad_request() {
        let ApiQuery(paging) = ApiQuery::<Paging>::from_request_parts(&mut parts("/x?page=3"), &())
            .await
            .unwrap();
        assert_eq!(paging.page, 3);

        let rejected = ApiQuery::<Paging>::from_request_parts(&mut parts("/x?page=abc"), &())
            .await
            .unwrap_err();
        assert!(matches!(rejected, ApiError::BadRequest(_)));
        assert_eq!(rejected.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_json_rejection_is_bad_request() {
        let ApiJson(paging) = ApiJson::<Paging>::from_request(json(r#"{"page": 2}"#), &())
            .await
            .unwrap();
        assert_eq!(paging.page, 2);

        for body in [r#"{"page": "two"}"#, "{", ""] {
            let rejected = ApiJson::<Paging>::from_request(json(body), &())
                .await
                .unwrap_err();
            assert!(matches!(rejected, ApiError::BadRequest(_)));
            assert_eq!(rejected.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }
}
