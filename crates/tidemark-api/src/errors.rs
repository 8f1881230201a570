//! HTTP mapping for the conversion error taxonomy.

use crate::sanitize::{sanitize_error, sanitize_url};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tidemark_types::ConvertError;

/// Wrapper that carries the failing target URL (when known) so error bodies
/// can echo a sanitised version of it.
#[derive(Debug)]
pub struct ApiError {
    pub inner: ConvertError,
    pub url: Option<String>,
}

impl ApiError {
    pub fn new(inner: ConvertError) -> Self {
        Self { inner, url: None }
    }

    pub fn with_url(inner: ConvertError, url: &str) -> Self {
        Self {
            inner,
            url: Some(url.to_string()),
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(inner: ConvertError) -> Self {
        Self::new(inner)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = sanitize_error(&self.inner.to_string());

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "request rejected");
        }

        let body = match &self.url {
            Some(url) => json!({ "error": message, "url": sanitize_url(url) }),
            None => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_flow_through() {
        let err = ApiError::new(ConvertError::BlockedUrl("private address".into()));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let err = ApiError::new(ConvertError::RateLimited);
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);

        let err = ApiError::new(ConvertError::UpstreamHttp {
            status: 404,
            url: "https://x.test".into(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
