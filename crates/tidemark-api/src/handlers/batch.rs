//! `POST /batch`: bulk conversion with a bounded worker pool.

use crate::errors::{ApiError, ApiResult};
use crate::middleware::{enforce_rate_limit, rate_limit_headers};
use crate::pipeline;
use crate::sanitize::sanitize_error;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tidemark_types::{ConvertError, ConvertOptions};
use tidemark_workers::run_batch;

/// Upper bound on URLs per batch request.
const MAX_URLS: usize = 50;

#[derive(Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub options: ConvertOptions,
}

pub async fn batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Response {
    match handle(&state, request, &headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(
    state: &AppState,
    request: BatchRequest,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let decision =
        enforce_rate_limit(state, "batch", state.config.rate_limit_batch, headers).await?;

    if request.urls.is_empty() {
        return Err(ApiError::new(ConvertError::SchemaInvalid(
            "urls must not be empty".into(),
        )));
    }
    if request.urls.len() > MAX_URLS {
        return Err(ApiError::new(ConvertError::SchemaInvalid(format!(
            "too many urls: {} (max {MAX_URLS})",
            request.urls.len()
        ))));
    }

    let total = request.urls.len();
    let convert_state = state.clone();
    let options = request.options.clone();

    let outcomes = run_batch(request.urls, move |url| {
        let state = convert_state.clone();
        let options = options.clone();
        async move {
            state.guard.check(&url).await?;
            pipeline::convert(&state, &url, &options)
                .await
                .map(|outcome| outcome.result)
        }
    })
    .await;

    let results: Vec<serde_json::Value> = outcomes
        .into_iter()
        .map(|outcome| match (outcome.result, outcome.error) {
            (Some(result), _) => json!({
                "url": outcome.url,
                "title": result.title,
                "content": result.markdown,
                "tokens": result.tokens,
                "tier": result.tier,
                "quality": {
                    "score": result.quality.score,
                    "grade": result.quality.grade.as_str(),
                },
            }),
            (None, Some(error)) => json!({
                "url": outcome.url,
                "error": sanitize_error(&error),
            }),
            (None, None) => json!({
                "url": outcome.url,
                "error": "unknown failure",
            }),
        })
        .collect();

    Ok((
        rate_limit_headers(&decision),
        Json(json!({ "results": results, "total": total })),
    )
        .into_response())
}
