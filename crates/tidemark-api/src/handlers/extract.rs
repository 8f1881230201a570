//! `POST /extract`: schema-driven structured extraction.

use crate::errors::{ApiError, ApiResult};
use crate::middleware::{enforce_rate_limit, rate_limit_headers};
use crate::pipeline;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tidemark_cache::{extract_key, EXTRACT_TTL};
use tidemark_intelligence::{extract_with_schema, is_empty_extraction, validate_schema};
use tidemark_types::{ConvertError, ConvertOptions};
use tracing::debug;
use url::Url;

#[derive(Deserialize)]
pub struct ExtractRequest {
    pub url: String,
    pub schema: serde_json::Value,
}

pub async fn extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ExtractRequest>,
) -> Response {
    match handle(&state, request, &headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(
    state: &AppState,
    request: ExtractRequest,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let decision =
        enforce_rate_limit(state, "extract", state.config.rate_limit_extract, headers).await?;

    // Schema validation happens before anything touches the network.
    let sanitized = validate_schema(&request.schema).map_err(ApiError::new)?;

    let url = Url::parse(&request.url)
        .map_err(|e| ApiError::new(ConvertError::ParseError(format!("invalid url: {e}"))))?;
    state
        .guard
        .check(&url)
        .await
        .map_err(|err| ApiError::with_url(err, url.as_str()))?;

    if !state.llm.is_configured() {
        return Err(ApiError::new(ConvertError::LlmFailure(
            "structured extraction requires a configured LLM provider".into(),
        )));
    }

    let key = extract_key(&url, &sanitized);
    if let Some((raw, _source)) = state.cache.get(&key).await {
        if let Ok(cached) = serde_json::from_slice::<serde_json::Value>(&raw) {
            debug!(key, "extract cache hit");
            return Ok((
                [("x-cache", "hit".to_string())],
                rate_limit_headers(&decision),
                Json(cached),
            )
                .into_response());
        }
    }

    let started = Instant::now();
    let outcome = pipeline::convert_detached(state, &url, &ConvertOptions::default())
        .await
        .map_err(|err| ApiError::with_url(err, url.as_str()))?;

    let extraction = extract_with_schema(&state.llm, &outcome.result.markdown, &sanitized)
        .await
        .map_err(|err| ApiError::with_url(err, url.as_str()))?;

    let mut body = json!({
        "data": extraction.data,
        "valid": extraction.valid,
        "url": url.as_str(),
        "time_ms": started.elapsed().as_millis() as u64,
    });
    if !extraction.errors.is_empty() {
        body["errors"] = json!(extraction.errors);
    }

    // Valid, non-empty extractions are cached; empty ones are returned but
    // never stored.
    if extraction.valid && !is_empty_extraction(&extraction.data) {
        if let Ok(raw) = serde_json::to_vec(&body) {
            state.cache.set(&key, &raw, EXTRACT_TTL).await;
        }
    }

    Ok((
        [("x-cache", "miss".to_string())],
        rate_limit_headers(&decision),
        Json(body),
    )
        .into_response())
}
