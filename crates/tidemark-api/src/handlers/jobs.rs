//! `POST /async` and `GET /job/{id}`: the async job surface.

use crate::errors::{ApiError, ApiResult};
use crate::middleware::{enforce_rate_limit, rate_limit_headers};
use crate::pipeline;
use crate::sanitize::sanitize_error;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tidemark_types::{ConvertError, ConvertOptions};
use tracing::info;
use url::Url;

#[derive(Deserialize)]
pub struct AsyncRequest {
    pub url: String,
    #[serde(default)]
    pub options: ConvertOptions,
    pub callback_url: Option<String>,
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AsyncRequest>,
) -> Response {
    match handle_submit(&state, request, &headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_submit(
    state: &AppState,
    request: AsyncRequest,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let decision =
        enforce_rate_limit(state, "async", state.config.rate_limit_async, headers).await?;

    let url = Url::parse(&request.url)
        .map_err(|e| ApiError::new(ConvertError::ParseError(format!("invalid url: {e}"))))?;
    state
        .guard
        .check(&url)
        .await
        .map_err(|err| ApiError::with_url(err, url.as_str()))?;

    // Callback URLs get the full host ruleset at submit time.
    if let Some(callback) = &request.callback_url {
        state
            .webhooks
            .validate_callback(callback)
            .await
            .map_err(ApiError::new)?;
    }

    let job = state
        .jobs
        .create(url.to_string(), request.options.clone(), request.callback_url)
        .await
        .map_err(ApiError::new)?;
    info!(job_id = %job.id, "async job accepted");

    // The conversion runs detached; delivery and status updates never block
    // this response.
    let job_id = job.id.clone();
    let task_state = state.clone();
    let options = request.options;
    tokio::spawn(async move {
        let outcome = pipeline::convert(&task_state, &url, &options).await;
        let stored = match outcome {
            Ok(converted) => task_state.jobs.complete(&job_id, converted.result).await,
            Err(err) => {
                task_state
                    .jobs
                    .fail(&job_id, sanitize_error(&err.to_string()))
                    .await
            }
        };
        match stored {
            Ok(job) => {
                task_state.webhooks.deliver(&job);
                task_state
                    .metrics
                    .webhook_failures
                    .set(task_state.webhooks.failed_deliveries() as i64);
            }
            Err(err) => {
                tracing::error!(job_id, %err, "failed to persist job outcome");
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        rate_limit_headers(&decision),
        Json(json!({
            "job_id": job.id,
            "status": "processing",
            "poll_url": format!("/job/{}", job.id),
        })),
    )
        .into_response())
}

/// Poll job state. The response never echoes `callback_url` or `options`.
pub async fn poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.jobs.get(&id).await {
        Ok(job) => Json(json!({
            "job_id": job.id,
            "url": job.url,
            "status": job.status,
            "created_at": job.created_at,
            "completed_at": job.completed_at,
            "result": job.result,
            "error": job.error,
        }))
        .into_response(),
        Err(err) => ApiError::new(err).into_response(),
    }
}
