//! Per-request logging scope, request ids, client IP selection, and the
//! rate-limit gate handlers call before doing work.

use crate::errors::ApiError;
use crate::sanitize::sanitize_for_log;
use crate::state::AppState;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tidemark_cache::RateDecision;
use tidemark_types::ConvertError;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Honour an inbound request id or mint one; run the rest of the request
/// inside a span carrying the id and client IP, and echo the id back.
pub async fn request_scope(request: Request, next: Next) -> Response {
    let req_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(sanitize_for_log)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()[..16].to_string());

    let ip = client_ip(request.headers());
    let span = tracing::info_span!("request", req_id = %req_id, client_ip = %ip);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&req_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Client IP selection order: CF-Connecting-IP, X-Real-IP, leftmost
/// X-Forwarded-For, else `unknown`.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = header_str(headers, "cf-connecting-ip") {
        return ip;
    }
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip;
    }
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    "unknown".to_string()
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(sanitize_for_log)
}

/// Consume one rate-limit token for `endpoint`; the decision feeds the
/// `x-ratelimit-*` headers on success and a 429 on refusal.
pub async fn enforce_rate_limit(
    state: &AppState,
    endpoint: &str,
    limit: u32,
    headers: &HeaderMap,
) -> Result<RateDecision, ApiError> {
    let ip = client_ip(headers);
    let decision = state.rate_limiter.check(endpoint, &ip, limit).await;
    if !decision.allowed {
        state.metrics.rate_limited_total.inc();
        tracing::warn!(endpoint, client_ip = %ip, "rate limited");
        return Err(ApiError::new(ConvertError::RateLimited));
    }
    Ok(decision)
}

/// Attach the rate-limit headers to a response.
pub fn rate_limit_headers(decision: &RateDecision) -> [(&'static str, String); 3] {
    [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_secs.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn ip_selection_order() {
        let h = headers(&[
            ("cf-connecting-ip", "1.1.1.1"),
            ("x-real-ip", "2.2.2.2"),
            ("x-forwarded-for", "3.3.3.3, 4.4.4.4"),
        ]);
        assert_eq!(client_ip(&h), "1.1.1.1");

        let h = headers(&[
            ("x-real-ip", "2.2.2.2"),
            ("x-forwarded-for", "3.3.3.3, 4.4.4.4"),
        ]);
        assert_eq!(client_ip(&h), "2.2.2.2");

        let h = headers(&[("x-forwarded-for", "3.3.3.3, 4.4.4.4")]);
        assert_eq!(client_ip(&h), "3.3.3.3");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
