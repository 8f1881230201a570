//! Response rendering: content negotiation, conversion headers, weak ETags,
//! and conditional GET.

use crate::pipeline::ConversionOutcome;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tidemark_cache::{fingerprint, tier_ttl};
use tidemark_types::ConversionResult;

/// Weak ETag over the markdown body.
pub fn etag_for(result: &ConversionResult) -> String {
    format!("W/\"{}\"", fingerprint(&result.markdown))
}

/// True when the client's `Accept` asks for JSON.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |accept| accept.contains("application/json"))
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert(name, v);
    }
}

/// The conversion headers shared by 200 and 304 responses.
pub fn conversion_headers(
    result: &ConversionResult,
    cache_hit: bool,
    rate_headers: &[(&'static str, String)],
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, "x-markdown-tokens", result.tokens.to_string());
    insert(&mut headers, "x-conversion-tier", result.tier.clone());
    insert(
        &mut headers,
        "x-conversion-time",
        format!("{}ms", result.total_ms),
    );
    insert(&mut headers, "x-readability", result.readability.to_string());
    insert(&mut headers, "x-extraction-method", result.method.clone());
    insert(
        &mut headers,
        "x-quality-score",
        format!("{:.2}", result.quality.score),
    );
    insert(
        &mut headers,
        "x-quality-grade",
        result.quality.grade.as_str().to_string(),
    );
    insert(
        &mut headers,
        "x-cache",
        if cache_hit { "hit" } else { "miss" }.to_string(),
    );
    insert(&mut headers, "etag", etag_for(result));
    insert(&mut headers, "vary", "accept, accept-encoding".to_string());
    insert(
        &mut headers,
        "cache-control",
        format!("public, max-age={}", tier_ttl(&result.tier).as_secs()),
    );
    for (name, value) in rate_headers {
        insert(&mut headers, name, value.clone());
    }
    headers
}

/// Render a conversion, honouring `If-None-Match` and `Accept`.
pub fn respond(
    outcome: &ConversionOutcome,
    request_headers: &HeaderMap,
    rate_headers: &[(&'static str, String)],
) -> Response {
    let result = &outcome.result;
    let headers = conversion_headers(result, outcome.cache_hit.is_some(), rate_headers);

    let etag = etag_for(result);
    let matched = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |inm| {
            inm.split(',').any(|candidate| candidate.trim() == etag)
        });
    if matched {
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    if wants_json(request_headers) {
        let body = json!({
            "title": result.title,
            "url": result.url,
            "content": result.markdown,
            "excerpt": result.excerpt,
            "byline": result.byline,
            "siteName": result.site_name,
            "tokens": result.tokens,
            "tier": result.tier,
            "readability": result.readability,
            "method": result.method,
            "quality": { "score": result.quality.score, "grade": result.quality.grade.as_str() },
            "time_ms": result.total_ms,
            "fit_markdown": result.fit_markdown,
            "fit_tokens": result.fit_tokens,
            "escalation": result.escalation,
        });
        return (StatusCode::OK, headers, Json(body)).into_response();
    }

    let mut text = String::new();
    text.push_str(&format!("Title: {}\n", result.title));
    text.push_str(&format!("URL Source: {}\n", result.url));
    if let Some(byline) = &result.byline {
        text.push_str(&format!("Author: {byline}\n"));
    }
    if let Some(excerpt) = &result.excerpt {
        text.push_str(&format!("Description: {excerpt}\n"));
    }
    text.push_str("\nMarkdown Content:\n");
    text.push_str(&result.markdown);

    let mut headers = headers;
    insert(
        &mut headers,
        "content-type",
        "text/markdown; charset=utf-8".to_string(),
    );
    (StatusCode::OK, headers, text).into_response()
}
