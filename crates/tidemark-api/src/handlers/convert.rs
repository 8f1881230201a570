//! The synchronous conversion surface: `GET /{target}` and `GET /?url=…`.

use crate::errors::{ApiError, ApiResult};
use crate::middleware::{enforce_rate_limit, rate_limit_headers};
use crate::pipeline;
use crate::render;
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tidemark_types::{ConvertError, ConvertOptions, Links, Mode};
use url::Url;

/// Query keys the gateway consumes; everything else is forwarded to the
/// target URL.
const RESERVED_PARAMS: &[&str] = &[
    "url",
    "mode",
    "links",
    "max_tokens",
    "force_browser",
    "skip_fetch",
    "skip_baas",
];

const LANDING_PAGE: &str = "\
# Tidemark

Convert any URL to clean Markdown.

## Usage

    GET /https://example.com/article
    GET /?url=https://example.com/article

## Options

    mode=fit            prune boilerplate for LLM context budgets
    links=citations     numbered citations with a references footer
    max_tokens=<n>      truncate fit output to a token budget

## Other endpoints

    POST /extract       schema-driven structured extraction
    POST /batch         convert up to 50 URLs
    POST /async         enqueue a job, poll /job/{id}
    GET  /health        service health
    GET  /metrics       Prometheus metrics

Send `Accept: application/json` for a JSON response envelope.
";

pub async fn root(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let (options, url_param, forwarded) = match parse_query(query.as_deref()) {
        Ok(parsed) => parsed,
        Err(err) => return err.into_response(),
    };

    match url_param {
        Some(target) => {
            match handle_convert(&state, &target, &forwarded, &options, &headers).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            }
        }
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            LANDING_PAGE,
        )
            .into_response(),
    }
}

pub async fn target(
    State(state): State<AppState>,
    Path(target): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let (options, url_param, forwarded) = match parse_query(query.as_deref()) {
        Ok(parsed) => parsed,
        Err(err) => return err.into_response(),
    };
    // `?url=` wins over the path form when both are present.
    let raw_target = url_param.unwrap_or(target);

    match handle_convert(&state, &raw_target, &forwarded, &options, &headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_convert(
    state: &AppState,
    raw_target: &str,
    forwarded: &[(String, String)],
    options: &ConvertOptions,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let url = build_target_url(raw_target, forwarded)
        .map_err(|err| ApiError::with_url(err, raw_target))?;

    state
        .guard
        .check(&url)
        .await
        .map_err(|err| ApiError::with_url(err, url.as_str()))?;

    let decision =
        enforce_rate_limit(state, "main", state.config.rate_limit_main, headers).await?;

    let outcome = pipeline::convert_detached(state, &url, options)
        .await
        .map_err(|err| ApiError::with_url(err, url.as_str()))?;

    Ok(render::respond(
        &outcome,
        headers,
        &rate_limit_headers(&decision),
    ))
}

/// Split the query string into recognised options, the reserved `url`
/// parameter, and parameters to forward to the target.
fn parse_query(
    query: Option<&str>,
) -> ApiResult<(ConvertOptions, Option<String>, Vec<(String, String)>)> {
    let mut options = ConvertOptions::default();
    let mut url_param = None;
    let mut forwarded = Vec::new();

    let Some(query) = query else {
        return Ok((options, None, forwarded));
    };

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| ApiError::new(ConvertError::ParseError(format!("query string: {e}"))))?;

    for (key, value) in pairs {
        match key.as_str() {
            "url" => url_param = Some(value),
            "mode" => {
                if value.eq_ignore_ascii_case("fit") {
                    options.mode = Mode::Fit;
                }
            }
            "links" => {
                if value.eq_ignore_ascii_case("citations") {
                    options.links = Links::Citations;
                }
            }
            "max_tokens" => {
                options.max_tokens = value.parse().ok().filter(|n| *n > 0);
            }
            "force_browser" => options.force_browser = bool_param(&value),
            "skip_fetch" => options.skip_fetch = bool_param(&value),
            "skip_baas" => options.skip_baas = bool_param(&value),
            _ => {
                debug_assert!(!RESERVED_PARAMS.contains(&key.as_str()));
                forwarded.push((key, value));
            }
        }
    }

    Ok((options, url_param, forwarded))
}

fn bool_param(value: &str) -> bool {
    value.is_empty() || value == "1" || value.eq_ignore_ascii_case("true")
}

/// Rebuild a full target URL from the path capture: restore a missing
/// scheme, repair `https:/host` (proxies collapse double slashes), and
/// re-attach forwarded query parameters.
fn build_target_url(
    raw: &str,
    forwarded: &[(String, String)],
) -> Result<Url, ConvertError> {
    let trimmed = raw.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ConvertError::ParseError("empty target URL".into()));
    }

    let with_scheme = repair_scheme(trimmed);
    if tidemark_guard::raw_host_is_padded_ip(&with_scheme) {
        return Err(ConvertError::BlockedUrl("zero-padded IP literal".into()));
    }
    let mut url = Url::parse(&with_scheme)
        .map_err(|e| ConvertError::ParseError(format!("invalid target URL: {e}")))?;

    if !forwarded.is_empty() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.extend(forwarded.iter().cloned());
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Ok(url)
}

fn repair_scheme(raw: &str) -> String {
    for scheme in ["https", "http"] {
        let full = format!("{scheme}://");
        if raw.starts_with(&full) {
            return raw.to_string();
        }
        let collapsed = format!("{scheme}:/");
        if let Some(rest) = raw.strip_prefix(&collapsed) {
            if !rest.starts_with('/') {
                return format!("{full}{rest}");
            }
        }
    }
    format!("https://{raw}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_repair() {
        assert_eq!(
            repair_scheme("https://example.com/a"),
            "https://example.com/a"
        );
        assert_eq!(
            repair_scheme("https:/example.com/a"),
            "https://example.com/a"
        );
        assert_eq!(repair_scheme("http:/example.com"), "http://example.com");
        assert_eq!(repair_scheme("example.com/a"), "https://example.com/a");
    }

    #[test]
    fn reserved_params_are_consumed_and_rest_forwarded() {
        let (options, url, forwarded) =
            parse_query(Some("mode=fit&links=citations&max_tokens=100&page=2&sort=asc")).unwrap();
        assert_eq!(options.mode, Mode::Fit);
        assert_eq!(options.links, Links::Citations);
        assert_eq!(options.max_tokens, Some(100));
        assert_eq!(
            forwarded,
            vec![
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "asc".to_string())
            ]
        );
        assert!(url.is_none());
        assert!(RESERVED_PARAMS.contains(&"mode"));
    }

    #[test]
    fn url_param_is_reserved() {
        let (_, url, forwarded) = parse_query(Some("url=https://example.com/x&a=1")).unwrap();
        assert_eq!(url.as_deref(), Some("https://example.com/x"));
        assert_eq!(forwarded.len(), 1);
    }

    #[test]
    fn boolean_params() {
        let (options, _, _) =
            parse_query(Some("force_browser=true&skip_fetch=1&skip_baas")).unwrap();
        assert!(options.force_browser);
        assert!(options.skip_fetch);
        assert!(options.skip_baas);
    }

    #[test]
    fn forwarded_params_reach_the_target() {
        let url = build_target_url(
            "https://example.com/search?q=tide",
            &[("page".into(), "3".into())],
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://example.com/search?q=tide&page=3");
    }

    #[test]
    fn empty_target_is_rejected() {
        assert!(build_target_url("", &[]).is_err());
        assert!(build_target_url("///", &[]).is_err());
    }
}
