use thiserror::Error;

/// Error taxonomy for the conversion pipeline.
///
/// Each variant is a *kind*: the orchestrator treats tier-level kinds as
/// continuation signals (recorded in the escalation log), while the API layer
/// maps whatever finally surfaces to an HTTP status.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The URL guard rejected the target (403).
    #[error("Blocked URL: {0}")]
    BlockedUrl(String),

    /// Upstream returned a non-success status (mapped to the same status).
    #[error("HTTP_{status} fetching {url}")]
    UpstreamHttp { status: u16, url: String },

    /// More than the allowed number of redirect hops (502).
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// Response body exceeded the size cap (413).
    #[error("page too large: {0} bytes")]
    PageTooLarge(u64),

    /// MIME type the gateway does not convert (415).
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// An outbound operation hit its deadline.
    #[error("timeout during {0}")]
    Timeout(String),

    /// Connection-level failure talking to the upstream.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Upstream payload could not be parsed (feed XML, caption XML, ...).
    #[error("parse error: {0}")]
    ParseError(String),

    /// A document decoder produced nothing usable.
    #[error("document conversion failed: {0}")]
    DocumentConversionFailed(String),

    /// The LLM escalation failed or produced rejected output.
    #[error("llm failure: {0}")]
    LlmFailure(String),

    /// All configured BaaS providers failed.
    #[error("baas failure: {0}")]
    BaasFailure(String),

    /// All browser pool slots are busy; fail fast (503).
    #[error("browser pool exhausted")]
    BrowserPoolExhausted,

    /// Both navigation wait strategies failed.
    #[error("browser navigation failed: {0}")]
    BrowserNavigationFailed(String),

    /// The primary cache layer is unreachable.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Fixed-window rate limit tripped (429).
    #[error("rate limit exceeded")]
    RateLimited,

    /// A user-supplied extraction schema was rejected (400).
    #[error("{0}")]
    SchemaInvalid(String),

    /// Job id unknown or expired (404).
    #[error("job not found")]
    JobNotFound,

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl ConvertError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::NetworkError(err.to_string())
    }

    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self::ParseError(err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// HTTP status the API layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BlockedUrl(_) => 403,
            Self::UpstreamHttp { status, .. } => *status,
            Self::TooManyRedirects(_) => 502,
            Self::PageTooLarge(_) => 413,
            Self::UnsupportedContentType(_) => 415,
            Self::BrowserPoolExhausted => 503,
            Self::RateLimited => 429,
            Self::SchemaInvalid(_) => 400,
            Self::JobNotFound => 404,
            _ => 500,
        }
    }

    /// Whether the orchestrator may keep escalating after this failure.
    pub fn is_tier_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::BlockedUrl(_) | Self::RateLimited | Self::SchemaInvalid(_) | Self::JobNotFound
        )
    }
}

impl From<url::ParseError> for ConvertError {
    fn from(err: url::ParseError) -> Self {
        Self::ParseError(format!("invalid URL: {err}"))
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(format!("invalid JSON: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(ConvertError::BlockedUrl("x".into()).http_status(), 403);
        assert_eq!(ConvertError::PageTooLarge(1).http_status(), 413);
        assert_eq!(
            ConvertError::UnsupportedContentType("image/png".into()).http_status(),
            415
        );
        assert_eq!(ConvertError::TooManyRedirects(5).http_status(), 502);
        assert_eq!(ConvertError::BrowserPoolExhausted.http_status(), 503);
        assert_eq!(ConvertError::Timeout("fetch".into()).http_status(), 500);
        assert_eq!(
            ConvertError::UpstreamHttp {
                status: 404,
                url: "https://example.com".into()
            }
            .http_status(),
            404
        );
    }

    #[test]
    fn upstream_message_carries_status_token() {
        let err = ConvertError::UpstreamHttp {
            status: 418,
            url: "https://example.com".into(),
        };
        assert!(err.to_string().contains("HTTP_418"));
    }

    #[test]
    fn blocked_url_is_not_recoverable() {
        assert!(!ConvertError::BlockedUrl("private".into()).is_tier_recoverable());
        assert!(ConvertError::Timeout("fetch".into()).is_tier_recoverable());
    }
}
