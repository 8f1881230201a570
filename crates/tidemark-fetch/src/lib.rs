//! The safe fetcher: HTTP GET with manual redirect following, per-hop SSRF
//! re-validation, size caps, and content-type routing into payload variants.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tidemark_guard::UrlGuard;
use tidemark_markdown::patterns;
use tidemark_types::{ConvertError, DocumentFormat, FetchedPayload, Result};
use tracing::{debug, info, warn};
use url::Url;

/// Host validation seam. The production policy is [`UrlGuard`]; tests plug
/// in narrower policies so redirect re-validation can be exercised against
/// local mock servers.
#[async_trait]
pub trait HostPolicy: Send + Sync {
    async fn check(&self, url: &Url) -> Result<()>;
    async fn check_redirect(&self, url: &Url) -> Result<()>;
}

#[async_trait]
impl HostPolicy for UrlGuard {
    async fn check(&self, url: &Url) -> Result<()> {
        UrlGuard::check(self, url).await
    }
    async fn check_redirect(&self, url: &Url) -> Result<()> {
        UrlGuard::check_redirect(self, url).await
    }
}

/// Fetcher configuration. Defaults implement the gateway contract: 5 hops,
/// 15 s per hop, 5 MiB cap, desktop browser identity.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub accept: String,
    pub max_redirects: usize,
    pub hop_timeout: Duration,
    pub max_body_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            max_redirects: 5,
            hop_timeout: Duration::from_secs(15),
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// MIME types recognised as feeds outright.
const FEED_MIMES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/feed+json",
    "application/json+feed",
];

/// Ambiguous XML types that need a content sniff.
const AMBIGUOUS_XML_MIMES: &[&str] = &["text/xml", "application/xml"];

pub struct SafeFetcher<P: HostPolicy> {
    client: Client,
    policy: P,
    config: FetchConfig,
}

impl<P: HostPolicy> SafeFetcher<P> {
    pub fn new(policy: P, config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.hop_timeout)
            .connect_timeout(Duration::from_secs(5))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ConvertError::internal(format!("http client: {e}")))?;

        Ok(Self {
            client,
            policy,
            config,
        })
    }

    /// Fetch `url`, following up to `max_redirects` hops. Every hop is
    /// re-validated through the host policy before it is dialled.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPayload> {
        let mut current = url.clone();

        for hop in 0..=self.config.max_redirects {
            if hop == 0 {
                self.policy.check(&current).await?;
            } else {
                self.policy.check_redirect(&current).await?;
            }

            debug!(url = %current, hop, "fetching");
            let response = self.send(&current).await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ConvertError::NetworkError("redirect without Location header".into())
                    })?
                    .to_string();
                // Drain the hop body before re-issuing.
                drop(response);

                // Padded-octet IP forms must be caught before URL
                // normalisation folds them into a different address.
                if tidemark_guard::raw_host_is_padded_ip(&location) {
                    return Err(ConvertError::BlockedUrl(
                        "redirect to private address".into(),
                    ));
                }
                current = current
                    .join(&location)
                    .map_err(|e| ConvertError::ParseError(format!("bad redirect target: {e}")))?;
                info!(target = %current, hop, "following redirect");
                continue;
            }

            if !status.is_success() {
                return self.handle_error_status(status, &current, response).await;
            }

            return self.route_payload(response, current).await;
        }

        Err(ConvertError::TooManyRedirects(self.config.max_redirects))
    }

    async fn send(&self, url: &Url) -> Result<Response> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("Mozilla/5.0")),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&self.config.accept)
                .unwrap_or_else(|_| HeaderValue::from_static("*/*")),
        );

        self.client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConvertError::Timeout("fetch".into())
                } else {
                    ConvertError::network(e)
                }
            })
    }

    /// A 403/503 that carries anti-bot markers is a challenge page, not a
    /// plain upstream error: the orchestrator wants to escalate, not fail.
    async fn handle_error_status(
        &self,
        status: StatusCode,
        url: &Url,
        response: Response,
    ) -> Result<FetchedPayload> {
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE) {
            if let Ok(body) = response.text().await {
                if patterns::contains_error_pattern(&body) {
                    let reason = patterns::matched_error_pattern(&body)
                        .unwrap_or("anti-bot interstitial")
                        .to_string();
                    warn!(url = %url, status = status.as_u16(), reason, "challenge page");
                    return Ok(FetchedPayload::Challenge { html: body, reason });
                }
            }
        }
        Err(ConvertError::UpstreamHttp {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }

    async fn route_payload(&self, response: Response, final_url: Url) -> Result<FetchedPayload> {
        if let Some(declared) = response.content_length() {
            if declared > self.config.max_body_bytes {
                return Err(ConvertError::PageTooLarge(declared));
            }
        }

        let mime = bare_mime(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConvertError::network(e))?;
        if bytes.len() as u64 > self.config.max_body_bytes {
            return Err(ConvertError::PageTooLarge(bytes.len() as u64));
        }

        if FEED_MIMES.contains(&mime.as_str()) {
            return Ok(FetchedPayload::Feed {
                xml: bytes.to_vec(),
                final_url,
            });
        }

        if AMBIGUOUS_XML_MIMES.contains(&mime.as_str()) {
            if sniff_feed(&bytes) {
                return Ok(FetchedPayload::Feed {
                    xml: bytes.to_vec(),
                    final_url,
                });
            }
            return Ok(html_payload(bytes.to_vec(), final_url));
        }

        if let Some(format) = DocumentFormat::from_mime(&mime) {
            return Ok(FetchedPayload::Document {
                bytes: bytes.to_vec(),
                format,
            });
        }

        if mime == "application/octet-stream" {
            return match DocumentFormat::from_extension(final_url.path()) {
                Some(format) => Ok(FetchedPayload::Document {
                    bytes: bytes.to_vec(),
                    format,
                }),
                None => Err(ConvertError::UnsupportedContentType(mime)),
            };
        }

        if is_html_like(&mime) {
            return Ok(html_payload(bytes.to_vec(), final_url));
        }

        Err(ConvertError::UnsupportedContentType(mime))
    }
}

/// Bare, lower-cased MIME without parameters. Empty when absent.
fn bare_mime(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
        .unwrap_or_default()
}

fn is_html_like(mime: &str) -> bool {
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/json"
}

/// First-500-bytes sniff for feed roots behind ambiguous XML MIMEs.
fn sniff_feed(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(500)];
    let head = String::from_utf8_lossy(head);
    head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:RDF")
}

fn html_payload(bytes: Vec<u8>, final_url: Url) -> FetchedPayload {
    FetchedPayload::Html {
        html: String::from_utf8_lossy(&bytes).into_owned(),
        final_url,
    }
}
