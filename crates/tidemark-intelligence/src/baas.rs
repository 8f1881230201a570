//! Browser-as-a-service provider chain.
//!
//! Providers are tried in configured (cost/quality) order. Quota and rate
//! errors fall through to the next provider; the last error is reported if
//! the whole chain fails.

use serde_json::json;
use std::time::Duration;
use tidemark_types::{ConvertError, Result};
use tracing::{debug, warn};

/// One configured provider slot.
#[derive(Debug, Clone)]
pub struct BaasConfig {
    pub scrapingbee_key: Option<String>,
    pub browserless_key: Option<String>,
    pub scraperapi_key: Option<String>,
    pub timeout: Duration,
}

impl Default for BaasConfig {
    fn default() -> Self {
        Self {
            scrapingbee_key: None,
            browserless_key: None,
            scraperapi_key: None,
            timeout: Duration::from_secs(45),
        }
    }
}

/// Rendered HTML and the provider that produced it.
#[derive(Debug, Clone)]
pub struct BaasResult {
    pub provider: &'static str,
    pub html: String,
}

#[derive(Clone)]
pub struct BaasChain {
    http: reqwest::Client,
    config: BaasConfig,
}

impl BaasChain {
    pub fn new(config: BaasConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.scrapingbee_key.is_some()
            || self.config.browserless_key.is_some()
            || self.config.scraperapi_key.is_some()
    }

    /// Try each configured provider in order. Quota/rate failures continue
    /// down the chain; success returns immediately.
    pub async fn render(&self, url: &str) -> Result<BaasResult> {
        let mut last_error = None;

        if let Some(key) = &self.config.scrapingbee_key {
            match self.scrapingbee(key, url).await {
                Ok(html) => {
                    return Ok(BaasResult {
                        provider: "scrapingbee",
                        html,
                    })
                }
                Err(err) => {
                    warn!(provider = "scrapingbee", %err, "provider failed");
                    last_error = Some(err);
                }
            }
        }
        if let Some(key) = &self.config.browserless_key {
            match self.browserless(key, url).await {
                Ok(html) => {
                    return Ok(BaasResult {
                        provider: "browserless",
                        html,
                    })
                }
                Err(err) => {
                    warn!(provider = "browserless", %err, "provider failed");
                    last_error = Some(err);
                }
            }
        }
        if let Some(key) = &self.config.scraperapi_key {
            match self.scraperapi(key, url).await {
                Ok(html) => {
                    return Ok(BaasResult {
                        provider: "scraperapi",
                        html,
                    })
                }
                Err(err) => {
                    warn!(provider = "scraperapi", %err, "provider failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ConvertError::BaasFailure("no provider configured".into())))
    }

    async fn scrapingbee(&self, key: &str, url: &str) -> Result<String> {
        let response = self
            .http
            .get("https://app.scrapingbee.com/api/v1/")
            .query(&[("api_key", key), ("url", url), ("render_js", "true")])
            .send()
            .await
            .map_err(baas_net_err)?;
        read_html(response).await
    }

    async fn browserless(&self, key: &str, url: &str) -> Result<String> {
        let response = self
            .http
            .post("https://chrome.browserless.io/content")
            .query(&[("token", key)])
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(baas_net_err)?;
        read_html(response).await
    }

    async fn scraperapi(&self, key: &str, url: &str) -> Result<String> {
        let response = self
            .http
            .get("https://api.scraperapi.com/")
            .query(&[("api_key", key), ("url", url), ("render", "true")])
            .send()
            .await
            .map_err(baas_net_err)?;
        read_html(response).await
    }
}

fn baas_net_err(err: reqwest::Error) -> ConvertError {
    if err.is_timeout() {
        ConvertError::Timeout("baas render".into())
    } else {
        ConvertError::BaasFailure(format!("request: {err}"))
    }
}

async fn read_html(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if status.as_u16() == 402 || status.as_u16() == 429 {
        return Err(ConvertError::BaasFailure(format!(
            "quota exhausted ({})",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        return Err(ConvertError::BaasFailure(format!(
            "provider returned {}",
            status.as_u16()
        )));
    }
    let html = response
        .text()
        .await
        .map_err(|e| ConvertError::BaasFailure(format!("body read: {e}")))?;
    if html.trim().is_empty() {
        return Err(ConvertError::BaasFailure("empty render".into()));
    }
    debug!(bytes = html.len(), "baas render");
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_chain_reports_itself() {
        let chain = BaasChain::new(BaasConfig::default());
        assert!(!chain.is_configured());
    }

    #[tokio::test]
    async fn unconfigured_chain_fails_with_baas_error() {
        let chain = BaasChain::new(BaasConfig::default());
        let err = chain.render("https://example.com").await.unwrap_err();
        assert!(matches!(err, ConvertError::BaasFailure(_)));
    }

    #[test]
    fn configured_when_any_key_present() {
        let chain = BaasChain::new(BaasConfig {
            scraperapi_key: Some("k".into()),
            ..Default::default()
        });
        assert!(chain.is_configured());
    }
}
