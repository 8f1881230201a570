//! Webhook delivery with bounded exponential backoff.
//!
//! Delivery never blocks the submitter or the job-status update: the whole
//! retry schedule runs in a detached task. Callback URLs are validated at
//! submit time with the same host rules as every other outbound URL, plus
//! an HTTPS requirement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tidemark_guard::{check_callback_syntactic, UrlGuard};
use tidemark_types::{Job, Result};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Delay before each attempt, in order; its length is the attempt cap.
    pub attempt_delays: Vec<Duration>,
    pub attempt_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            attempt_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(25),
            ],
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct WebhookDeliverer {
    http: reqwest::Client,
    guard: UrlGuard,
    config: WebhookConfig,
    /// Deliveries that exhausted every attempt; exported as a metric.
    failures: Arc<AtomicU64>,
}

impl WebhookDeliverer {
    pub fn new(guard: UrlGuard, config: WebhookConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.attempt_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            guard,
            config,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn failed_deliveries(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Submit-time validation: HTTPS, host rules, DNS.
    pub async fn validate_callback(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw)
            .map_err(|e| tidemark_types::ConvertError::BlockedUrl(format!("callback URL: {e}")))?;
        check_callback_syntactic(&url)?;
        self.guard.check(&url).await?;
        Ok(url)
    }

    /// Fire-and-forget delivery of the job's terminal state.
    pub fn deliver(&self, job: &Job) {
        let Some(callback) = job.callback_url.clone() else {
            return;
        };
        let payload = serde_json::json!({
            "job_id": job.id,
            "status": job.status,
            "result": job.result,
            "error": job.error,
        });

        let http = self.http.clone();
        let delays = self.config.attempt_delays.clone();
        let failures = self.failures.clone();
        let job_id = job.id.clone();

        tokio::spawn(async move {
            for (attempt, delay) in delays.iter().enumerate() {
                tokio::time::sleep(*delay).await;
                match http.post(&callback).json(&payload).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(job_id, attempt, "webhook delivered");
                        return;
                    }
                    Ok(response) => {
                        warn!(
                            job_id,
                            attempt,
                            status = response.status().as_u16(),
                            "webhook attempt rejected"
                        );
                    }
                    Err(err) => {
                        warn!(job_id, attempt, error = %err, "webhook attempt failed");
                    }
                }
            }
            failures.fetch_add(1, Ordering::Relaxed);
            warn!(job_id, "webhook delivery exhausted all attempts");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::{ConversionResult, ConvertOptions};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> WebhookConfig {
        WebhookConfig {
            attempt_delays: vec![Duration::from_millis(10), Duration::from_millis(10)],
            attempt_timeout: Duration::from_secs(2),
        }
    }

    fn job_with_callback(callback: &str) -> Job {
        let mut job = Job::new(
            "abc123def456".into(),
            "https://example.com".into(),
            ConvertOptions::default(),
            Some(callback.to_string()),
        );
        job.complete(ConversionResult::empty("https://example.com"));
        job
    }

    #[tokio::test]
    async fn callback_validation_requires_https_and_public_host() {
        let deliverer = WebhookDeliverer::new(UrlGuard::new(), WebhookConfig::default());
        assert!(deliverer
            .validate_callback("http://hooks.example.com/cb")
            .await
            .is_err());
        assert!(deliverer
            .validate_callback("https://169.254.169.254/cb")
            .await
            .is_err());
        assert!(deliverer
            .validate_callback("https://[::1]/cb")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delivers_the_job_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let deliverer = WebhookDeliverer::new(UrlGuard::new(), fast_config());
        deliverer.deliver(&job_with_callback(&format!("{}/cb", server.uri())));

        // Wait out the first delay plus slack.
        tokio::time::sleep(Duration::from_millis(300)).await;
        server.verify().await;
        assert_eq!(deliverer.failed_deliveries(), 0);
    }

    #[tokio::test]
    async fn retries_then_counts_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let deliverer = WebhookDeliverer::new(UrlGuard::new(), fast_config());
        deliverer.deliver(&job_with_callback(&format!("{}/cb", server.uri())));

        tokio::time::sleep(Duration::from_millis(500)).await;
        server.verify().await;
        assert_eq!(deliverer.failed_deliveries(), 1);
    }

    #[tokio::test]
    async fn no_callback_means_no_delivery() {
        let deliverer = WebhookDeliverer::new(UrlGuard::new(), fast_config());
        let mut job = Job::new(
            "abc123def456".into(),
            "https://example.com".into(),
            ConvertOptions::default(),
            None,
        );
        job.fail("x".into());
        deliverer.deliver(&job);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(deliverer.failed_deliveries(), 0);
    }

    #[test]
    fn default_schedule_matches_contract() {
        let cfg = WebhookConfig::default();
        assert_eq!(
            cfg.attempt_delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(25)
            ]
        );
        assert_eq!(cfg.attempt_timeout, Duration::from_secs(10));
    }
}
