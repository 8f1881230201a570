//! Shared application state.

use crate::config::AppConfig;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::Instant;
use tidemark_cache::{LayeredCache, MemoryCache, RateLimiter, RedisStorage};
use tidemark_fetch::{FetchConfig, SafeFetcher};
use tidemark_guard::UrlGuard;
use tidemark_headless::BrowserPool;
use tidemark_intelligence::{BaasChain, LlmClient};
use tidemark_types::Result;
use tidemark_workers::{JobStore, WebhookConfig, WebhookDeliverer};
use tidemark_youtube::YoutubeClient;
use tracing::{info, warn};

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub guard: UrlGuard,
    pub fetcher: Arc<SafeFetcher<UrlGuard>>,
    pub browser: Arc<BrowserPool>,
    pub llm: LlmClient,
    pub baas: BaasChain,
    pub youtube: Arc<YoutubeClient>,
    pub cache: Arc<LayeredCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub jobs: JobStore,
    pub webhooks: WebhookDeliverer,
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

impl AppState {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let guard = UrlGuard::new();

        let redis = match &config.redis_url {
            Some(url) => match RedisStorage::connect(url).await {
                Ok(storage) => {
                    info!("redis connected");
                    Some(storage)
                }
                Err(err) => {
                    warn!(%err, "redis unavailable, running on in-process cache only");
                    None
                }
            },
            None => None,
        };

        let fetcher = Arc::new(SafeFetcher::new(guard.clone(), FetchConfig::default())?);
        let browser = Arc::new(BrowserPool::new(config.browser.clone()));
        let llm = LlmClient::new(config.llm.clone());
        let baas = BaasChain::new(config.baas.clone());
        let cache = Arc::new(LayeredCache::new(redis.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(redis.clone()));

        let job_storage: Arc<dyn tidemark_cache::CacheStorage> = match redis {
            Some(storage) => Arc::new(storage),
            None => Arc::new(MemoryCache::new()),
        };
        let jobs = JobStore::new(job_storage);
        let webhooks = WebhookDeliverer::new(guard.clone(), WebhookConfig::default());

        Ok(Self {
            config,
            guard,
            fetcher,
            browser,
            llm,
            baas,
            youtube: Arc::new(YoutubeClient::new()),
            cache,
            rate_limiter,
            jobs,
            webhooks,
            metrics: Arc::new(Metrics::new()?),
            started_at: Instant::now(),
        })
    }
}
