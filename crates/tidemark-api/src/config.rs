//! Environment-driven application configuration.

use std::time::Duration;
use tidemark_headless::BrowserPoolConfig;
use tidemark_intelligence::{BaasConfig, LlmConfig};

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Gateway configuration. Everything has a working default; missing LLM or
/// BaaS credentials disable those tiers rather than failing startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: Option<String>,
    pub rate_limit_main: u32,
    pub rate_limit_extract: u32,
    pub rate_limit_batch: u32,
    pub rate_limit_async: u32,
    pub llm: LlmConfig,
    pub baas: BaasConfig,
    pub browser: BrowserPoolConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let llm = LlmConfig {
            base_url: env_var("TIDEMARK_LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: env_var("TIDEMARK_LLM_API_KEY"),
            model: env_var("TIDEMARK_LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(env_parse("TIDEMARK_LLM_TIMEOUT_S", 30)),
        };

        let baas = BaasConfig {
            scrapingbee_key: env_var("TIDEMARK_SCRAPINGBEE_KEY"),
            browserless_key: env_var("TIDEMARK_BROWSERLESS_KEY"),
            scraperapi_key: env_var("TIDEMARK_SCRAPERAPI_KEY"),
            ..Default::default()
        };

        let mut browser = BrowserPoolConfig::default();
        browser.max_pages = env_parse("TIDEMARK_BROWSER_PAGES", browser.max_pages);

        Self {
            redis_url: env_var("TIDEMARK_REDIS_URL").or_else(|| env_var("REDIS_URL")),
            rate_limit_main: env_parse("TIDEMARK_RATE_LIMIT_MAIN", 60),
            rate_limit_extract: env_parse("TIDEMARK_RATE_LIMIT_EXTRACT", 10),
            rate_limit_batch: env_parse("TIDEMARK_RATE_LIMIT_BATCH", 5),
            rate_limit_async: env_parse("TIDEMARK_RATE_LIMIT_ASYNC", 10),
            llm,
            baas,
            browser,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            rate_limit_main: 60,
            rate_limit_extract: 10,
            rate_limit_batch: 5,
            rate_limit_async: 10,
            llm: LlmConfig::default(),
            baas: BaasConfig::default(),
            browser: BrowserPoolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rate_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.rate_limit_main, 60);
        assert_eq!(cfg.rate_limit_extract, 10);
        assert_eq!(cfg.rate_limit_batch, 5);
        assert_eq!(cfg.rate_limit_async, 10);
        assert!(cfg.redis_url.is_none());
    }
}
