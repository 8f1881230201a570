//! Bounded headless-browser pool.
//!
//! At most three pages render concurrently; saturation fails fast so
//! backpressure reaches the client as a 503 instead of a queue. The
//! underlying browser launches on demand and survives across pages; a
//! disconnected browser gets a single, serialised relaunch attempt. Every
//! sub-request a page issues is intercepted and checked against the host
//! guard before it leaves the process.

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tidemark_types::{ConvertError, Result};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Hard cap on concurrently active pages.
    pub max_pages: usize,
    /// Budget for each navigation wait strategy.
    pub nav_timeout: Duration,
    /// Body-text wait after a clean (network-idle) navigation.
    pub text_wait_fast: Duration,
    /// Body-text wait after the DOM-content fallback.
    pub text_wait_slow: Duration,
    /// Visible text length that counts as "rendered".
    pub min_body_chars: usize,
    pub user_agent: String,
    pub viewport: (u32, u32),
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            max_pages: 3,
            nav_timeout: Duration::from_secs(15),
            text_wait_fast: Duration::from_secs(2),
            text_wait_slow: Duration::from_secs(8),
            min_body_chars: 200,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                .to_string(),
            viewport: (1280, 800),
        }
    }
}

struct BrowserState {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

pub struct BrowserPool {
    config: BrowserPoolConfig,
    permits: Arc<Semaphore>,
    // Also serialises launch/relaunch: whoever holds the lock relaunches.
    state: Mutex<Option<BrowserState>>,
}

impl BrowserPool {
    pub fn new(config: BrowserPoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_pages));
        Self {
            config,
            permits,
            state: Mutex::new(None),
        }
    }

    /// Whether a browser is currently launched.
    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Pages currently available before the pool saturates.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Render `url` and return the final HTML. Fails fast with
    /// `BrowserPoolExhausted` when all slots are busy.
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {
        let page = self.acquire().await?;
        let result = self.navigate_and_read(&page).await;
        page.release().await;
        result.map(|html| {
            debug!(url = %url, bytes = html.len(), "browser render complete");
            html
        })
    }

    async fn navigate_and_read(&self, guard: &PageGuard) -> Result<String> {
        guard.navigate(&guard.target).await?;
        guard
            .page
            .content()
            .await
            .map_err(|e| ConvertError::BrowserNavigationFailed(format!("content read: {e}")))
    }

    /// Acquire a page slot. The page is created in a fresh context with the
    /// pool's user agent, viewport, and sub-request interception installed.
    pub async fn acquire_for(&self, url: &Url) -> Result<PageGuard> {
        let mut guard = self.acquire().await?;
        guard.target = url.clone();
        Ok(guard)
    }

    async fn acquire(&self) -> Result<PageGuard> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| ConvertError::BrowserPoolExhausted)?;

        let page = self.new_page().await?;
        let interceptor = install_interceptor(&page).await?;

        Ok(PageGuard {
            page,
            target: Url::parse("about:blank").expect("static url"),
            config: self.config.clone(),
            _permit: permit,
            interceptor,
        })
    }

    /// Create a page, relaunching the browser once if it went away.
    async fn new_page(&self) -> Result<Page> {
        let mut state = self.state.lock().await;

        if state.is_none() {
            *state = Some(self.launch().await?);
        }
        let browser_state = state
            .as_ref()
            .ok_or_else(|| ConvertError::internal("browser state missing"))?;

        match browser_state.browser.new_page("about:blank").await {
            Ok(page) => {
                self.prepare_page(&page).await?;
                Ok(page)
            }
            Err(err) => {
                warn!(error = %err, "browser page creation failed, relaunching");
                if let Some(old) = state.take() {
                    old.handler_task.abort();
                }
                let relaunched = self.launch().await?;
                let page = relaunched
                    .browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| {
                        ConvertError::BrowserNavigationFailed(format!("page after relaunch: {e}"))
                    })?;
                *state = Some(relaunched);
                self.prepare_page(&page).await?;
                Ok(page)
            }
        }
    }

    async fn prepare_page(&self, page: &Page) -> Result<()> {
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| ConvertError::BrowserNavigationFailed(format!("user agent: {e}")))?;
        Ok(())
    }

    async fn launch(&self) -> Result<BrowserState> {
        info!("launching headless browser");
        let (width, height) = self.config.viewport;
        let config = BrowserConfig::builder()
            .window_size(width, height)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-background-timer-throttling")
            .build()
            .map_err(|e| ConvertError::internal(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ConvertError::internal(format!("browser launch: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser event error");
                }
            }
            debug!("browser event handler ended");
        });

        Ok(BrowserState {
            browser,
            handler_task,
        })
    }

    /// Tear the browser down; the next acquire relaunches.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut old) = state.take() {
            let _ = old.browser.close().await;
            old.handler_task.abort();
            info!("browser closed");
        }
    }
}

/// Intercept every sub-request through the CDP Fetch domain; requests whose
/// host fails the guard are aborted before they leave the process.
async fn install_interceptor(page: &Page) -> Result<tokio::task::JoinHandle<()>> {
    page.execute(EnableParams::default())
        .await
        .map_err(|e| ConvertError::BrowserNavigationFailed(format!("fetch enable: {e}")))?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| ConvertError::BrowserNavigationFailed(format!("event listener: {e}")))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let request_id = event.request_id.clone();
            let url = event.request.url.clone();
            let outcome = if tidemark_guard::is_host_allowed(&url) {
                page.execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            } else {
                debug!(url, "sub-request blocked");
                page.execute(FailRequestParams::new(request_id, ErrorReason::AccessDenied))
                    .await
                    .map(|_| ())
            };
            if let Err(err) = outcome {
                debug!(error = %err, "interception response failed");
            }
        }
    }))
}

/// An acquired page. Holds the pool permit; release tears down the page.
pub struct PageGuard {
    page: Page,
    target: Url,
    config: BrowserPoolConfig,
    _permit: OwnedSemaphorePermit,
    interceptor: tokio::task::JoinHandle<()>,
}

impl PageGuard {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Two-stage navigation: wait for network idle, fall back to DOM
    /// content, then poll for rendered body text.
    pub async fn navigate(&self, url: &Url) -> Result<()> {
        let nav = self.config.nav_timeout;

        let network_idle = timeout(nav, async {
            self.page
                .goto(url.as_str())
                .await
                .map_err(|e| ConvertError::BrowserNavigationFailed(format!("goto: {e}")))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| ConvertError::BrowserNavigationFailed(format!("navigation: {e}")))?;
            Ok::<_, ConvertError>(())
        })
        .await;

        let text_budget = match network_idle {
            Ok(Ok(())) => self.config.text_wait_fast,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                debug!(url = %url, "network-idle wait timed out, retrying with DOM-content wait");
                self.wait_dom_content(nav).await?;
                self.config.text_wait_slow
            }
        };

        self.wait_for_body_text(text_budget).await;
        Ok(())
    }

    async fn wait_dom_content(&self, budget: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let ready: bool = self
                .page
                .evaluate("document.readyState === 'interactive' || document.readyState === 'complete'")
                .await
                .ok()
                .and_then(|v| v.into_value().ok())
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ConvertError::BrowserNavigationFailed(
                    "both navigation waits timed out".into(),
                ));
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// Poll until the body's visible text passes the threshold or the
    /// budget runs out. Thin pages are not an error; the extractor decides.
    async fn wait_for_body_text(&self, budget: Duration) {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let chars: u64 = self
                .page
                .evaluate("document.body ? document.body.innerText.length : 0")
                .await
                .ok()
                .and_then(|v| v.into_value().ok())
                .unwrap_or(0);
            if chars as usize >= self.config.min_body_chars {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(chars, "body text below threshold at deadline");
                return;
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// Tear down the page and free the pool slot.
    pub async fn release(self) {
        self.interceptor.abort();
        if let Err(err) = self.page.close().await {
            debug!(error = %err, "page close failed");
        }
        // Permit drops here, freeing the slot.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_contract() {
        let cfg = BrowserPoolConfig::default();
        assert_eq!(cfg.max_pages, 3);
        assert_eq!(cfg.nav_timeout, Duration::from_secs(15));
        assert_eq!(cfg.text_wait_fast, Duration::from_secs(2));
        assert_eq!(cfg.text_wait_slow, Duration::from_secs(8));
        assert_eq!(cfg.min_body_chars, 200);
    }

    #[tokio::test]
    async fn pool_starts_unlaunched_with_full_permits() {
        let pool = BrowserPool::new(BrowserPoolConfig::default());
        assert!(!pool.is_ready().await);
        assert_eq!(pool.available(), 3);
    }

    #[tokio::test]
    async fn permit_accounting_enforces_the_cap() {
        // Exercise the semaphore discipline directly; launching a real
        // browser is out of scope for unit tests.
        let permits = Arc::new(Semaphore::new(3));
        let p1 = permits.clone().try_acquire_owned().unwrap();
        let _p2 = permits.clone().try_acquire_owned().unwrap();
        let _p3 = permits.clone().try_acquire_owned().unwrap();
        assert!(permits.clone().try_acquire_owned().is_err());
        drop(p1);
        assert!(permits.clone().try_acquire_owned().is_ok());
    }
}
