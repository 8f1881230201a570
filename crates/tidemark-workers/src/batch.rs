//! Batch execution: a fixed worker pool over a shared index counter.
//!
//! Invalid URLs are answered in place without ever reaching a worker slot;
//! each worker enforces the per-URL timeout independently.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tidemark_types::ConversionResult;
use tracing::debug;
use url::Url;

/// Worker pool size for batch conversion.
const WORKERS: usize = 10;
/// Per-URL conversion budget.
const PER_URL_TIMEOUT: Duration = Duration::from_secs(60);

/// One slot of the batch response, index-aligned with the request.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub url: String,
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
}

/// Run `convert` over up to 50 URLs with at most [`WORKERS`] concurrent
/// conversions. Output order matches input order.
pub async fn run_batch<F, Fut>(urls: Vec<String>, convert: F) -> Vec<BatchOutcome>
where
    F: Fn(Url) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = tidemark_types::Result<ConversionResult>> + Send + 'static,
{
    let total = urls.len();
    let slots: Arc<Vec<Mutex<Option<BatchOutcome>>>> =
        Arc::new((0..total).map(|_| Mutex::new(None)).collect());

    // Pre-validate: invalid URLs are answered without consuming a worker.
    let work: Arc<Vec<(usize, Url)>> = Arc::new(
        urls.iter()
            .enumerate()
            .filter_map(|(i, raw)| match Url::parse(raw) {
                Ok(url) => Some((i, url)),
                Err(err) => {
                    set_slot(
                        &slots,
                        i,
                        BatchOutcome {
                            url: raw.clone(),
                            result: None,
                            error: Some(format!("Invalid URL: {err}")),
                        },
                    );
                    None
                }
            })
            .collect(),
    );

    let cursor = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for worker in 0..WORKERS.min(work.len().max(1)) {
        let work = work.clone();
        let cursor = cursor.clone();
        let slots = slots.clone();
        let convert = convert.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let next = cursor.fetch_add(1, Ordering::Relaxed);
                let Some((index, url)) = work.get(next).cloned() else {
                    break;
                };
                debug!(worker, index, url = %url, "batch item start");

                let outcome =
                    match tokio::time::timeout(PER_URL_TIMEOUT, convert(url.clone())).await {
                        Ok(Ok(result)) => BatchOutcome {
                            url: url.to_string(),
                            result: Some(result),
                            error: None,
                        },
                        Ok(Err(err)) => BatchOutcome {
                            url: url.to_string(),
                            result: None,
                            error: Some(err.to_string()),
                        },
                        Err(_) => BatchOutcome {
                            url: url.to_string(),
                            result: None,
                            error: Some("timeout after 60s".to_string()),
                        },
                    };
                set_slot(&slots, index, outcome);
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Arc::try_unwrap(slots)
        .map(|vec| {
            vec.into_iter()
                .map(|slot| {
                    slot.into_inner().unwrap_or_else(|p| p.into_inner()).unwrap_or(
                        BatchOutcome {
                            url: String::new(),
                            result: None,
                            error: Some("internal: slot never filled".into()),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn set_slot(slots: &Arc<Vec<Mutex<Option<BatchOutcome>>>>, index: usize, outcome: BatchOutcome) {
    if let Some(slot) = slots.get(index) {
        if let Ok(mut guard) = slot.lock() {
            *guard = Some(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::ConvertError;

    fn ok_result(url: &Url) -> ConversionResult {
        let mut r = ConversionResult::empty(url.as_str());
        r.markdown = format!("content for {url}");
        r
    }

    #[tokio::test]
    async fn preserves_index_order_with_mixed_validity() {
        let urls = vec![
            "https://good.test/a".to_string(),
            ":::invalid".to_string(),
            "https://good.test/b".to_string(),
        ];
        let outcomes = run_batch(urls, |url| async move { Ok(ok_result(&url)) }).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_some());
        assert!(outcomes[1].error.as_deref().unwrap().contains("Invalid URL"));
        assert!(outcomes[2].result.is_some());
        assert!(outcomes[2].url.ends_with("/b"));
    }

    #[tokio::test]
    async fn conversion_errors_land_in_their_slot() {
        let urls = vec![
            "https://good.test/".to_string(),
            "https://bad.test/".to_string(),
        ];
        let outcomes = run_batch(urls, |url| async move {
            if url.host_str() == Some("bad.test") {
                Err(ConvertError::Timeout("fetch".into()))
            } else {
                Ok(ok_result(&url))
            }
        })
        .await;

        assert!(outcomes[0].result.is_some());
        assert!(outcomes[1].error.as_deref().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn all_invalid_urls_need_no_workers() {
        let outcomes = run_batch(vec!["x".into(), "y".into()], |_url| async move {
            panic!("no valid work expected")
        })
        .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.error.is_some()));
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let outcomes = run_batch(Vec::new(), |url| async move { Ok(ok_result(&url)) }).await;
        assert!(outcomes.is_empty());
    }
}
