//! Prometheus metrics for the gateway.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tidemark_types::Result;

pub struct Metrics {
    pub registry: Registry,
    /// Conversions by final tier.
    pub conversions_total: IntCounterVec,
    /// Cache reads by layer and outcome.
    pub cache_events: IntCounterVec,
    /// Tier transitions by kind (browser/llm/baas/challenge).
    pub escalations_total: IntCounterVec,
    /// Requests refused by the rate limiter.
    pub rate_limited_total: IntCounter,
    /// Webhook deliveries that exhausted all attempts.
    pub webhook_failures: IntGauge,
    /// Conversion latency by tier.
    pub conversion_seconds: HistogramVec,
    /// Browser pages currently checked out.
    pub browser_pages_in_use: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let conversions_total = IntCounterVec::new(
            Opts::new("tidemark_conversions_total", "Conversions by final tier"),
            &["tier"],
        )
        .map_err(prom_err)?;
        let cache_events = IntCounterVec::new(
            Opts::new("tidemark_cache_events_total", "Cache reads by layer and outcome"),
            &["layer", "outcome"],
        )
        .map_err(prom_err)?;
        let escalations_total = IntCounterVec::new(
            Opts::new("tidemark_escalations_total", "Tier escalations by kind"),
            &["kind"],
        )
        .map_err(prom_err)?;
        let rate_limited_total = IntCounter::new(
            "tidemark_rate_limited_total",
            "Requests refused by the rate limiter",
        )
        .map_err(prom_err)?;
        let webhook_failures = IntGauge::new(
            "tidemark_webhook_failures",
            "Webhook deliveries that exhausted all attempts",
        )
        .map_err(prom_err)?;
        let conversion_seconds = HistogramVec::new(
            HistogramOpts::new("tidemark_conversion_seconds", "Conversion latency by tier")
                .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["tier"],
        )
        .map_err(prom_err)?;
        let browser_pages_in_use = IntGauge::new(
            "tidemark_browser_pages_in_use",
            "Browser pages currently checked out",
        )
        .map_err(prom_err)?;

        registry.register(Box::new(conversions_total.clone())).map_err(prom_err)?;
        registry.register(Box::new(cache_events.clone())).map_err(prom_err)?;
        registry.register(Box::new(escalations_total.clone())).map_err(prom_err)?;
        registry.register(Box::new(rate_limited_total.clone())).map_err(prom_err)?;
        registry.register(Box::new(webhook_failures.clone())).map_err(prom_err)?;
        registry.register(Box::new(conversion_seconds.clone())).map_err(prom_err)?;
        registry.register(Box::new(browser_pages_in_use.clone())).map_err(prom_err)?;

        Ok(Self {
            registry,
            conversions_total,
            cache_events,
            escalations_total,
            rate_limited_total,
            webhook_failures,
            conversion_seconds,
            browser_pages_in_use,
        })
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

fn prom_err(err: prometheus::Error) -> tidemark_types::ConvertError {
    tidemark_types::ConvertError::internal(format!("metrics: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_renders() {
        let metrics = Metrics::new().unwrap();
        metrics.conversions_total.with_label_values(&["fetch"]).inc();
        metrics
            .cache_events
            .with_label_values(&["primary", "hit"])
            .inc();
        let text = metrics.render();
        assert!(text.contains("tidemark_conversions_total"));
        assert!(text.contains("tidemark_cache_events_total"));
    }
}
