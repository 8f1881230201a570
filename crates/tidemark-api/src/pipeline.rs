//! The conversion orchestrator: fast paths, the tiered HTML escalation
//! chain, the LLM/BaaS race, post-processing, and cache writes.

use crate::state::AppState;
use std::time::Instant;
use tidemark_cache::{conversion_key, tier_ttl, CacheSource};
use tidemark_extract as extract;
use tidemark_intelligence::extract_content;
use tidemark_markdown::{
    clean_markdown, count_tokens, html_to_markdown, prune_markdown, quality, resolve_urls,
    to_citations,
};
use tidemark_types::{
    ConversionResult, ConvertError, ConvertOptions, ExtractedView, FetchedPayload, Links, Mode,
    Quality, Result,
};
use tracing::{debug, info, warn};
use url::Url;

/// Scores at or above this make a tier "good enough".
const GOOD_SCORE: f64 = 0.6;
/// Below this, the BaaS tier is considered even without a challenge.
const BAAS_SCORE: f64 = 0.4;

/// A conversion plus where it came from, for the `x-cache` header.
pub struct ConversionOutcome {
    pub result: ConversionResult,
    pub cache_hit: Option<CacheSource>,
}

/// One tier's scored output.
#[derive(Clone)]
struct Candidate {
    markdown: String,
    title: Option<String>,
    excerpt: Option<String>,
    byline: Option<String>,
    site_name: Option<String>,
    method: String,
    tier: String,
    quality: Quality,
    readability: bool,
}

impl Candidate {
    fn from_view(view: &ExtractedView, tier: &str, base: Option<&Url>) -> Self {
        let raw = match (&view.prebuilt_markdown, &view.content_html) {
            (Some(md), _) => md.clone(),
            (None, Some(html)) => html_to_markdown(html),
            (None, None) => String::new(),
        };
        let mut markdown = clean_markdown(&raw);
        if let Some(base) = base {
            markdown = resolve_urls(&markdown, base);
        }
        let score = quality::score(&markdown);
        Self {
            markdown,
            title: view.title.clone(),
            excerpt: view.excerpt.clone(),
            byline: view.byline.clone(),
            site_name: view.site_name.clone(),
            method: view.method.clone(),
            tier: tier.to_string(),
            quality: score,
            readability: view.is_readability_class(),
        }
    }

    /// For content that is already Markdown (feeds, documents, transcripts,
    /// LLM output).
    fn from_markdown(markdown: String, title: Option<String>, tier: &str, method: &str) -> Self {
        let score = quality::score(&markdown);
        Self {
            markdown,
            title,
            excerpt: None,
            byline: None,
            site_name: None,
            method: method.to_string(),
            tier: tier.to_string(),
            quality: score,
            readability: false,
        }
    }

    fn score(&self) -> f64 {
        self.quality.score
    }
}

/// Decision inputs for the escalation predicates, kept pure for testing.
#[derive(Debug, Default, Clone, Copy)]
struct TierFacts {
    tier1_failed: bool,
    challenge_title: bool,
    upstream_4xx: bool,
    good_tier1: bool,
    force_browser: bool,
    skip_fetch: bool,
}

fn cf_poisoned(facts: &TierFacts) -> bool {
    facts.challenge_title && !facts.skip_fetch && !facts.force_browser
}

fn needs_browser(facts: &TierFacts) -> bool {
    if facts.skip_fetch {
        return true;
    }
    !cf_poisoned(facts)
        && !facts.upstream_4xx
        && (facts.tier1_failed || facts.challenge_title || facts.force_browser || !facts.good_tier1)
}

fn needs_llm(html_available: bool, current_score: f64) -> bool {
    html_available && current_score < GOOD_SCORE
}

fn needs_baas(configured: bool, poisoned: bool, current_score: f64, skip_baas: bool) -> bool {
    configured && (poisoned || current_score < BAAS_SCORE) && !skip_baas
}

/// Convert `url` per `options`, consulting and populating the cache.
pub async fn convert(
    state: &AppState,
    url: &Url,
    options: &ConvertOptions,
) -> Result<ConversionOutcome> {
    let key = conversion_key(url, &options.fingerprint_suffix());

    if let Some((raw, source)) = state.cache.get(&key).await {
        match serde_json::from_slice::<ConversionResult>(&raw) {
            Ok(result) => {
                state
                    .metrics
                    .cache_events
                    .with_label_values(&[source.as_str(), "hit"])
                    .inc();
                debug!(key, source = source.as_str(), "cache hit");
                return Ok(ConversionOutcome {
                    result,
                    cache_hit: Some(source),
                });
            }
            Err(err) => warn!(key, %err, "discarding undecodable cache entry"),
        }
    }
    state
        .metrics
        .cache_events
        .with_label_values(&["primary", "miss"])
        .inc();

    let started = Instant::now();
    let result = build_conversion(state, url, options, started).await?;

    if let Ok(raw) = serde_json::to_vec(&result) {
        state.cache.set(&key, &raw, tier_ttl(&result.tier)).await;
    }
    state
        .metrics
        .conversions_total
        .with_label_values(&[result.tier.as_str()])
        .inc();
    state
        .metrics
        .conversion_seconds
        .with_label_values(&[result.tier.as_str()])
        .observe(started.elapsed().as_secs_f64());

    Ok(ConversionOutcome {
        result,
        cache_hit: None,
    })
}

/// Like [`convert`], but on a detached task: a client disconnect drops the
/// handler future, and a conversion that has already started should still
/// complete so its result populates the cache.
pub async fn convert_detached(
    state: &AppState,
    url: &Url,
    options: &ConvertOptions,
) -> Result<ConversionOutcome> {
    let state = state.clone();
    let url = url.clone();
    let options = options.clone();
    match tokio::spawn(async move { convert(&state, &url, &options).await }).await {
        Ok(outcome) => outcome,
        Err(join_err) => Err(ConvertError::internal(format!(
            "conversion task: {join_err}"
        ))),
    }
}

async fn build_conversion(
    state: &AppState,
    url: &Url,
    options: &ConvertOptions,
    started: Instant,
) -> Result<ConversionResult> {
    // YouTube fast path; no transcript falls through to the HTML tiers.
    if tidemark_youtube::video_id(url).is_some() {
        if let Some(transcript) = state.youtube.transcript(url).await {
            info!(url = %url, "transcript fast path");
            let candidate = Candidate::from_markdown(
                transcript.markdown,
                Some(transcript.title),
                "youtube",
                "markdown-direct",
            );
            return Ok(finalize(candidate, options, Vec::new(), false, url, started));
        }
        debug!(url = %url, "no transcript, continuing with HTML tiers");
    }

    let mut escalation: Vec<String> = Vec::new();
    let mut current: Option<Candidate> = None;
    let mut page_html: Option<(String, Url)> = None;
    let mut fetch_error: Option<String> = None;
    let mut browser_error: Option<String> = None;
    let mut cf_challenge = false;
    let mut facts = TierFacts {
        force_browser: options.force_browser,
        skip_fetch: options.skip_fetch,
        ..Default::default()
    };

    // ---- Tier 1: plain fetch ----
    if options.skip_fetch {
        escalation.push("fetch skipped".to_string());
        facts.tier1_failed = true;
    } else {
        match state.fetcher.fetch(url).await {
            Ok(FetchedPayload::Feed { xml, final_url }) => {
                let feed = tidemark_feeds::render_feed(&xml, final_url.as_str())?;
                let candidate =
                    Candidate::from_markdown(feed.markdown, feed.title, "feed", "markdown-direct");
                return Ok(finalize(candidate, options, escalation, false, url, started));
            }
            Ok(FetchedPayload::Document { bytes, format }) => {
                let doc = tidemark_documents::decode(bytes, format).await?;
                let tier = format!("document:{format}");
                let candidate =
                    Candidate::from_markdown(doc.markdown, doc.title, &tier, "markdown-direct");
                return Ok(finalize(candidate, options, escalation, false, url, started));
            }
            Ok(FetchedPayload::Html { html, final_url }) => {
                let view = extract::extract(&html, final_url.as_str());
                let candidate = Candidate::from_view(&view, "fetch", Some(&final_url));
                if candidate
                    .title
                    .as_deref()
                    .map_or(false, extract::title_is_challenge)
                {
                    facts.challenge_title = true;
                    cf_challenge = true;
                    escalation.push(format!(
                        "challenge page detected: {}",
                        candidate.title.as_deref().unwrap_or_default()
                    ));
                }
                page_html = Some((html, final_url));
                current = Some(candidate);
            }
            Ok(FetchedPayload::Challenge { html, reason }) => {
                facts.challenge_title = true;
                facts.tier1_failed = true;
                cf_challenge = true;
                escalation.push(format!("challenge page detected: {reason}"));
                page_html = Some((html, url.clone()));
            }
            Err(err @ ConvertError::BlockedUrl(_)) => return Err(err),
            Err(err) => {
                facts.tier1_failed = true;
                facts.upstream_4xx =
                    matches!(&err, ConvertError::UpstreamHttp { status, .. } if (400..500).contains(status));
                escalation.push(format!("fetch failed ({err})"));
                fetch_error = Some(err.to_string());
            }
        }
    }

    facts.good_tier1 = current
        .as_ref()
        .map_or(false, |c| c.readability || c.score() >= GOOD_SCORE);

    // ---- Tier 2: headless browser ----
    if needs_browser(&facts) {
        if let Some(cand) = &current {
            if !facts.good_tier1 && !facts.challenge_title {
                escalation.push(format!(
                    "low quality {:.2} via {}",
                    cand.score(),
                    cand.method
                ));
            }
        }
        if options.force_browser {
            escalation.push("browser forced".to_string());
        }
        state
            .metrics
            .escalations_total
            .with_label_values(&["browser"])
            .inc();

        match state.browser.fetch_html(url).await {
            Ok(html) => {
                let view = extract::extract(&html, url.as_str());
                let candidate = Candidate::from_view(&view, "browser", Some(url));
                let better = current
                    .as_ref()
                    .map_or(true, |cur| candidate.score() > cur.score());
                if better {
                    if candidate
                        .title
                        .as_deref()
                        .map_or(false, extract::title_is_challenge)
                    {
                        escalation.push("challenge page persists in browser".to_string());
                    } else {
                        cf_challenge = false;
                    }
                    page_html = Some((html, url.clone()));
                    current = Some(candidate);
                }
            }
            // Silent downgrade: record the failure, keep the Tier-1 result.
            Err(err) => {
                escalation.push(format!("browser failed: {err}"));
                browser_error = Some(err.to_string());
            }
        }
        let pages_in_use = state
            .config
            .browser
            .max_pages
            .saturating_sub(state.browser.available());
        state.metrics.browser_pages_in_use.set(pages_in_use as i64);
    }

    // ---- Tier 2.5 / 3: LLM and BaaS, raced when both are wanted ----
    let current_score = current.as_ref().map_or(0.0, Candidate::score);
    let poisoned = cf_poisoned(&facts);
    let want_llm =
        state.llm.is_configured() && needs_llm(page_html.is_some(), current_score);
    let want_baas = needs_baas(
        state.baas.is_configured(),
        poisoned,
        current_score,
        options.skip_baas,
    );

    if want_llm || want_baas {
        match (want_llm, want_baas, poisoned) {
            (true, true, _) => {
                escalation.push(format!("quality {current_score:.2} → racing LLM + BaaS"))
            }
            (true, false, _) => escalation.push(format!("quality {current_score:.2} → trying LLM")),
            (false, true, true) => escalation.push("CF challenge → trying BaaS".to_string()),
            (false, true, false) => {
                escalation.push(format!("quality {current_score:.2} → trying BaaS"))
            }
            (false, false, _) => unreachable!("guarded by want_llm || want_baas"),
        }

        let llm_task = async {
            if !want_llm {
                return None;
            }
            state.metrics.escalations_total.with_label_values(&["llm"]).inc();
            let (html, base) = page_html.as_ref()?;
            match extract_content(&state.llm, html).await {
                Ok(markdown) => {
                    let markdown = resolve_urls(&clean_markdown(&markdown), base);
                    Some(Ok(Candidate::from_markdown(markdown, None, "llm", "llm")))
                }
                Err(err) => Some(Err(err)),
            }
        };

        let baas_task = async {
            if !want_baas {
                return None;
            }
            state.metrics.escalations_total.with_label_values(&["baas"]).inc();
            match state.baas.render(url.as_str()).await {
                Ok(rendered) => {
                    let view = extract::extract(&rendered.html, url.as_str());
                    let mut candidate = Candidate::from_view(&view, "baas", Some(url));
                    candidate.tier = format!("baas:{}", rendered.provider);
                    Some(Ok(candidate))
                }
                Err(err) => Some(Err(err)),
            }
        };

        let (llm_outcome, baas_outcome) = tokio::join!(llm_task, baas_task);

        for (label, outcome) in [("LLM", llm_outcome), ("BaaS", baas_outcome)] {
            match outcome {
                Some(Ok(candidate)) => {
                    let better = current
                        .as_ref()
                        .map_or(true, |cur| candidate.score() > cur.score());
                    if better {
                        let is_baas = candidate.tier.starts_with("baas:");
                        // Keep the page title when the LLM did not produce one.
                        let mut candidate = candidate;
                        if candidate.title.is_none() {
                            candidate.title = current.as_ref().and_then(|c| c.title.clone());
                        }
                        if is_baas && cf_challenge {
                            cf_challenge = false;
                        }
                        current = Some(candidate);
                    }
                }
                Some(Err(err)) => escalation.push(format!("{label} failed: {err}")),
                None => {}
            }
        }
    }

    match current {
        Some(candidate) => Ok(finalize(
            candidate, options, escalation, cf_challenge, url, started,
        )),
        None => Err(ConvertError::Internal(format!(
            "conversion failed; fetch: {}; browser: {}",
            fetch_error.as_deref().unwrap_or("not attempted"),
            browser_error.as_deref().unwrap_or("not attempted"),
        ))),
    }
}

/// Post-processing, applied exactly once after the final tier is chosen.
fn finalize(
    candidate: Candidate,
    options: &ConvertOptions,
    escalation: Vec<String>,
    cf_challenge: bool,
    url: &Url,
    started: Instant,
) -> ConversionResult {
    let mut markdown = candidate.markdown;
    if options.links == Links::Citations {
        markdown = to_citations(&markdown);
    }
    let mut tokens = count_tokens(&markdown);

    let fit_markdown = prune_markdown(&markdown, options.max_tokens, tokens);
    let fit_tokens = count_tokens(&fit_markdown);

    if options.mode == Mode::Fit {
        markdown = fit_markdown.clone();
        tokens = fit_tokens;
    }

    ConversionResult {
        title: candidate.title.unwrap_or_default(),
        markdown,
        fit_markdown,
        tokens,
        fit_tokens,
        tier: candidate.tier,
        method: candidate.method,
        quality: candidate.quality,
        readability: candidate.readability,
        excerpt: candidate.excerpt,
        byline: candidate.byline,
        site_name: candidate.site_name,
        url: url.to_string(),
        total_ms: started.elapsed().as_millis() as u64,
        cf_challenge: cf_challenge.then_some(true),
        escalation: (!escalation.is_empty()).then_some(escalation),
    }
}
