//! Multi-pass content extraction.
//!
//! Strategies run in a fixed order; the first view that passes the usable
//! predicate and the ratio gate wins. The raw body is the absolute fallback
//! and is accepted unconditionally.

pub mod cleaner;
pub mod strategies;

pub use cleaner::{clean_html, raw_text_len};

use scraper::Html;
use tidemark_markdown::patterns;
use tidemark_types::ExtractedView;
use tracing::debug;

/// Minimum extracted text for HTML-producing strategies.
const MIN_TEXT_HTML: usize = 200;
/// Minimum extracted text for schema/meta strategies.
const MIN_TEXT_META: usize = 100;
/// Ratio gate: extracted text below this share of the raw text is suspect.
const RATIO_FLOOR: f64 = 0.15;
/// ...unless it clears this absolute escape hatch.
const RATIO_ESCAPE_CHARS: usize = 1000;
/// The ratio gate does not apply to pages this small.
const RATIO_MIN_RAW: usize = 500;

/// Run the strategy chain over an HTML payload.
pub fn extract(html: &str, url: &str) -> ExtractedView {
    let raw_len = cleaner::raw_text_len(html);

    let attempts: Vec<(&str, Option<ExtractedView>)> = vec![
        ("readability", strategies::readability(html, url)),
        ("defuddle", strategies::defuddle(html)),
        ("article-extractor", strategies::article_extractor(html)),
        ("readability-cleaned", strategies::readability_cleaned(html, url)),
        ("css-selector", strategies::css_probe(html)),
        ("schema-org", strategies::schema_org(html)),
        ("meta-fallback", strategies::meta_fallback(html)),
        ("text-density", strategies::text_density(html)),
        ("cleaned-body", strategies::cleaned_body(html)),
    ];

    for (name, attempt) in attempts {
        let Some(view) = attempt else {
            continue;
        };
        let text = view_text(&view);
        if !is_usable(&view, &text) {
            debug!(strategy = name, chars = text.chars().count(), "view not usable");
            continue;
        }
        if rejected_by_ratio_gate(raw_len, text.chars().count()) {
            debug!(strategy = name, raw_len, "rejected by ratio gate");
            continue;
        }
        debug!(strategy = name, "extraction strategy accepted");
        return view;
    }

    debug!("all strategies exhausted, falling back to raw body");
    strategies::raw_body(html)
}

/// Plain text of a view, whichever representation it carries.
pub fn view_text(view: &ExtractedView) -> String {
    if let Some(html) = &view.content_html {
        let doc = Html::parse_document(html);
        doc.root_element().text().collect::<Vec<_>>().join(" ")
    } else if let Some(md) = &view.prebuilt_markdown {
        md.clone()
    } else {
        String::new()
    }
}

fn is_usable(view: &ExtractedView, text: &str) -> bool {
    let min = if view.prebuilt_markdown.is_some() {
        MIN_TEXT_META
    } else {
        MIN_TEXT_HTML
    };
    let trimmed = text.trim();
    trimmed.chars().count() >= min && !patterns::contains_error_pattern(trimmed)
}

fn rejected_by_ratio_gate(raw_len: usize, extracted_len: usize) -> bool {
    if raw_len <= RATIO_MIN_RAW {
        return false;
    }
    (extracted_len as f64) < (raw_len as f64 * RATIO_FLOOR)
        && extracted_len < RATIO_ESCAPE_CHARS
}

/// Challenge detection over an extracted (or document) title.
pub fn title_is_challenge(title: &str) -> bool {
    patterns::contains_error_pattern(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<html><head><title>Page</title></head><body>{body}</body></html>")
    }

    fn long_article_body() -> String {
        let mut paras = String::new();
        for i in 0..8 {
            paras.push_str(&format!(
                "<p>Paragraph {i}: the tide rises and falls under the gravitational \
                 pull of the moon, and the coastline funnels it into dramatic ranges \
                 that sailors have charted for centuries.</p>"
            ));
        }
        format!("<article><h1>Tides</h1>{paras}</article>")
    }

    #[test]
    fn good_article_lands_on_a_readability_class_method() {
        let html = page(&long_article_body());
        let view = extract(&html, "https://example.com/tides");
        assert!(
            view.is_readability_class(),
            "unexpected method {}",
            view.method
        );
        assert!(view_text(&view).contains("gravitational"));
    }

    #[test]
    fn challenge_text_is_never_usable() {
        let view = ExtractedView::from_html(
            "readability",
            "<p>Just a moment... checking your browser before accessing</p>".into(),
        );
        let text = view_text(&view);
        assert!(!is_usable(&view, &text));
    }

    #[test]
    fn ratio_gate_skips_small_pages() {
        assert!(!rejected_by_ratio_gate(400, 10));
        assert!(rejected_by_ratio_gate(10_000, 500));
    }

    #[test]
    fn ratio_gate_escape_hatch() {
        // Shell-heavy app with a small real payload: 1200 extracted chars out
        // of 100k raw still passes.
        assert!(!rejected_by_ratio_gate(100_000, 1200));
        assert!(rejected_by_ratio_gate(100_000, 900));
    }

    #[test]
    fn empty_page_falls_back_to_raw_body() {
        let view = extract(&page("<p>tiny</p>"), "https://example.com/");
        assert_eq!(view.method, "raw-body");
    }

    #[test]
    fn title_challenge_detection() {
        assert!(title_is_challenge("Just a moment..."));
        assert!(title_is_challenge("Access Denied"));
        assert!(!title_is_challenge("Tides Explained"));
    }
}
