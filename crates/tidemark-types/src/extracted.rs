use serde::{Deserialize, Serialize};

/// Output of one extraction strategy: either content HTML still to be
/// converted, or markdown built directly (schema.org / OG fallbacks).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedView {
    /// Cleaned content HTML, when the strategy produced a DOM fragment.
    pub content_html: Option<String>,
    /// Pre-built markdown, when the strategy emits markdown directly.
    pub prebuilt_markdown: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    /// Name of the strategy that produced this view, e.g. `readability`.
    pub method: String,
}

impl ExtractedView {
    pub fn from_html(method: &str, html: String) -> Self {
        Self {
            content_html: Some(html),
            method: method.to_string(),
            ..Default::default()
        }
    }

    pub fn from_markdown(method: &str, markdown: String) -> Self {
        Self {
            prebuilt_markdown: Some(markdown),
            method: method.to_string(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }

    /// Whether this view came from one of the high-confidence article
    /// extractors (used by the orchestrator's "good Tier 1" predicate).
    pub fn is_readability_class(&self) -> bool {
        matches!(
            self.method.as_str(),
            "readability" | "readability-cleaned" | "article-extractor" | "defuddle"
        )
    }
}
