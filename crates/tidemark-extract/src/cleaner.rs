//! Junk removal: strips chrome, consent walls, and visually hidden nodes
//! from a document before extraction or LLM hand-off.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

const JUNK_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside",
];

const JUNK_ROLES: &[&str] = &["navigation", "banner", "contentinfo", "complementary"];

const JUNK_SUBSTRINGS: &[&str] = &[
    "cookie",
    "consent",
    "gdpr",
    "popup",
    "modal",
    "overlay",
    "sidebar",
    "widget",
    "advert",
    "social-share",
    "newsletter",
    "subscribe",
];

static HIDDEN_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)display\s*:\s*none|visibility\s*:\s*hidden|font-size\s*:\s*0(?:px|\s|;|$)|(?:left|top|text-indent)\s*:\s*-\d{3,}|clip\s*:\s*rect\(\s*0",
    )
    .expect("static regex")
});

fn token_is_junk(token: &str) -> bool {
    let t = token.to_ascii_lowercase();
    if JUNK_SUBSTRINGS.iter().any(|s| t.contains(s)) {
        return true;
    }
    t == "ad"
        || t == "ads"
        || t.starts_with("ad-")
        || t.starts_with("ads-")
        || t.starts_with("share-")
}

fn is_junk_element(el: ElementRef) -> bool {
    let v = el.value();
    if JUNK_TAGS.contains(&v.name()) {
        return true;
    }
    if let Some(role) = v.attr("role") {
        if JUNK_ROLES.contains(&role.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    if v.attr("aria-hidden") == Some("true") {
        return true;
    }
    if v.classes().any(token_is_junk) {
        return true;
    }
    if let Some(id) = v.id() {
        if token_is_junk(id) {
            return true;
        }
    }
    if let Some(style) = v.attr("style") {
        if HIDDEN_STYLE_RE.is_match(style) {
            return true;
        }
    }
    false
}

/// Remove junk subtrees and return the re-serialised document.
pub fn clean_html(html: &str) -> String {
    let mut doc = Html::parse_document(html);

    let junk_ids: Vec<ego_tree::NodeId> = doc
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| is_junk_element(*el))
        .map(|el| el.id())
        .collect();

    for id in junk_ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    doc.html()
}

/// Text length of the document after stripping script/style/noscript only.
/// This is the denominator for the extractor's ratio gate.
pub fn raw_text_len(html: &str) -> usize {
    let doc = Html::parse_document(html);
    let mut total = 0usize;
    for node in doc.tree.root().descendants() {
        if let scraper::node::Node::Text(t) = node.value() {
            let in_script = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|el| matches!(el.value().name(), "script" | "style" | "noscript"));
            if !in_script {
                total += t.trim().chars().count();
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_structural_chrome() {
        let html = "<body><nav>menu</nav><article>content</article><footer>foot</footer></body>";
        let cleaned = clean_html(html);
        assert!(cleaned.contains("content"));
        assert!(!cleaned.contains("menu"));
        assert!(!cleaned.contains("foot"));
    }

    #[test]
    fn strips_consent_and_ad_classes() {
        let html = r#"<body>
            <div class="cookie-banner">accept</div>
            <div class="ad-slot">buy</div>
            <div class="thread-item">keep me</div>
            <p>body</p>
        </body>"#;
        let cleaned = clean_html(html);
        assert!(!cleaned.contains("accept"));
        assert!(!cleaned.contains("buy"));
        assert!(cleaned.contains("keep me"));
        assert!(cleaned.contains("body"));
    }

    #[test]
    fn strips_aria_and_roles() {
        let html = r#"<body><div role="banner">b</div><div aria-hidden="true">h</div><p>x</p></body>"#;
        let cleaned = clean_html(html);
        assert!(!cleaned.contains(">b<"));
        assert!(!cleaned.contains(">h<"));
        assert!(cleaned.contains("x"));
    }

    #[test]
    fn strips_hidden_styles() {
        let html = r#"<body>
            <div style="display:none">hidden1</div>
            <div style="position:absolute; left:-9999px">hidden2</div>
            <div style="font-size:0">hidden3</div>
            <p>visible</p>
        </body>"#;
        let cleaned = clean_html(html);
        for hidden in ["hidden1", "hidden2", "hidden3"] {
            assert!(!cleaned.contains(hidden), "{hidden}");
        }
        assert!(cleaned.contains("visible"));
    }

    #[test]
    fn raw_text_excludes_scripts() {
        let html = "<body><script>var x = 'aaaaaaaaaa';</script><p>hello</p></body>";
        assert_eq!(raw_text_len(html), 5);
    }
}
