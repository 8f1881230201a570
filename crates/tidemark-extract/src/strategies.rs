//! The individual extraction strategies, in escalation order.
//!
//! Each strategy returns `None` when it has nothing to offer; the extractor
//! applies the usable predicate and ratio gate on top.

use crate::cleaner::clean_html;
use dom_smoothie::{Config, Readability};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tidemark_types::ExtractedView;
use tracing::debug;

/// Schema.org types whose JSON-LD blocks we render.
const SCHEMA_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "BlogPosting",
    "WebPage",
    "VideoObject",
    "Product",
    "Recipe",
    "Review",
];

/// Likely content containers, in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "article.markdown-body",
    "article",
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".article-body",
    ".post-body",
    "#content",
    ".content",
];

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

pub fn doc_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let title = doc
        .select(&sel("title"))
        .next()
        .map(|t| t.text().collect::<String>())?;
    let title = title.trim().to_string();
    (!title.is_empty()).then_some(title)
}

fn element_text_len(el: ElementRef) -> usize {
    el.text().map(|t| t.trim().chars().count()).sum()
}

/// Pass 1: general-purpose readability extraction.
pub fn readability(html: &str, url: &str) -> Option<ExtractedView> {
    run_readability(html, url, "readability")
}

/// Pass 4: readability over a junk-cleaned document.
pub fn readability_cleaned(html: &str, url: &str) -> Option<ExtractedView> {
    let cleaned = clean_html(html);
    run_readability(&cleaned, url, "readability-cleaned")
}

fn run_readability(html: &str, url: &str, method: &str) -> Option<ExtractedView> {
    let cfg = Config::default();
    let mut readability = match Readability::new(html, Some(url), Some(cfg)) {
        Ok(r) => r,
        Err(err) => {
            debug!(method, error = %err, "readability construction failed");
            return None;
        }
    };
    let article = match readability.parse() {
        Ok(a) => a,
        Err(err) => {
            debug!(method, error = %err, "readability parse failed");
            return None;
        }
    };

    let content = article.content.to_string();
    if content.trim().is_empty() {
        return None;
    }

    let mut view = ExtractedView::from_html(method, content);
    let title = article.title.trim().to_string();
    view.title = (!title.is_empty()).then_some(title);
    view.byline = article.byline.clone().filter(|b| !b.trim().is_empty());
    view.excerpt = article.excerpt.clone().filter(|e| !e.trim().is_empty());
    view.site_name = article.site_name.clone().filter(|s| !s.trim().is_empty());
    Some(view)
}

/// Pass 2: semantic-container extraction. Prefers the densest of the
/// document's explicit content landmarks, with junk removed inside it.
pub fn defuddle(html: &str) -> Option<ExtractedView> {
    let doc = Html::parse_document(html);
    let candidates = sel("article, main, [role=\"main\"], [itemprop=\"articleBody\"]");

    let best = doc
        .select(&candidates)
        .max_by_key(|el| element_text_len(*el))?;
    if element_text_len(best) == 0 {
        return None;
    }

    let cleaned = clean_html(&best.html());
    Some(ExtractedView::from_html("defuddle", cleaned).with_title(doc_title(html)))
}

/// Pass 3: paragraph-cluster heuristics. Scores block candidates by the
/// amount of paragraph text they directly contain and picks the winner.
pub fn article_extractor(html: &str) -> Option<ExtractedView> {
    let doc = Html::parse_document(html);
    let blocks = sel("div, section, article, td");
    let paragraphs = sel("p");

    let mut best: Option<(f64, ElementRef)> = None;
    for el in doc.select(&blocks) {
        let mut para_chars = 0usize;
        let mut para_count = 0usize;
        for p in el.select(&paragraphs) {
            // Count only paragraphs whose nearest block ancestor is `el`.
            let nearest = p
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| matches!(a.value().name(), "div" | "section" | "article" | "td"));
            if nearest.map(|a| a.id()) != Some(el.id()) {
                continue;
            }
            let chars = element_text_len(p);
            if chars > 40 {
                para_chars += chars;
                para_count += 1;
            }
        }
        if para_count == 0 {
            continue;
        }
        let score = para_chars as f64 * (1.0 + (para_count as f64).ln());
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, el));
        }
    }

    let (_, el) = best?;
    Some(ExtractedView::from_html("article-extractor", el.html()).with_title(doc_title(html)))
}

/// Pass 5: fixed CSS selector probe.
pub fn css_probe(html: &str) -> Option<ExtractedView> {
    let doc = Html::parse_document(html);
    for raw in CONTENT_SELECTORS {
        let selector = sel(raw);
        if let Some(el) = doc.select(&selector).next() {
            if element_text_len(el) > 0 {
                let mut view =
                    ExtractedView::from_html("css-selector", el.html()).with_title(doc_title(html));
                view.excerpt = meta_content(&doc, "meta[name=\"description\"]");
                return Some(view);
            }
        }
    }
    None
}

/// Pass 6: schema.org JSON-LD blocks of known article-like types.
pub fn schema_org(html: &str) -> Option<ExtractedView> {
    let doc = Html::parse_document(html);
    let scripts = sel("script[type=\"application/ld+json\"]");

    for script in doc.select(&scripts) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        for obj in flatten_ld(&value) {
            if let Some(view) = render_ld_object(obj) {
                return Some(view);
            }
        }
    }
    None
}

/// JSON-LD payloads arrive as single objects, arrays, or `@graph` wrappers.
fn flatten_ld(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten_ld).collect(),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                flatten_ld(graph)
            } else {
                vec![value]
            }
        }
        _ => Vec::new(),
    }
}

fn ld_type_matches(obj: &Value) -> bool {
    match obj.get("@type") {
        Some(Value::String(t)) => SCHEMA_TYPES.contains(&t.as_str()),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| SCHEMA_TYPES.contains(&t)),
        _ => false,
    }
}

fn ld_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

fn render_ld_object(obj: &Value) -> Option<ExtractedView> {
    if !ld_type_matches(obj) {
        return None;
    }

    let title = ld_str(obj, "headline").or_else(|| ld_str(obj, "name"));
    let description = ld_str(obj, "description");
    let body = ld_str(obj, "articleBody").or_else(|| ld_str(obj, "text"));
    let author = obj.get("author").and_then(|a| match a {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(_) => ld_str(a, "name").map(str::to_string),
        Value::Array(items) => items
            .first()
            .and_then(|first| ld_str(first, "name"))
            .map(str::to_string),
        _ => None,
    });

    let mut md = String::new();
    if let Some(t) = title {
        md.push_str(&format!("# {t}\n\n"));
    }
    if let Some(a) = &author {
        md.push_str(&format!("*By {a}*\n\n"));
    }
    if let Some(d) = description {
        md.push_str(&format!("{d}\n\n"));
    }
    if let Some(b) = body {
        md.push_str(b);
        md.push('\n');
    }
    if md.trim().is_empty() {
        return None;
    }

    let mut view = ExtractedView::from_markdown("schema-org", md.trim().to_string());
    view.title = title.map(str::to_string);
    view.byline = author;
    view.excerpt = description.map(str::to_string);
    Some(view)
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    doc.select(&sel(selector))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pass 7: OpenGraph / Twitter / plain-meta fallback.
pub fn meta_fallback(html: &str) -> Option<ExtractedView> {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, "meta[property=\"og:title\"]")
        .or_else(|| meta_content(&doc, "meta[name=\"twitter:title\"]"))
        .or_else(|| doc_title(html));
    let description = meta_content(&doc, "meta[property=\"og:description\"]")
        .or_else(|| meta_content(&doc, "meta[name=\"twitter:description\"]"))
        .or_else(|| meta_content(&doc, "meta[name=\"description\"]"));
    let image = meta_content(&doc, "meta[property=\"og:image\"]");
    let site_name = meta_content(&doc, "meta[property=\"og:site_name\"]");

    let title = title?;
    let mut md = format!("# {title}\n");
    if let Some(d) = &description {
        md.push_str(&format!("\n{d}\n"));
    }
    if let Some(img) = image {
        md.push_str(&format!("\n![{title}]({img})\n"));
    }

    let mut view = ExtractedView::from_markdown("meta-fallback", md.trim().to_string());
    view.title = Some(title);
    view.excerpt = description;
    view.site_name = site_name;
    Some(view)
}

/// Pass 8: text-density pick among top-level body children.
pub fn text_density(html: &str) -> Option<ExtractedView> {
    let doc = Html::parse_document(html);
    let body = doc.select(&sel("body")).next()?;

    let best = body
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| !matches!(el.value().name(), "script" | "style" | "noscript"))
        .map(|el| {
            let text = element_text_len(el) as f64;
            let html_len = el.html().len().max(1) as f64;
            (text / html_len * (text + 1.0).ln(), el)
        })
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))?;

    if best.0 <= 0.0 {
        return None;
    }
    Some(ExtractedView::from_html("text-density", best.1.html()).with_title(doc_title(html)))
}

/// Pass 9: cleaned body.
pub fn cleaned_body(html: &str) -> Option<ExtractedView> {
    let cleaned = clean_html(html);
    let doc = Html::parse_document(&cleaned);
    let body = doc.select(&sel("body")).next()?;
    let inner = body.inner_html();
    if inner.trim().is_empty() {
        return None;
    }
    Some(ExtractedView::from_html("cleaned-body", inner).with_title(doc_title(html)))
}

/// Pass 10: absolute fallback, the raw body.
pub fn raw_body(html: &str) -> ExtractedView {
    let doc = Html::parse_document(html);
    let inner = doc
        .select(&sel("body"))
        .next()
        .map(|b| b.inner_html())
        .unwrap_or_else(|| html.to_string());
    ExtractedView::from_html("raw-body", inner).with_title(doc_title(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<html><head><title>Tides Explained</title></head><body>
        <nav>home about contact</nav>
        <article><h1>Tides Explained</h1>
          <p>The tide rises and falls under the combined gravitational pull of the
             moon and the sun, modulated by the shape of the local coastline.</p>
          <p>Spring tides occur when the sun and moon align; neap tides when they
             are at right angles, and the difference is easy to observe.</p>
        </article>
        <footer>copyright</footer>
    </body></html>"#;

    #[test]
    fn defuddle_picks_the_article_landmark() {
        let view = defuddle(ARTICLE).unwrap();
        assert_eq!(view.method, "defuddle");
        let html = view.content_html.unwrap();
        assert!(html.contains("Spring tides"));
        assert!(!html.contains("about contact"));
    }

    #[test]
    fn article_extractor_scores_paragraph_clusters() {
        let html = r#"<body>
          <div id="chrome"><p>tiny</p></div>
          <div id="story">
            <p>A long paragraph of genuine article prose that easily clears the
               minimum character threshold for consideration by the heuristic.</p>
            <p>Another long paragraph of article prose that also clears the bar
               and pushes this container ahead of every competitor.</p>
          </div>
        </body>"#;
        let view = article_extractor(html).unwrap();
        assert!(view.content_html.unwrap().contains("genuine article prose"));
    }

    #[test]
    fn css_probe_honours_priority_order() {
        let html = r#"<body><main>main content here</main><div class="post-content">post</div></body>"#;
        let view = css_probe(html).unwrap();
        assert!(view.content_html.unwrap().contains("main content"));
    }

    #[test]
    fn schema_org_renders_article_blocks() {
        let html = r#"<html><head><script type="application/ld+json">
        {"@context":"https://schema.org","@type":"NewsArticle",
         "headline":"Big News","description":"It happened.",
         "author":{"@type":"Person","name":"A. Reporter"},
         "articleBody":"The full story, told at length."}
        </script></head><body></body></html>"#;
        let view = schema_org(html).unwrap();
        assert_eq!(view.method, "schema-org");
        let md = view.prebuilt_markdown.unwrap();
        assert!(md.starts_with("# Big News"));
        assert!(md.contains("*By A. Reporter*"));
        assert!(md.contains("The full story"));
    }

    #[test]
    fn schema_org_ignores_unknown_types() {
        let html = r#"<script type="application/ld+json">{"@type":"BreadcrumbList"}</script>"#;
        assert!(schema_org(html).is_none());
    }

    #[test]
    fn schema_org_walks_graph_wrappers() {
        let html = r#"<script type="application/ld+json">
        {"@graph":[{"@type":"WebSite"},{"@type":"Article","headline":"Graphed","articleBody":"Body."}]}
        </script>"#;
        let view = schema_org(html).unwrap();
        assert!(view.prebuilt_markdown.unwrap().contains("# Graphed"));
    }

    #[test]
    fn meta_fallback_builds_from_og_tags() {
        let html = r#"<head>
          <meta property="og:title" content="OG Title">
          <meta property="og:description" content="OG description.">
          <meta property="og:image" content="https://img.test/x.png">
        </head><body></body>"#;
        let view = meta_fallback(html).unwrap();
        let md = view.prebuilt_markdown.unwrap();
        assert!(md.starts_with("# OG Title"));
        assert!(md.contains("OG description."));
        assert!(md.contains("https://img.test/x.png"));
    }

    #[test]
    fn text_density_picks_the_dense_child() {
        let html = r#"<body>
          <div class="a"><span>x</span><span>y</span><span>z</span><b></b><i></i></div>
          <div class="b">A plain dense block of text with very little markup around it,
             which maximises the density score handily.</div>
        </body>"#;
        let view = text_density(html).unwrap();
        assert!(view.content_html.unwrap().contains("dense block"));
    }

    #[test]
    fn raw_body_always_produces_a_view() {
        let view = raw_body("<body><p>anything</p></body>");
        assert_eq!(view.method, "raw-body");
        assert!(view.content_html.unwrap().contains("anything"));
    }

    #[test]
    fn doc_title_reads_the_title_tag() {
        assert_eq!(
            doc_title("<head><title> Hello </title></head>"),
            Some("Hello".to_string())
        );
        assert_eq!(doc_title("<body></body>"), None);
    }
}
