//! RSS / Atom / JSON-feed rendering into a fixed Markdown structure.

use feed_rs::model::{Entry, Feed};
use tidemark_types::{ConvertError, Result};
use tracing::debug;

/// Items rendered per feed; the tail is summarised instead.
const MAX_ITEMS: usize = 50;

/// A rendered feed, ready for post-processing.
#[derive(Debug, Clone)]
pub struct RenderedFeed {
    pub markdown: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Parse feed XML/JSON and emit the fixed Markdown layout: feed header,
/// blockquoted description, source link and item count, then one section
/// per item separated by rules.
pub fn render_feed(xml: &[u8], source_url: &str) -> Result<RenderedFeed> {
    let feed = feed_rs::parser::parse(xml)
        .map_err(|e| ConvertError::ParseError(format!("feed: {e}")))?;

    let title = feed
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());
    let description = feed
        .description
        .as_ref()
        .map(|d| d.content.trim().to_string())
        .filter(|d| !d.is_empty());

    let mut md = String::new();
    md.push_str(&format!(
        "# {}\n\n",
        title.as_deref().unwrap_or("Untitled feed")
    ));
    if let Some(desc) = &description {
        md.push_str(&format!("> {desc}\n\n"));
    }
    md.push_str(&format!("**Source:** {source_url}\n\n"));
    md.push_str(&format!("**Items:** {}\n\n", feed.entries.len()));

    let total = feed.entries.len();
    for entry in feed.entries.iter().take(MAX_ITEMS) {
        render_entry(entry, &mut md);
    }
    if total > MAX_ITEMS {
        md.push_str(&format!("*…and {} more items.*\n", total - MAX_ITEMS));
    }

    debug!(items = total, "feed rendered");
    Ok(RenderedFeed {
        markdown: md.trim().to_string(),
        title,
        description,
    })
}

fn render_entry(entry: &Entry, md: &mut String) {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled");
    md.push_str(&format!("## {title}\n\n"));

    let mut meta = Vec::new();
    if let Some(date) = entry.published.or(entry.updated) {
        meta.push(date.to_rfc3339());
    }
    let authors: Vec<&str> = entry
        .authors
        .iter()
        .map(|a| a.name.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if !authors.is_empty() {
        meta.push(authors.join(", "));
    }
    if !meta.is_empty() {
        md.push_str(&format!("*{}*\n\n", meta.join(" · ")));
    }

    // Prefer full content over the summary; both arrive as HTML.
    let body_html = entry
        .content
        .as_ref()
        .and_then(|c| c.body.as_deref())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.as_str()));
    if let Some(html) = body_html {
        let body = tidemark_markdown::html_to_markdown(html);
        if !body.is_empty() {
            md.push_str(&body);
            md.push_str("\n\n");
        }
    }

    if let Some(link) = entry.links.first() {
        md.push_str(&format!("[Read more]({})\n\n", link.href));
    }
    md.push_str("---\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Tide Reports</title>
  <description>Daily tide commentary.</description>
  <link>https://tides.test</link>
  <item>
    <title>Spring tide incoming</title>
    <pubDate>Mon, 06 Jul 2026 10:00:00 GMT</pubDate>
    <author>reporter@tides.test (R. Porter)</author>
    <description>&lt;p&gt;Expect a &lt;b&gt;large&lt;/b&gt; range.&lt;/p&gt;</description>
    <link>https://tides.test/spring</link>
  </item>
  <item>
    <title>Neap tide notes</title>
    <link>https://tides.test/neap</link>
  </item>
</channel></rss>"#;

    #[test]
    fn renders_the_fixed_layout() {
        let feed = render_feed(RSS.as_bytes(), "https://tides.test/feed.xml").unwrap();
        let md = &feed.markdown;
        assert!(md.starts_with("# Tide Reports"));
        assert!(md.contains("> Daily tide commentary."));
        assert!(md.contains("**Source:** https://tides.test/feed.xml"));
        assert!(md.contains("**Items:** 2"));
        assert!(md.contains("## Spring tide incoming"));
        assert!(md.contains("Expect a **large** range."));
        assert!(md.contains("[Read more](https://tides.test/spring)"));
        assert!(md.contains("---"));
        assert_eq!(feed.title.as_deref(), Some("Tide Reports"));
    }

    #[test]
    fn items_without_content_still_render() {
        let feed = render_feed(RSS.as_bytes(), "https://tides.test/feed.xml").unwrap();
        assert!(feed.markdown.contains("## Neap tide notes"));
    }

    #[test]
    fn atom_parses_too() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Tides</title>
  <entry><title>Entry</title><id>1</id>
    <summary>plain summary</summary>
  </entry>
</feed>"#;
        let feed = render_feed(atom.as_bytes(), "https://a.test/feed").unwrap();
        assert!(feed.markdown.contains("# Atom Tides"));
        assert!(feed.markdown.contains("plain summary"));
    }

    #[test]
    fn invalid_xml_is_a_parse_error() {
        let err = render_feed(b"<html>nope</html>", "https://x.test").unwrap_err();
        assert!(matches!(err, ConvertError::ParseError(_)));
    }
}
