//! Post-conversion Markdown cleanup and relative-URL resolution.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static EMPTY_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\]\([^)]*\)").expect("static regex"));

// `[text](#cite...)` including one level of nested brackets in the text,
// e.g. `[[12]](#cite_note-12)`.
static CITE_BACKREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:[^\[\]]|\[[^\]]*\])*\]\(#cite[^)]*\)").expect("static regex")
});

static EDIT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\\?edit\\?\]\([^)]*\)").expect("static regex"));

static WIKI_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\?\[\\?(citation needed|better source needed|clarification needed)\\?\]")
        .expect("static regex")
});

static TERMINAL_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^#{1,6}\s*(references|notes|citations|footnotes|bibliography|external links|see also)\s*$",
    )
    .expect("static regex")
});

// A trailing run of `1. ^ ...` / `[1]: ...` reference lines.
static REF_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d+\.\s+\^|\[\d+\]:?\s)").expect("static regex"));

static NEWLINE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

// Bracket pairs only: empty parens are left alone so code like `main()`
// survives the pass.
static ORPHAN_BRACKETS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\]").expect("static regex"));

static MD_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\(([^)\s]+)(\s+\x22[^\x22]*\x22)?\)").expect("static regex"));

/// The ordered cleanup passes applied to every converted document.
pub fn clean_markdown(markdown: &str) -> String {
    let mut md = markdown.to_string();

    md = EMPTY_LINK_RE.replace_all(&md, "").into_owned();
    md = CITE_BACKREF_RE.replace_all(&md, "").into_owned();
    md = EDIT_LINK_RE.replace_all(&md, "").into_owned();
    md = WIKI_MARKER_RE.replace_all(&md, "").into_owned();

    if let Some(m) = TERMINAL_HEADING_RE.find(&md) {
        md.truncate(m.start());
    }
    md = truncate_trailing_reference_list(&md);

    md = NEWLINE_RUN_RE.replace_all(&md, "\n\n").into_owned();
    md = md
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    md = ORPHAN_BRACKETS_RE.replace_all(&md, "").into_owned();
    md = NEWLINE_RUN_RE.replace_all(&md, "\n\n").into_owned();

    md.trim().to_string()
}

/// Drop a trailing block of three or more numbered-reference lines.
fn truncate_trailing_reference_list(md: &str) -> String {
    let lines: Vec<&str> = md.lines().collect();
    let mut cut = lines.len();
    let mut run = 0usize;

    for (i, line) in lines.iter().enumerate().rev() {
        if line.trim().is_empty() {
            continue;
        }
        if REF_LINE_RE.is_match(line) {
            run += 1;
            cut = i;
        } else {
            break;
        }
    }

    if run >= 3 {
        lines[..cut].join("\n")
    } else {
        md.to_string()
    }
}

/// Rewrite relative link/image URLs to absolute ones against `base`.
/// Fragment-only, `data:`, `mailto:`, `tel:`, and `javascript:` URLs are
/// left untouched, as are already-absolute URLs.
pub fn resolve_urls(markdown: &str, base: &Url) -> String {
    MD_URL_RE
        .replace_all(markdown, |caps: &regex::Captures| {
            let raw = &caps[1];
            let title = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            if should_skip_resolution(raw) {
                return format!("]({raw}{title})");
            }
            match base.join(raw) {
                Ok(abs) => format!("]({abs}{title})"),
                Err(_) => format!("]({raw}{title})"),
            }
        })
        .into_owned()
}

fn should_skip_resolution(raw: &str) -> bool {
    raw.starts_with('#')
        || raw.starts_with("data:")
        || raw.starts_with("mailto:")
        || raw.starts_with("tel:")
        || raw.starts_with("javascript:")
        || raw.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_empty_links() {
        assert_eq!(clean_markdown("before [](https://x.test) after"), "before  after".trim());
    }

    #[test]
    fn drops_cite_backrefs_with_nested_brackets() {
        let md = "Fact.[[3]](#cite_note-3) More.";
        assert_eq!(clean_markdown(md), "Fact. More.");
    }

    #[test]
    fn drops_edit_links_and_wiki_markers() {
        let md = "Heading [edit](/w/index.php?action=edit)\n\nClaim\\[citation needed\\] stands.";
        let out = clean_markdown(md);
        assert!(!out.contains("edit"));
        assert!(!out.contains("citation needed"));
    }

    #[test]
    fn truncates_at_references_heading() {
        let md = "# Title\n\nBody text.\n\n## References\n\n1. Something";
        let out = clean_markdown(md);
        assert!(out.contains("Body text."));
        assert!(!out.contains("References"));
        assert!(!out.contains("Something"));
    }

    #[test]
    fn truncates_trailing_numbered_reference_runs() {
        let md = "Body.\n\n1. ^ ref one\n2. ^ ref two\n3. ^ ref three";
        let out = clean_markdown(md);
        assert_eq!(out, "Body.");
    }

    #[test]
    fn short_reference_runs_survive() {
        let md = "Body.\n\n1. ^ only one";
        assert!(clean_markdown(md).contains("only one"));
    }

    #[test]
    fn collapses_newlines_and_trims() {
        let md = "a\n\n\n\n\nb   \n   \nc";
        assert_eq!(clean_markdown(md), "a\n\nb\n\nc");
    }

    #[test]
    fn resolves_relative_urls() {
        let base = Url::parse("https://example.com/blog/post/").unwrap();
        let md = "[a](../other) ![img](/img/x.png) [abs](https://y.test/) [frag](#sec) [m](mailto:a@b.c)";
        let out = resolve_urls(md, &base);
        assert!(out.contains("(https://example.com/blog/other)"), "{out}");
        assert!(out.contains("(https://example.com/img/x.png)"));
        assert!(out.contains("(https://y.test/)"));
        assert!(out.contains("(#sec)"));
        assert!(out.contains("(mailto:a@b.c)"));
    }

    #[test]
    fn resolution_keeps_titles() {
        let base = Url::parse("https://example.com/").unwrap();
        let out = resolve_urls("[a](/x \"hover\")", &base);
        assert_eq!(out, "[a](https://example.com/x \"hover\")");
    }
}
