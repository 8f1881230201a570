//! DOM to Markdown conversion.
//!
//! A recursive renderer over the parsed tree. `<div>` is treated as a block,
//! `<svg>` is dropped, `<pre><code>` becomes a fenced block with a fence
//! long enough to contain any backtick run inside, and noisy images
//! (avatars, badges, tracking pixels) are filtered out.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

type NodeRef<'a> = ego_tree::NodeRef<'a, Node>;

static IMAGE_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)avatar|gravatar|badge|icon|logo|emoji|spinner|loading|pixel|tracking|spacer")
        .expect("static regex")
});

static CODE_LANG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:language-|lang-|highlight-)(\w[\w+#-]*)$").expect("static regex")
});

static CODE_EXCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)gutter|line-number|linenumber|copy").expect("static regex"));

static CARD_CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)topic|card|item|post|entry|video|product|result|listing")
        .expect("static regex")
});

static NEWLINE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Convert an HTML document or fragment into Markdown.
pub fn html_to_markdown(html: &str) -> String {
    let doc = Html::parse_document(html);
    let body_sel = Selector::parse("body").expect("static selector");

    let rendered = match doc.select(&body_sel).next() {
        Some(body) => render_children(*body, 0),
        None => render_children(doc.tree.root(), 0),
    };

    NEWLINE_RUN_RE
        .replace_all(rendered.trim(), "\n\n")
        .into_owned()
}

fn element_name<'a>(node: &'a NodeRef<'a>) -> Option<&'a str> {
    match node.value() {
        Node::Element(el) => Some(el.name()),
        _ => None,
    }
}

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "i", "img", "kbd", "mark", "q", "s", "small", "span",
    "strong", "sub", "sup", "time", "u", "var",
];

fn is_inline_element(node: &NodeRef) -> bool {
    element_name(node).map_or(false, |n| INLINE_TAGS.contains(&n))
}

fn is_skippable(node: &NodeRef) -> bool {
    match node.value() {
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => true,
        Node::Text(t) => t.trim().is_empty(),
        _ => false,
    }
}

/// True when the element carries a class the card heuristic recognises.
fn has_card_class(el: ElementRef) -> bool {
    el.value().classes().any(|c| CARD_CLASS_RE.is_match(c))
}

/// Render all children of `node`, inserting the spacing the source DOM
/// implied visually: a space between adjacent inline elements and an `<hr>`
/// between repeating sibling "cards".
fn render_children(node: NodeRef, list_depth: usize) -> String {
    // Card detection over element children sharing a card-ish class.
    let card_count = node
        .children()
        .filter_map(|c| ElementRef::wrap(c))
        .filter(|el| has_card_class(*el))
        .count();
    let separate_cards = card_count >= 2;

    let mut out = String::new();
    let mut prev_inline = false;
    let mut prev_was_card = false;

    for child in node.children() {
        if is_skippable(&child) && !matches!(child.value(), Node::Text(_)) {
            continue;
        }

        let is_card = separate_cards
            && ElementRef::wrap(child).map_or(false, |el| has_card_class(el));
        if is_card && prev_was_card {
            push_block_gap(&mut out);
            out.push_str("---");
            push_block_gap(&mut out);
        }

        let rendered = render_node(child, list_depth);
        if rendered.is_empty() {
            continue;
        }

        // Pure whitespace only matters between inline runs.
        if rendered.trim().is_empty() {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            prev_inline = false;
            continue;
        }

        let at_line_start = out.is_empty() || out.ends_with('\n');
        let rendered = if at_line_start {
            rendered.trim_start_matches(' ').to_string()
        } else {
            rendered
        };

        if prev_inline
            && is_inline_element(&child)
            && !out.ends_with(char::is_whitespace)
            && !rendered.starts_with(char::is_whitespace)
        {
            out.push(' ');
        }

        out.push_str(&rendered);
        prev_inline = is_inline_element(&child) || matches!(child.value(), Node::Text(_));
        if is_card {
            prev_was_card = true;
        } else if ElementRef::wrap(child).is_some() {
            prev_was_card = false;
        }
    }
    out
}

fn push_block_gap(out: &mut String) {
    while out.ends_with(' ') || out.ends_with('\t') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with("\n\n") {
        if out.ends_with('\n') {
            out.push('\n');
        } else {
            out.push_str("\n\n");
        }
    }
}

fn render_node(node: NodeRef, list_depth: usize) -> String {
    match node.value() {
        Node::Text(t) => collapse_whitespace(t),
        Node::Element(_) => {
            let el = ElementRef::wrap(node).expect("element node");
            render_element(el, list_depth)
        }
        _ => String::new(),
    }
}

/// Collapse whitespace runs to single spaces, preserving a leading or
/// trailing space so inline separation survives node boundaries.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

fn render_element(el: ElementRef, list_depth: usize) -> String {
    let node = *el;
    let name = el.value().name();
    match name {
        "script" | "style" | "noscript" | "svg" | "template" | "head" | "iframe" => String::new(),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            let text = render_children(node, list_depth);
            let text = text.trim();
            if text.is_empty() {
                String::new()
            } else {
                format!("\n\n{} {}\n\n", "#".repeat(level), text)
            }
        }
        "p" | "div" | "section" | "article" | "main" | "figure" | "figcaption" | "header"
        | "footer" | "aside" | "nav" | "address" | "details" | "summary" => {
            let inner = render_children(node, list_depth);
            let inner = inner.trim();
            if inner.is_empty() {
                String::new()
            } else {
                format!("\n\n{inner}\n\n")
            }
        }
        "br" => "\n".to_string(),
        "hr" => "\n\n---\n\n".to_string(),
        "strong" | "b" => wrap_inline(node, list_depth, "**"),
        "em" | "i" => wrap_inline(node, list_depth, "*"),
        "del" | "s" => wrap_inline(node, list_depth, "~~"),
        "code" | "kbd" | "samp" => render_inline_code(el, list_depth),
        "pre" => render_pre(el),
        "a" => render_link(el, list_depth),
        "img" => render_image(el),
        "ul" => render_list(node, list_depth, false),
        "ol" => render_list(node, list_depth, true),
        "blockquote" => render_blockquote(node, list_depth),
        "table" => render_table(el),
        _ => render_children(node, list_depth),
    }
}

fn wrap_inline(node: NodeRef, list_depth: usize, marker: &str) -> String {
    let inner = render_children(node, list_depth);
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{marker}{trimmed}{marker}")
    }
}

fn render_inline_code(el: ElementRef, list_depth: usize) -> String {
    // A <code> directly under <pre> is handled by render_pre.
    if el
        .parent()
        .and_then(|p| ElementRef::wrap(p))
        .map_or(false, |p| p.value().name() == "pre")
    {
        return render_children(*el, list_depth);
    }
    let text: String = el.text().collect();
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else {
        format!("`{text}`")
    }
}

/// Recursively collect code text, skipping buttons and gutter/line-number
/// decorations that editors inject into highlighted blocks.
fn code_text(node: NodeRef, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => {
                if el.name() == "button" {
                    continue;
                }
                if el.classes().any(|c| CODE_EXCLUDE_RE.is_match(c)) {
                    continue;
                }
                code_text(child, out);
            }
            _ => {}
        }
    }
}

fn detect_language(el: ElementRef) -> Option<String> {
    let own = el
        .value()
        .classes()
        .find_map(|c| CODE_LANG_RE.captures(c).map(|m| m[1].to_string()));
    if own.is_some() {
        return own;
    }
    let code_sel = Selector::parse("code").expect("static selector");
    el.select(&code_sel).next().and_then(|code| {
        code.value()
            .classes()
            .find_map(|c| CODE_LANG_RE.captures(c).map(|m| m[1].to_string()))
    })
}

fn render_pre(el: ElementRef) -> String {
    let mut code = String::new();
    code_text(*el, &mut code);
    let code = code.trim_end_matches('\n').trim_start_matches('\n');
    if code.trim().is_empty() {
        return String::new();
    }

    // Fence must be longer than any backtick run inside, minimum 3.
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest_run + 1).max(3));
    let lang = detect_language(el).unwrap_or_default();

    format!("\n\n{fence}{lang}\n{code}\n{fence}\n\n")
}

fn render_link(el: ElementRef, list_depth: usize) -> String {
    let text = render_children(*el, list_depth);
    let text = text.trim();
    match el.value().attr("href") {
        Some(href) if !href.trim().is_empty() => {
            if text.is_empty() {
                String::new()
            } else {
                format!("[{text}]({})", href.trim())
            }
        }
        _ => text.to_string(),
    }
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim_end_matches("px").trim().parse::<u32>().ok())
}

fn render_image(el: ElementRef) -> String {
    let src = el.value().attr("src").unwrap_or("").trim();
    if src.is_empty() {
        return String::new();
    }
    let alt = el.value().attr("alt").unwrap_or("").trim();
    let class: String = el.value().classes().collect::<Vec<_>>().join(" ");

    if IMAGE_NOISE_RE.is_match(src) || IMAGE_NOISE_RE.is_match(alt) || IMAGE_NOISE_RE.is_match(&class)
    {
        return String::new();
    }
    let width = parse_dimension(el.value().attr("width"));
    let height = parse_dimension(el.value().attr("height"));
    if width.map_or(false, |w| w <= 24) || height.map_or(false, |h| h <= 24) {
        return String::new();
    }
    // Only images with a meaningful description survive.
    if alt.len() < 3 {
        return String::new();
    }
    format!("![{alt}]({src})")
}

fn render_list(node: NodeRef, list_depth: usize, ordered: bool) -> String {
    let indent = "  ".repeat(list_depth);
    let mut out = String::from("\n\n");
    let mut index = 0usize;

    for child in node.children() {
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };
        if el.value().name() != "li" {
            continue;
        }
        index += 1;
        let marker = if ordered {
            format!("{index}. ")
        } else {
            "- ".to_string()
        };
        let item = render_children(child, list_depth + 1);
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        // Nested blocks inside a list item get continued indentation.
        let mut lines = item.lines().filter(|l| !l.trim().is_empty());
        if let Some(first) = lines.next() {
            out.push_str(&format!("{indent}{marker}{}\n", first.trim()));
            for line in lines {
                out.push_str(&format!("{indent}  {}\n", line.trim()));
            }
        }
    }
    out.push('\n');
    out
}

fn render_blockquote(node: NodeRef, list_depth: usize) -> String {
    let inner = render_children(node, list_depth);
    let inner = inner.trim();
    if inner.is_empty() {
        return String::new();
    }
    let quoted: String = inner
        .lines()
        .map(|l| {
            if l.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {}", l.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n{quoted}\n\n")
}

fn render_table(el: ElementRef) -> String {
    let row_sel = Selector::parse("tr").expect("static selector");
    let cell_sel = Selector::parse("th, td").expect("static selector");

    let mut rows: Vec<Vec<String>> = Vec::new();
    for tr in el.select(&row_sel) {
        let cells: Vec<String> = tr
            .select(&cell_sel)
            .map(|c| {
                let text = render_children(*c, 0);
                collapse_whitespace(text.trim()).replace('|', "\\|")
            })
            .collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    if rows.is_empty() {
        return String::new();
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::from("\n\n");
    for (i, row) in rows.iter().enumerate() {
        let mut padded = row.clone();
        padded.resize(width, String::new());
        out.push_str(&format!("| {} |\n", padded.join(" | ")));
        if i == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
    out.push('\n');
    out
}
