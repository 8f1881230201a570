//! Prune-to-fit: section-level boilerplate removal for LLM context budgets.

use crate::quality::{link_text_chars, text_len};
use once_cell::sync::Lazy;
use regex::Regex;

static BOILERPLATE_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)cookie|privacy|terms|disclaimer|advertisement|related|popular|trending|sidebar|footer|nav|menu|sign[ -]?up|log[ -]?in|subscribe|newsletter|share|social|comment|copyright",
    )
    .expect("static regex")
});

static ATX_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.*)$").expect("static regex"));

/// Minimum score a section needs to survive pruning.
const KEEP_THRESHOLD: f64 = 0.15;

/// If pruning would remove more than this share of the input, it was too
/// aggressive and the original is returned instead.
const MAX_REMOVAL_RATIO: f64 = 0.8;

struct Section<'a> {
    heading_level: Option<usize>,
    heading_text: &'a str,
    body: String,
}

/// Prune boilerplate sections, then optionally truncate to an approximate
/// token budget. `token_count` is the already-computed token count of
/// `markdown`, used to estimate characters per token.
pub fn prune_markdown(markdown: &str, max_tokens: Option<usize>, token_count: usize) -> String {
    let pruned = prune_sections(markdown);
    match max_tokens {
        Some(budget) if budget > 0 => truncate_to_tokens(&pruned, budget, markdown, token_count),
        _ => pruned,
    }
}

fn prune_sections(markdown: &str) -> String {
    let sections = split_sections(markdown);
    if sections.is_empty() {
        return markdown.trim().to_string();
    }

    let kept: Vec<String> = sections
        .iter()
        .filter(|s| section_score(s) > KEEP_THRESHOLD)
        .map(|s| s.body.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let output = kept.join("\n\n");

    // Safety rule: keep the original when pruning removed almost everything.
    let input_len = markdown.trim().len().max(1);
    if (output.len() as f64) < input_len as f64 * (1.0 - MAX_REMOVAL_RATIO) {
        return markdown.trim().to_string();
    }
    output
}

fn split_sections(markdown: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut cursor = 0usize;
    let mut current: Option<Section> = Some(Section {
        heading_level: None,
        heading_text: "",
        body: String::new(),
    });

    for m in ATX_HEADING_RE.captures_iter(markdown) {
        let whole = m.get(0).expect("match");
        let before = &markdown[cursor..whole.start()];
        if let Some(sec) = current.as_mut() {
            sec.body.push_str(before);
        }
        if let Some(sec) = current.take() {
            if !sec.body.trim().is_empty() {
                sections.push(sec);
            }
        }
        current = Some(Section {
            heading_level: Some(m.get(1).expect("level").as_str().len()),
            heading_text: m.get(2).expect("text").as_str(),
            body: whole.as_str().to_string(),
        });
        cursor = whole.end();
    }
    if let Some(sec) = current.as_mut() {
        sec.body.push_str(&markdown[cursor..]);
    }
    if let Some(sec) = current.take() {
        if !sec.body.trim().is_empty() {
            sections.push(sec);
        }
    }
    sections
}

fn section_score(section: &Section<'_>) -> f64 {
    if BOILERPLATE_HEADING_RE.is_match(section.heading_text) {
        return 0.0;
    }

    let tlen = text_len(&section.body);
    let link_chars = link_text_chars(&section.body);
    let link_density = (link_chars as f64 / tlen.max(1) as f64).min(1.0);

    if link_density > 0.6 {
        return 0.1;
    }
    if section.heading_level.map_or(false, |l| l >= 3) && tlen < 50 {
        return 0.2;
    }

    (tlen as f64 / 200.0).min(1.0) * (1.0 - link_density * 0.5)
}

fn truncate_to_tokens(
    pruned: &str,
    budget: usize,
    original: &str,
    token_count: usize,
) -> String {
    if token_count == 0 {
        return pruned.to_string();
    }
    let chars_per_token = (original.chars().count() as f64 / token_count as f64).max(1.0);
    let char_budget = (budget as f64 * chars_per_token) as usize;
    if pruned.chars().count() <= char_budget {
        return pruned.to_string();
    }
    let mut out: String = pruned.chars().take(char_budget).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose(topic: &str) -> String {
        format!(
            "This section about {topic} contains a couple of sentences of genuine \
             prose, long enough that the length component of the score registers it \
             as real content rather than navigation residue or filler, and a second \
             sentence to push it safely past the scoring threshold for retention."
        )
    }

    #[test]
    fn boilerplate_sections_are_removed() {
        let md = format!(
            "# Article\n\n{}\n\n## Cookie Settings\n\nManage your cookie preferences here.\n\n## Analysis\n\n{}",
            prose("the topic"),
            prose("the analysis"),
        );
        let out = prune_markdown(&md, None, 0);
        assert!(out.contains("Analysis"));
        assert!(!out.contains("Cookie Settings"));
    }

    #[test]
    fn link_walls_are_removed() {
        let mut nav = String::from("## Sitemap Links\n\n");
        for i in 0..30 {
            nav.push_str(&format!("[some navigation destination {i}](/p/{i}) "));
        }
        let md = format!("# Doc\n\n{}\n\n{nav}\n\n## Body\n\n{}", prose("a"), prose("b"));
        let out = prune_markdown(&md, None, 0);
        assert!(!out.contains("Sitemap"), "{out}");
        assert!(out.contains("Body"));
    }

    #[test]
    fn over_aggressive_prune_returns_original() {
        // Every section looks like boilerplate, so pruning would drop >80%.
        let md = "## Privacy\n\nWe value privacy.\n\n## Terms\n\nThe terms apply.";
        let out = prune_markdown(md, None, 0);
        assert_eq!(out, md.trim());
    }

    #[test]
    fn preamble_without_heading_is_scored() {
        let md = prose("an intro");
        let out = prune_markdown(&md, None, 0);
        assert_eq!(out, md.trim());
    }

    #[test]
    fn short_deep_subsections_are_rescued() {
        // A short level-3 section would score ~0.05 on length alone; the
        // 0.2 floor keeps it above the retention threshold.
        let md = format!("# T\n\n{}\n\n### Tags\n\nfoo bar\n\n", prose("x"));
        let out = prune_markdown(&md, None, 0);
        assert!(out.contains("### Tags"), "{out}");

        // A short level-2 section gets no such rescue.
        let md2 = format!("# T\n\n{}\n\n## Misc\n\nfoo bar\n\n", prose("x"));
        let out2 = prune_markdown(&md2, None, 0);
        assert!(!out2.contains("## Misc"), "{out2}");
    }

    #[test]
    fn token_budget_truncates_with_marker() {
        let md = prose("truncation").repeat(10);
        // Pretend 4 chars per token.
        let tokens = md.chars().count() / 4;
        let out = prune_markdown(&md, Some(10), tokens);
        assert!(out.ends_with('…'));
        assert!(out.chars().count() < 100);
    }

    #[test]
    fn generous_budget_leaves_output_alone() {
        let md = prose("room");
        let tokens = md.chars().count() / 4;
        let out = prune_markdown(&md, Some(100_000), tokens);
        assert!(!out.ends_with('…'));
    }
}
