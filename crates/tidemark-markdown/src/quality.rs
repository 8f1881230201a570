//! Deterministic quality scoring of a markdown rendition.
//!
//! `score` is a pure function of the markdown string: weighted components
//! (length, text density, structure, boilerplate, link density) multiplied
//! by challenge / framework / thinness penalties, clamped and rounded.

use crate::patterns;
use once_cell::sync::Lazy;
use regex::Regex;
use tidemark_types::Quality;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+\S").expect("static regex"));
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+\S").expect("static regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("static regex"));
static MD_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[#*_`>|\[\]()!\\-]|\(https?://[^)]*\)").expect("static regex"));

/// Printable character count after stripping markdown punctuation and link
/// URLs. Shared by the scorer and the pruner.
pub fn text_len(markdown: &str) -> usize {
    let without_urls = LINK_RE.replace_all(markdown, "$1");
    let stripped = MD_PUNCT_RE.replace_all(&without_urls, "");
    stripped.chars().filter(|c| !c.is_whitespace()).count()
}

/// Total characters of link text in the markdown.
pub fn link_text_chars(markdown: &str) -> usize {
    LINK_RE
        .captures_iter(markdown)
        .map(|c| c[1].chars().count())
        .sum()
}

fn structure_score(markdown: &str) -> f64 {
    let has_heading = HEADING_RE.is_match(markdown);
    let paragraphs = markdown
        .split("\n\n")
        .filter(|block| {
            let t = block.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .count();
    let has_list = LIST_RE.is_match(markdown);

    let hits = [has_heading, paragraphs >= 2, has_list]
        .iter()
        .filter(|b| **b)
        .count();
    match hits {
        3 => 1.0,
        2 => 0.7,
        1 => 0.4,
        _ => 0.1,
    }
}

/// Score a markdown rendition. Deterministic, clamped to `[0, 1]`, rounded
/// to two decimals; the grade follows the fixed thresholds.
pub fn score(markdown: &str) -> Quality {
    let md_len = markdown.chars().count();
    if md_len == 0 {
        return Quality::from_score(0.0);
    }

    let tlen = text_len(markdown);

    let length = (tlen as f64 / 1000.0).min(1.0);
    let text_density = (tlen as f64 / md_len as f64).min(1.0);
    let structure = structure_score(markdown);
    let boilerplate = (1.0 - 0.15 * patterns::boilerplate_hits(markdown) as f64).max(0.0);
    let link_density =
        (1.0 - 2.0 * (link_text_chars(markdown) as f64 / md_len as f64)).max(0.0);

    let challenge = if patterns::contains_error_pattern(markdown) {
        0.1
    } else {
        1.0
    };
    let framework = if patterns::contains_spa_pattern(markdown) {
        0.1
    } else {
        1.0
    };
    let thin = if tlen < 300 {
        0.4
    } else if tlen < 500 {
        0.7
    } else {
        1.0
    };

    let raw = (0.15 * length
        + 0.25 * text_density
        + 0.2 * structure
        + 0.2 * boilerplate
        + 0.2 * link_density)
        * challenge
        * framework
        * thin;

    Quality::from_score(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::Grade;

    fn article(paragraphs: usize) -> String {
        let mut md = String::from("# A Study of Tides\n\n");
        for i in 0..paragraphs {
            md.push_str(&format!(
                "Paragraph {i} discusses the gravitational interplay between the moon and \
                 the ocean, with enough prose to look like a real article body section.\n\n"
            ));
        }
        md.push_str("- first point\n- second point\n");
        md
    }

    #[test]
    fn well_structured_article_scores_high() {
        let q = score(&article(12));
        assert!(q.score >= 0.6, "score {}", q.score);
        assert!(matches!(q.grade, Grade::A | Grade::B));
    }

    #[test]
    fn empty_markdown_scores_zero() {
        let q = score("");
        assert_eq!(q.score, 0.0);
        assert_eq!(q.grade, Grade::F);
    }

    #[test]
    fn challenge_pages_are_crushed() {
        let md = "Just a moment... Checking your browser before accessing example.com";
        let q = score(md);
        assert!(q.score <= 0.1, "score {}", q.score);
        assert_eq!(q.grade, Grade::F);
    }

    #[test]
    fn spa_payloads_are_crushed() {
        let mut md = article(12);
        md.push_str("\nself.__next_f = [[1,\"payload\"]]\n");
        let q = score(&md);
        assert!(q.score <= 0.15, "score {}", q.score);
    }

    #[test]
    fn thin_content_is_penalised() {
        let thin = score("# T\n\nshort body here");
        let full = score(&article(12));
        assert!(thin.score < full.score);
    }

    #[test]
    fn score_is_within_bounds_and_deterministic() {
        let md = article(5);
        let a = score(&md);
        let b = score(&md);
        assert_eq!(a.score, b.score);
        assert!((0.0..=1.0).contains(&a.score));
    }

    #[test]
    fn link_walls_are_penalised() {
        let mut md = String::from("# Links\n\n");
        for i in 0..40 {
            md.push_str(&format!("[a fairly long link text number {i}](https://x.test/{i}) "));
        }
        let linky = score(&md);
        let prose = score(&article(12));
        assert!(linky.score < prose.score);
    }

    #[test]
    fn text_len_ignores_urls_and_punctuation() {
        let n = text_len("[ab](https://a-very-long-url.example/path)");
        assert_eq!(n, 2);
    }
}
