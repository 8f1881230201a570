//! Cleaning of raw LLM output before it enters the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"));

static TRAILING_THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*$").expect("static regex"));

/// Strip reasoning tags and unwrap a whole-output code fence.
pub fn clean_llm_output(output: &str) -> String {
    let mut text = THINK_BLOCK_RE.replace_all(output, "").into_owned();
    text = TRAILING_THINK_RE.replace_all(&text, "").into_owned();
    let text = text.trim();

    // Some models fence their whole answer despite instructions.
    if let Some(unwrapped) = unwrap_full_fence(text) {
        return unwrapped.trim().to_string();
    }
    text.to_string()
}

fn unwrap_full_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let body_start = rest.find('\n')? + 1;
    let rest = &rest[body_start..];
    let body = rest.strip_suffix("```").or_else(|| {
        rest.strip_suffix("```\n")
    })?;
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_balanced_think_blocks() {
        let out = clean_llm_output("<think>reasoning here</think># Title\n\nBody");
        assert_eq!(out, "# Title\n\nBody");
    }

    #[test]
    fn strips_unbalanced_trailing_think() {
        let out = clean_llm_output("# Title\n\nBody<think>never closed");
        assert_eq!(out, "# Title\n\nBody");
    }

    #[test]
    fn unwraps_full_fence() {
        let out = clean_llm_output("```markdown\n# Title\n\nBody\n```");
        assert_eq!(out, "# Title\n\nBody");
    }

    #[test]
    fn leaves_inner_fences_alone() {
        let input = "# Title\n\n```rust\nfn main() {}\n```\n\nAfter";
        assert_eq!(clean_llm_output(input), input);
    }

    #[test]
    fn plain_output_passes_through() {
        assert_eq!(clean_llm_output("  plain  "), "plain");
    }
}
