//! Shared phrase and pattern tables used by the usable predicate, the
//! challenge detector, and the quality scorer.

/// Phrases that identify anti-bot interstitials and error shells. Matched
/// case-insensitively against extracted text and titles.
pub const ERROR_PATTERNS: &[&str] = &[
    "just a moment",
    "please enable",
    "checking your browser",
    "checking the site connection",
    "access denied",
    "verify you are human",
    "verifying you are human",
    "enable javascript",
    "attention required",
    "ddos protection",
    "security check",
    "cloudflare ray id",
    "captcha",
    "are you a robot",
    "browser is out of date",
];

/// Markers of client-side framework payloads that survive naive extraction
/// as serialized state rather than readable prose.
pub const SPA_PATTERNS: &[&str] = &[
    "self.__next_f =",
    "__NUXT__",
    "window.__remixContext",
    "ng-version=",
    "___gatsby",
    "q:container",
    "ember-application",
    "astro-island",
    "webpackChunk",
    "window.__INITIAL_STATE__",
];

/// Boilerplate phrases counted by the quality scorer.
pub const BOILERPLATE_PHRASES: &[&str] = &[
    "we use cookies",
    "accept all cookies",
    "cookie policy",
    "privacy policy",
    "terms of service",
    "subscribe to our newsletter",
    "sign up for our newsletter",
    "all rights reserved",
    "enable notifications",
    "continue reading",
    "advertisement",
    "sponsored content",
];

/// True when any anti-bot / error-shell phrase occurs in `text`.
pub fn contains_error_pattern(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_PATTERNS.iter().any(|p| lower.contains(p))
}

/// The first matching error phrase, for escalation-log messages.
pub fn matched_error_pattern(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    ERROR_PATTERNS.iter().copied().find(|p| lower.contains(p))
}

/// True when a serialized framework payload leaks into the text.
pub fn contains_spa_pattern(text: &str) -> bool {
    SPA_PATTERNS.iter().any(|p| text.contains(p))
}

/// Number of distinct boilerplate phrases present.
pub fn boilerplate_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    BOILERPLATE_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_patterns_are_case_insensitive() {
        assert!(contains_error_pattern("Just a Moment..."));
        assert!(contains_error_pattern("ACCESS DENIED"));
        assert!(!contains_error_pattern("a perfectly fine article"));
    }

    #[test]
    fn matched_pattern_reports_the_phrase() {
        assert_eq!(
            matched_error_pattern("Checking your browser before accessing"),
            Some("checking your browser")
        );
        assert_eq!(matched_error_pattern("hello"), None);
    }

    #[test]
    fn spa_patterns_are_case_sensitive_markers() {
        assert!(contains_spa_pattern("<script>self.__next_f = []</script>"));
        assert!(contains_spa_pattern("window.__INITIAL_STATE__ = {}"));
        assert!(!contains_spa_pattern("plain text"));
    }

    #[test]
    fn boilerplate_counts_distinct_phrases() {
        let text = "We use cookies. See our Privacy Policy and Cookie Policy.";
        assert_eq!(boilerplate_hits(text), 3);
    }
}
