//! Sanitisation of user-visible error strings and log fields.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Budget for client-visible error messages.
const MESSAGE_BUDGET: usize = 300;
/// Budget for echoed URLs.
const URL_BUDGET: usize = 2048;
/// Budget for user-supplied strings entering a log line.
const LOG_BUDGET: usize = 500;

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[A-Za-z]:\\|/(?:home|usr|var|etc|tmp|opt|root)/)[^\s:)]*")
        .expect("static regex")
});

static STACK_FRAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+at\s+\S+\(?[^\s)]*:\d+:\d+\)?").expect("static regex"));

/// Clean an error message for a client: no filesystem paths, no stack
/// fragments, bounded length.
pub fn sanitize_error(message: &str) -> String {
    let message = PATH_RE.replace_all(message, "[internal]");
    let message = STACK_FRAME_RE.replace_all(&message, "");
    let message = message.trim();
    truncate_chars(message, MESSAGE_BUDGET)
}

/// Strip query and fragment from a URL echoed in an error body, capped at
/// 2048 characters.
pub fn sanitize_url(raw: &str) -> String {
    let stripped = match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    truncate_chars(&stripped, URL_BUDGET)
}

/// Make a user-supplied string safe for a log line: control characters
/// escaped, length capped.
pub fn sanitize_for_log(value: &str) -> String {
    let escaped: String = value
        .chars()
        .map(|c| {
            if c.is_control() {
                char::REPLACEMENT_CHARACTER
            } else {
                c
            }
        })
        .collect();
    truncate_chars(&escaped, LOG_BUDGET)
}

fn truncate_chars(value: &str, budget: usize) -> String {
    if value.chars().count() <= budget {
        value.to_string()
    } else {
        value.chars().take(budget).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_become_internal() {
        let msg = "failed to open /home/svc/secrets/key.pem for reading";
        let out = sanitize_error(msg);
        assert!(!out.contains("key.pem"));
        assert!(out.contains("[internal]"));

        let win = r"error in C:\Users\svc\app\config.toml";
        assert!(sanitize_error(win).contains("[internal]"));
    }

    #[test]
    fn stack_frames_are_dropped() {
        let msg = "boom at handler (/srv/app/dist/index.js:10:42) while rendering";
        let out = sanitize_error(msg);
        assert!(!out.contains(":10:42"));
    }

    #[test]
    fn long_messages_are_trimmed() {
        let long = "x".repeat(1000);
        assert_eq!(sanitize_error(&long).chars().count(), 300);
    }

    #[test]
    fn urls_lose_query_and_fragment() {
        let out = sanitize_url("https://example.com/a?token=secret#frag");
        assert_eq!(out, "https://example.com/a");
    }

    #[test]
    fn unparseable_urls_still_lose_query() {
        assert_eq!(sanitize_url("notaurl?x=1"), "notaurl");
    }

    #[test]
    fn log_fields_escape_control_chars() {
        let out = sanitize_for_log("line1\ninjected=true\r\x1b[31m");
        assert!(!out.contains('\n'));
        assert!(!out.contains('\x1b'));
    }
}
