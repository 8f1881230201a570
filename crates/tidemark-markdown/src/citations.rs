//! Citation transform: inline links become `text [n]` with a shared
//! references footer. Implemented as a bracket-matching scanner rather than
//! a regex so nested brackets and escapes are handled exactly once.

use std::collections::HashMap;

/// Maximum distance the scanner will look for a matching bracket or paren.
/// Past this, the candidate is treated as plain text.
const MAX_LOOKAHEAD: usize = 2000;

/// Rewrite `[text](url)` links into `text [n]` citations, appending a
/// `References:` footer. Images are preserved verbatim; fragment, `mailto:`,
/// `tel:`, `javascript:`, and `data:` links stay inline. A URL cited twice
/// keeps its first number.
pub fn to_citations(markdown: &str) -> String {
    let bytes = markdown.as_bytes();
    let mut out = String::with_capacity(markdown.len());
    let mut refs: Vec<String> = Vec::new();
    let mut numbers: HashMap<String, usize> = HashMap::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.push_str(&markdown[i..i + 2]);
                i += 2;
            }
            b'!' if bytes.get(i + 1) == Some(&b'[') => {
                // Image: copy the whole construct verbatim.
                match parse_link_at(bytes, i + 1) {
                    Some(link) => {
                        out.push_str(&markdown[i..link.end]);
                        i = link.end;
                    }
                    None => {
                        out.push('!');
                        i += 1;
                    }
                }
            }
            b'[' => match parse_link_at(bytes, i) {
                Some(link) => {
                    let text = &markdown[link.text_start..link.text_end];
                    let url = &markdown[link.url_start..link.url_end];
                    if keep_inline(url) {
                        out.push_str(&markdown[i..link.end]);
                    } else {
                        let n = *numbers.entry(url.to_string()).or_insert_with(|| {
                            refs.push(url.to_string());
                            refs.len()
                        });
                        out.push_str(text);
                        out.push_str(&format!(" [{n}]"));
                    }
                    i = link.end;
                }
                None => {
                    out.push('[');
                    i += 1;
                }
            },
            _ => {
                // Copy the full UTF-8 character.
                let ch_len = utf8_len(bytes[i]);
                out.push_str(&markdown[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    if !refs.is_empty() {
        out = out.trim_end().to_string();
        out.push_str("\n\nReferences:\n");
        for (idx, url) in refs.iter().enumerate() {
            out.push_str(&format!("[{}]: {url}\n", idx + 1));
        }
        out = out.trim_end().to_string();
    }

    out
}

fn keep_inline(url: &str) -> bool {
    url.starts_with('#')
        || url.starts_with("mailto:")
        || url.starts_with("tel:")
        || url.starts_with("javascript:")
        || url.starts_with("data:")
}

struct LinkSpan {
    text_start: usize,
    text_end: usize,
    url_start: usize,
    url_end: usize,
    end: usize,
}

/// Parse `[text](url)` starting at the `[` at `start`. Returns `None` when
/// the construct is not a link (no matching bracket, no following paren, or
/// the lookahead budget is exceeded).
fn parse_link_at(bytes: &[u8], start: usize) -> Option<LinkSpan> {
    debug_assert_eq!(bytes[start], b'[');
    let limit = (start + MAX_LOOKAHEAD).min(bytes.len());

    // Matching `]` with depth counting and escape handling.
    let mut depth = 1usize;
    let mut i = start + 1;
    let text_start = i;
    let text_end = loop {
        if i >= limit {
            return None;
        }
        match bytes[i] {
            b'\\' => i += 2,
            b'[' => {
                depth += 1;
                i += 1;
            }
            b']' => {
                depth -= 1;
                if depth == 0 {
                    break i;
                }
                i += 1;
            }
            _ => i += 1,
        }
    };

    // Must be directly followed by `(`.
    let paren_open = text_end + 1;
    if bytes.get(paren_open) != Some(&b'(') {
        return None;
    }

    let mut depth = 1usize;
    let mut i = paren_open + 1;
    let url_start = i;
    let url_end = loop {
        if i >= limit {
            return None;
        }
        match bytes[i] {
            b'\\' => i += 2,
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break i;
                }
                i += 1;
            }
            _ => i += 1,
        }
    };

    Some(LinkSpan {
        text_start,
        text_end,
        url_start,
        url_end,
        end: url_end + 1,
    })
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b & 0xe0 == 0xc0 => 2,
        b if b & 0xf0 == 0xe0 => 3,
        _ => 4,
    }
}
