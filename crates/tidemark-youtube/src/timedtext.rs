//! Timed-text parsing: the modern `<p t d>` format and the legacy
//! `<text start dur>` format, with HTML entity decoding.

use quick_xml::events::Event;
use quick_xml::Reader;

/// One caption segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_secs: u64,
    pub text: String,
}

/// Parse either timed-text flavour into ordered segments. Unparseable
/// documents yield an empty vec.
pub fn parse_timed_text(xml: &str) -> Vec<Segment> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments = Vec::new();
    let mut current_start: Option<u64> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(el)) | Ok(Event::Empty(el)) => {
                let name = el.name();
                let name = name.as_ref();
                if name == b"p" || name == b"text" {
                    flush(&mut segments, &mut current_start, &mut current_text);
                    current_start = start_attr(&el, name);
                }
            }
            Ok(Event::End(el)) => {
                let name = el.name();
                let name = name.as_ref();
                if name == b"p" || name == b"text" {
                    flush(&mut segments, &mut current_start, &mut current_text);
                }
            }
            Ok(Event::Text(t)) => {
                if current_start.is_some() {
                    if let Ok(decoded) = t.unescape() {
                        if !current_text.is_empty() {
                            current_text.push(' ');
                        }
                        // Captions are frequently double-encoded.
                        current_text
                            .push_str(html_escape::decode_html_entities(&decoded).trim());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    flush(&mut segments, &mut current_start, &mut current_text);
    segments
}

fn flush(segments: &mut Vec<Segment>, start: &mut Option<u64>, text: &mut String) {
    if let Some(s) = start.take() {
        let t = text.trim().to_string();
        if !t.is_empty() {
            segments.push(Segment {
                start_secs: s,
                text: t,
            });
        }
    }
    text.clear();
}

/// `t` is milliseconds in the modern format; `start` is seconds (possibly
/// fractional) in the legacy one.
fn start_attr(el: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<u64> {
    let key: &[u8] = if name == b"p" { b"t" } else { b"start" };
    for attr in el.attributes().flatten() {
        if attr.key.as_ref() == key {
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value: f64 = raw.parse().ok()?;
            let secs = if name == b"p" { value / 1000.0 } else { value };
            return Some(secs.floor() as u64);
        }
    }
    None
}

/// `[MM:SS]`, or `[H:MM:SS]` past the hour.
pub fn format_timestamp(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_format() {
        let xml = r#"<timedtext><body>
            <p t="0" d="2000">Hello there</p>
            <p t="2500" d="1800">General &amp;amp; specific</p>
        </body></timedtext>"#;
        let segs = parse_timed_text(xml);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0], Segment { start_secs: 0, text: "Hello there".into() });
        assert_eq!(segs[1].start_secs, 2);
        assert_eq!(segs[1].text, "General & specific");
    }

    #[test]
    fn parses_legacy_format() {
        let xml = r#"<transcript>
            <text start="12.4" dur="3.1">First line</text>
            <text start="75.0" dur="2.0">Second line</text>
        </transcript>"#;
        let segs = parse_timed_text(xml);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].start_secs, 12);
        assert_eq!(segs[1].start_secs, 75);
    }

    #[test]
    fn empty_or_garbage_yields_no_segments() {
        assert!(parse_timed_text("").is_empty());
        assert!(parse_timed_text("not xml at all").is_empty());
        assert!(parse_timed_text("<timedtext></timedtext>").is_empty());
    }

    #[test]
    fn timestamps_format_per_spec() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(59), "0:59");
        assert_eq!(format_timestamp(75), "1:15");
        assert_eq!(format_timestamp(3599), "59:59");
        assert_eq!(format_timestamp(3600), "1:00:00");
        assert_eq!(format_timestamp(3725), "1:02:05");
    }
}
