//! YouTube transcript path: caption discovery through the player RPC and
//! timed-text fetch. Every failure degrades to `None` so the orchestrator
//! falls through to the generic HTML tiers.

mod timedtext;

pub use timedtext::{format_timestamp, parse_timed_text, Segment};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

static VIDEO_ID_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:www\.)?youtube\.com/watch\?(?:.*&)?v=([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
        r"(?:www\.)?youtube\.com/embed/([A-Za-z0-9_-]{11})",
        r"(?:www\.)?youtube\.com/shorts/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Hosts the timed-text URL must resolve to; anything else is refused.
const TIMEDTEXT_HOSTS: &[&str] = &["www.youtube.com", "youtube.com"];

const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player";
const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// The Android client identity the player RPC expects.
const ANDROID_CLIENT_VERSION: &str = "19.09.37";

/// Extract an 11-character video id from a YouTube URL.
pub fn video_id(url: &Url) -> Option<String> {
    let s = url.as_str();
    VIDEO_ID_RES
        .iter()
        .find_map(|re| re.captures(s).map(|c| c[1].to_string()))
}

/// A rendered transcript for a video.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub markdown: String,
    pub title: String,
}

pub struct YoutubeClient {
    http: reqwest::Client,
}

impl Default for YoutubeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YoutubeClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Fetch and render a transcript. Any failure along the way returns
    /// `None`; the caller treats that as "no transcript available".
    pub async fn transcript(&self, url: &Url) -> Option<Transcript> {
        let id = video_id(url)?;

        let caption_url = match self.caption_track_url(&id).await {
            Some(u) => u,
            None => {
                debug!(video = id, "no caption track");
                return None;
            }
        };

        let xml = self.fetch_timed_text(&caption_url).await?;
        let segments = parse_timed_text(&xml);
        if segments.is_empty() {
            debug!(video = id, "empty transcript");
            return None;
        }

        let title = self
            .oembed_title(url)
            .await
            .unwrap_or_else(|| format!("YouTube video {id}"));

        let mut md = format!("# {title}\n\n**Video:** {url}\n\n## Transcript\n\n");
        for seg in &segments {
            md.push_str(&format!(
                "[{}] {}\n",
                format_timestamp(seg.start_secs),
                seg.text
            ));
        }

        Some(Transcript {
            markdown: md.trim().to_string(),
            title,
        })
    }

    /// POST the player RPC as the Android client and pick the English (or
    /// first) caption track.
    async fn caption_track_url(&self, video_id: &str) -> Option<String> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": ANDROID_CLIENT_VERSION,
                    "androidSdkVersion": 30,
                }
            },
            "videoId": video_id,
        });

        let response = self
            .http
            .post(PLAYER_ENDPOINT)
            .query(&[("prettyPrint", "false")])
            .json(&body)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "player RPC failed");
            return None;
        }
        let payload: Value = response.json().await.ok()?;

        let tracks = payload
            .get("captions")?
            .get("playerCaptionsTracklistRenderer")?
            .get("captionTracks")?
            .as_array()?;

        let pick = tracks
            .iter()
            .find(|t| {
                t.get("languageCode")
                    .and_then(Value::as_str)
                    .map_or(false, |lc| lc.starts_with("en"))
            })
            .or_else(|| tracks.first())?;

        pick.get("baseUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Fetch the timed-text XML; the URL must sit on a whitelisted host.
    async fn fetch_timed_text(&self, raw_url: &str) -> Option<String> {
        let url = Url::parse(raw_url).ok()?;
        let host = url.host_str()?;
        if !TIMEDTEXT_HOSTS.contains(&host) {
            debug!(host, "timed-text host rejected");
            return None;
        }

        let response = self.http.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }

    async fn oembed_title(&self, video_url: &Url) -> Option<String> {
        let response = self
            .http
            .get(OEMBED_ENDPOINT)
            .query(&[("url", video_url.as_str()), ("format", "json")])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let payload: Value = response.json().await.ok()?;
        payload
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_of(raw: &str) -> Option<String> {
        video_id(&Url::parse(raw).unwrap())
    }

    #[test]
    fn recognises_all_url_shapes() {
        for raw in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
        ] {
            assert_eq!(id_of(raw).as_deref(), Some("dQw4w9WgXcQ"), "{raw}");
        }
    }

    #[test]
    fn rejects_non_video_urls() {
        assert!(id_of("https://www.youtube.com/feed/subscriptions").is_none());
        assert!(id_of("https://example.com/watch?v=dQw4w9WgXcQ2").is_none());
        assert!(id_of("https://vimeo.com/12345").is_none());
    }

    #[test]
    fn timedtext_host_whitelist() {
        assert!(TIMEDTEXT_HOSTS.contains(&"www.youtube.com"));
        assert!(!TIMEDTEXT_HOSTS.contains(&"evil.example"));
    }
}
