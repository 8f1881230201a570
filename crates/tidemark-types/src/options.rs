use serde::{Deserialize, Serialize};

/// Output mode for a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    /// Replace `markdown` with the pruned `fit_markdown`.
    Fit,
}

/// Link rendering style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Links {
    #[default]
    Inline,
    /// Numbered citations with a references footer.
    Citations,
}

/// Recognised conversion options, shared by the query-string surface and the
/// JSON bodies of `/batch` and `/async`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub mode: Mode,
    pub links: Links,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_browser: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_fetch: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_baas: bool,
}

impl ConvertOptions {
    /// Canonical suffix mixed into the cache fingerprint. Default values are
    /// omitted so that equivalent requests share a key.
    pub fn fingerprint_suffix(&self) -> String {
        let mut parts = Vec::new();
        if self.mode == Mode::Fit {
            parts.push("mode=fit".to_string());
        }
        if self.links == Links::Citations {
            parts.push("links=citations".to_string());
        }
        if let Some(max) = self.max_tokens {
            parts.push(format!("max_tokens={max}"));
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_empty_suffix() {
        assert_eq!(ConvertOptions::default().fingerprint_suffix(), "");
    }

    #[test]
    fn suffix_is_canonical() {
        let opts = ConvertOptions {
            mode: Mode::Fit,
            links: Links::Citations,
            max_tokens: Some(500),
            ..Default::default()
        };
        assert_eq!(
            opts.fingerprint_suffix(),
            "mode=fit&links=citations&max_tokens=500"
        );
    }

    #[test]
    fn deserializes_from_json_body() {
        let opts: ConvertOptions =
            serde_json::from_str(r#"{"mode":"fit","links":"citations","force_browser":true}"#)
                .unwrap();
        assert_eq!(opts.mode, Mode::Fit);
        assert_eq!(opts.links, Links::Citations);
        assert!(opts.force_browser);
        assert!(!opts.skip_baas);
    }
}
