use serde::{Deserialize, Serialize};

/// Letter grade derived from the continuous quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::A
        } else if score >= 0.6 {
            Self::B
        } else if score >= 0.4 {
            Self::C
        } else if score >= 0.2 {
            Self::D
        } else {
            Self::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

/// Quality assessment of a markdown rendition. `score` is a deterministic
/// pure function of the markdown string (see the markdown crate).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quality {
    pub score: f64,
    pub grade: Grade,
}

impl Quality {
    pub fn from_score(score: f64) -> Self {
        let score = (score.clamp(0.0, 1.0) * 100.0).round() / 100.0;
        Self {
            score,
            grade: Grade::from_score(score),
        }
    }
}

/// The gateway's product: one conversion, never mutated after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub title: String,
    pub markdown: String,
    pub fit_markdown: String,
    pub tokens: usize,
    pub fit_tokens: usize,
    /// Stage whose output was chosen: `fetch`, `browser`, `llm`,
    /// `baas:<provider>`, `youtube`, `feed`, `document:<fmt>`.
    pub tier: String,
    /// Extraction strategy that produced the content.
    pub method: String,
    pub quality: Quality,
    /// Whether a readability-class extractor succeeded.
    pub readability: bool,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub site_name: Option<String>,
    pub url: String,
    pub total_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_challenge: Option<bool>,
    /// Ordered tier-transition log; present when any escalation happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Vec<String>>,
}

impl ConversionResult {
    /// Skeleton with empty content, filled in by the orchestrator.
    pub fn empty(url: &str) -> Self {
        Self {
            title: String::new(),
            markdown: String::new(),
            fit_markdown: String::new(),
            tokens: 0,
            fit_tokens: 0,
            tier: String::new(),
            method: String::new(),
            quality: Quality::from_score(0.0),
            readability: false,
            excerpt: None,
            byline: None,
            site_name: None,
            url: url.to_string(),
            total_ms: 0,
            cf_challenge: None,
            escalation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(0.8), Grade::A);
        assert_eq!(Grade::from_score(0.79), Grade::B);
        assert_eq!(Grade::from_score(0.6), Grade::B);
        assert_eq!(Grade::from_score(0.4), Grade::C);
        assert_eq!(Grade::from_score(0.2), Grade::D);
        assert_eq!(Grade::from_score(0.19), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn quality_rounds_to_two_decimals() {
        let q = Quality::from_score(0.61537);
        assert_eq!(q.score, 0.62);
        assert_eq!(q.grade, Grade::B);
    }

    #[test]
    fn quality_clamps() {
        assert_eq!(Quality::from_score(1.7).score, 1.0);
        assert_eq!(Quality::from_score(-0.3).score, 0.0);
    }
}
