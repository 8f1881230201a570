use serde::{Deserialize, Serialize};
use url::Url;

/// Document formats the decoders understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Csv,
}

impl DocumentFormat {
    /// Map a bare, lower-cased MIME type to a format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/msword" => Some(Self::Docx),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel" => Some(Self::Xlsx),
            "text/csv" | "application/csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Fallback detection from a URL path extension, used for
    /// `application/octet-stream` responses.
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            "xlsx" | "xls" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the safe fetcher hands to the pipeline. Exactly one variant per
/// fetch; the orchestrator routes on it.
#[derive(Debug, Clone)]
pub enum FetchedPayload {
    Html {
        html: String,
        final_url: Url,
    },
    Feed {
        xml: Vec<u8>,
        final_url: Url,
    },
    Document {
        bytes: Vec<u8>,
        format: DocumentFormat,
    },
    /// An upstream anti-bot interstitial. Kept so the orchestrator can
    /// record the reason and route straight to the stronger tiers.
    Challenge {
        html: String,
        reason: String,
    },
}

impl FetchedPayload {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Html { .. } => "html",
            Self::Feed { .. } => "feed",
            Self::Document { .. } => "document",
            Self::Challenge { .. } => "challenge",
        }
    }
}
