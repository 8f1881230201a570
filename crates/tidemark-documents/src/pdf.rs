//! PDF text extraction.

use crate::DecodedDocument;
use std::time::Duration;
use tidemark_types::{ConvertError, Result};
use tracing::{debug, warn};

/// Hard ceiling on extraction time; malformed PDFs can loop the parser.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum trimmed output before we call a PDF extractable.
const MIN_TEXT_CHARS: usize = 20;

pub async fn decode(bytes: Vec<u8>) -> Result<DecodedDocument> {
    let handle = tokio::task::spawn_blocking(move || extract_sync(&bytes));

    let outcome = tokio::time::timeout(EXTRACT_TIMEOUT, handle)
        .await
        .map_err(|_| ConvertError::Timeout("pdf extraction".into()))?;

    match outcome {
        Ok(result) => result,
        // A panic inside the parser surfaces as a join error.
        Err(join_err) => {
            warn!(error = %join_err, "pdf extraction task died");
            Err(ConvertError::DocumentConversionFailed(
                "pdf parser crashed".into(),
            ))
        }
    }
}

fn extract_sync(bytes: &[u8]) -> Result<DecodedDocument> {
    let pages = count_pages(bytes);
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ConvertError::DocumentConversionFailed(format!("pdf: {e}")))?;

    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_CHARS {
        return Err(ConvertError::DocumentConversionFailed(
            "not extractable: no text layer".into(),
        ));
    }
    debug!(pages, chars = trimmed.len(), "pdf extracted");

    Ok(DecodedDocument {
        markdown: format!("**Pages:** {pages}\n\n---\n\n{trimmed}"),
        title: None,
    })
}

fn count_pages(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len())
        .unwrap_or(0)
}
