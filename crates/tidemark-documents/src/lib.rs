//! Document decoders: PDF, DOCX, XLSX/XLS, CSV → Markdown.

mod docx;
mod pdf;
mod sheets;

pub use sheets::sanitize_cell;

use tidemark_types::{DocumentFormat, Result};

/// A decoded document, ready for the post-processing passes.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
    pub markdown: String,
    pub title: Option<String>,
}

/// Decode `bytes` according to `format`. PDF extraction runs on a blocking
/// thread under a 30 s hard timeout; the other formats decode inline.
pub async fn decode(bytes: Vec<u8>, format: DocumentFormat) -> Result<DecodedDocument> {
    match format {
        DocumentFormat::Pdf => pdf::decode(bytes).await,
        DocumentFormat::Docx => docx::decode(&bytes),
        DocumentFormat::Xlsx => sheets::decode_workbook(&bytes),
        DocumentFormat::Csv => sheets::decode_csv(&bytes),
    }
}
