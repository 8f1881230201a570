//! DOCX decoding: parse the document tree, rebuild it as HTML, and hand it
//! to the Markdown pipeline.

use crate::DecodedDocument;
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};
use tidemark_types::{ConvertError, Result};

pub fn decode(bytes: &[u8]) -> Result<DecodedDocument> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| ConvertError::DocumentConversionFailed(format!("docx: {e}")))?;

    let mut html = String::new();
    let mut title = None;

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                let text = paragraph_text(p);
                if text.trim().is_empty() {
                    continue;
                }
                match heading_level(p) {
                    Some(level) => {
                        if title.is_none() && level == 1 {
                            title = Some(text.trim().to_string());
                        }
                        html.push_str(&format!("<h{level}>{}</h{level}>", escape(&text)));
                    }
                    None => html.push_str(&format!("<p>{}</p>", escape(&text))),
                }
            }
            DocumentChild::Table(table) => {
                html.push_str("<table>");
                for row_child in &table.rows {
                    let TableChild::TableRow(row) = row_child;
                    html.push_str("<tr>");
                    for cell_child in &row.cells {
                        let TableRowChild::TableCell(cell) = cell_child;
                        let mut cell_text = String::new();
                        for content in &cell.children {
                            if let TableCellContent::Paragraph(p) = content {
                                if !cell_text.is_empty() {
                                    cell_text.push(' ');
                                }
                                cell_text.push_str(&paragraph_text(p));
                            }
                        }
                        html.push_str(&format!("<td>{}</td>", escape(&cell_text)));
                    }
                    html.push_str("</tr>");
                }
                html.push_str("</table>");
            }
            _ => {}
        }
    }

    if html.is_empty() {
        return Err(ConvertError::DocumentConversionFailed(
            "docx: empty document".into(),
        ));
    }

    Ok(DecodedDocument {
        markdown: tidemark_markdown::html_to_markdown(&html),
        title,
    })
}

fn paragraph_text(p: &Paragraph) -> String {
    let mut out = String::new();
    for child in &p.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                match rc {
                    RunChild::Text(t) => out.push_str(&t.text),
                    RunChild::Tab(_) => out.push('\t'),
                    RunChild::Break(_) => out.push('\n'),
                    _ => {}
                }
            }
        }
    }
    out
}

/// `Heading1`..`Heading6` styles map onto `<h1>`..`<h6>`.
fn heading_level(p: &Paragraph) -> Option<usize> {
    let style = p.property.style.as_ref()?;
    let name = style.val.to_ascii_lowercase();
    let digits = name.strip_prefix("heading")?;
    let level: usize = digits.trim().parse().ok()?;
    (1..=6).contains(&level).then_some(level)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Run};

    fn build_docx(docx: Docx) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn round_trips_headings_and_paragraphs() {
        let bytes = build_docx(
            Docx::new()
                .add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text("Quarterly Report"))
                        .style("Heading1"),
                )
                .add_paragraph(
                    Paragraph::new().add_run(Run::new().add_text("Revenue grew modestly.")),
                ),
        );

        let doc = decode(&bytes).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Quarterly Report"));
        assert!(doc.markdown.contains("# Quarterly Report"));
        assert!(doc.markdown.contains("Revenue grew modestly."));
    }

    #[test]
    fn garbage_fails_cleanly() {
        let err = decode(b"not a zip archive").unwrap_err();
        assert!(matches!(err, ConvertError::DocumentConversionFailed(_)));
    }
}
