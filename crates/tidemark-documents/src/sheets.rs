//! Spreadsheet and CSV decoding: one Markdown table per sheet, capped rows,
//! sanitised cells.

use crate::DecodedDocument;
use calamine::{Reader, Xls, Xlsx};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use tidemark_types::{ConvertError, Result};
use tracing::debug;

/// Row cap per sheet; a truncation notice is appended when exceeded.
const MAX_ROWS: usize = 1000;

static MD_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("static regex"));

static SHEET_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w .()-]+").expect("static regex"));

/// Sanitise one cell for embedding in a Markdown table: escape pipes, strip
/// angle brackets, unwrap markdown links to their text.
pub fn sanitize_cell(raw: &str) -> String {
    let no_links = MD_LINK_RE.replace_all(raw, "$1");
    no_links
        .replace('<', "")
        .replace('>', "")
        .replace('|', "\\|")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned = SHEET_NAME_RE.replace_all(raw, " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.to_string()
    }
}

fn render_table(rows: &[Vec<String>], out: &mut String) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return;
    }
    for (i, row) in rows.iter().enumerate() {
        let mut cells = row.clone();
        cells.resize(width, String::new());
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
        if i == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
}

/// Decode an XLSX (or legacy XLS) workbook, one section per sheet.
pub fn decode_workbook(bytes: &[u8]) -> Result<DecodedDocument> {
    let sheets = read_xlsx(bytes).or_else(|_| read_xls(bytes))?;
    if sheets.is_empty() {
        return Err(ConvertError::DocumentConversionFailed(
            "workbook has no sheets".into(),
        ));
    }

    let mut md = String::new();
    for (name, rows, truncated) in sheets {
        md.push_str(&format!("## {}\n\n", sanitize_sheet_name(&name)));
        render_table(&rows, &mut md);
        if truncated {
            md.push_str(&format!("\n*Truncated at {MAX_ROWS} rows.*\n"));
        }
        md.push('\n');
    }

    Ok(DecodedDocument {
        markdown: md.trim().to_string(),
        title: None,
    })
}

type SheetRows = Vec<(String, Vec<Vec<String>>, bool)>;

fn read_xlsx(bytes: &[u8]) -> Result<SheetRows> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| ConvertError::DocumentConversionFailed(format!("xlsx: {e}")))?;
    collect_sheets(&mut workbook)
}

fn read_xls(bytes: &[u8]) -> Result<SheetRows> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| ConvertError::DocumentConversionFailed(format!("xls: {e}")))?;
    collect_sheets(&mut workbook)
}

fn collect_sheets<R: Reader<Cursor<Vec<u8>>>>(workbook: &mut R) -> Result<SheetRows> {
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());

    for name in names {
        let range = match workbook.worksheet_range(&name) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut truncated = false;
        for row in range.rows() {
            if rows.len() >= MAX_ROWS {
                truncated = true;
                break;
            }
            rows.push(row.iter().map(|c| sanitize_cell(&c.to_string())).collect());
        }
        debug!(sheet = %name, rows = rows.len(), truncated, "sheet decoded");
        sheets.push((name, rows, truncated));
    }
    Ok(sheets)
}

/// Decode CSV into a single Markdown table.
pub fn decode_csv(bytes: &[u8]) -> Result<DecodedDocument> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut truncated = false;
    for record in reader.records() {
        let record =
            record.map_err(|e| ConvertError::DocumentConversionFailed(format!("csv: {e}")))?;
        if rows.len() >= MAX_ROWS {
            truncated = true;
            break;
        }
        rows.push(record.iter().map(sanitize_cell).collect());
    }

    if rows.is_empty() {
        return Err(ConvertError::DocumentConversionFailed("csv: empty".into()));
    }

    let mut md = String::new();
    render_table(&rows, &mut md);
    if truncated {
        md.push_str(&format!("\n*Truncated at {MAX_ROWS} rows.*\n"));
    }

    Ok(DecodedDocument {
        markdown: md.trim().to_string(),
        title: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_pipes_and_strips_angles() {
        assert_eq!(sanitize_cell("a|b"), "a\\|b");
        assert_eq!(sanitize_cell("<b>bold</b>"), "bbold/b");
        assert_eq!(sanitize_cell("[text](https://x.test)"), "text");
        assert_eq!(sanitize_cell("line\nbreak"), "line break");
    }

    #[test]
    fn sheet_names_are_safe_for_headings() {
        assert_eq!(sanitize_sheet_name("Q3 (final)"), "Q3 (final)");
        assert_eq!(sanitize_sheet_name("#weird!!name"), "weird name");
        assert_eq!(sanitize_sheet_name("###"), "Sheet");
    }

    #[test]
    fn csv_renders_a_table() {
        let csv = b"name,score\nalice,10\nbob,12\n";
        let doc = decode_csv(csv).unwrap();
        assert!(doc.markdown.contains("| name | score |"));
        assert!(doc.markdown.contains("| --- | --- |"));
        assert!(doc.markdown.contains("| bob | 12 |"));
    }

    #[test]
    fn csv_caps_rows() {
        let mut data = String::from("h\n");
        for i in 0..(MAX_ROWS + 50) {
            data.push_str(&format!("{i}\n"));
        }
        let doc = decode_csv(data.as_bytes()).unwrap();
        assert!(doc.markdown.contains("Truncated at 1000 rows"));
    }

    #[test]
    fn empty_csv_fails() {
        assert!(decode_csv(b"").is_err());
    }

    #[test]
    fn ragged_csv_rows_are_padded() {
        let doc = decode_csv(b"a,b,c\n1\n").unwrap();
        assert!(doc.markdown.contains("| 1 |  |  |"), "{}", doc.markdown);
    }

    #[test]
    fn garbage_workbook_fails() {
        assert!(decode_workbook(b"not a workbook").is_err());
    }
}
