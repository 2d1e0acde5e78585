//! Plain-text extraction for uploaded nutritionist documents.

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use thiserror::Error;
use tracing::debug;

pub const MAX_SIZE_BYTES: usize = 5 * 1024 * 1024;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_TEXT: &str = "text/plain";

pub const SUPPORTED_MIMES: [&str; 4] = [MIME_PDF, MIME_DOCX, MIME_MARKDOWN, MIME_TEXT];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}. Allowed: PDF, DOCX, MD, TXT.")]
    UnsupportedType(String),

    #[error("The uploaded file contains no readable text.")]
    Empty,

    #[error("{0}")]
    Parse(String),
}

/// Strips parameters such as `; charset=utf-8` and lowercases.
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_supported(mime: &str) -> bool {
    SUPPORTED_MIMES.contains(&essence(mime).as_str())
}

/// Browsers often send `application/octet-stream`; fall back to the file
/// extension in that case.
pub fn resolve_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    let declared = content_type.map(essence).unwrap_or_default();
    if is_supported(&declared) {
        return declared;
    }
    let ext = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => MIME_PDF.to_string(),
        Some("docx") => MIME_DOCX.to_string(),
        Some("md" | "markdown") => MIME_MARKDOWN.to_string(),
        Some("txt") => MIME_TEXT.to_string(),
        _ => declared,
    }
}

pub fn extract_text(mime: &str, data: &[u8]) -> Result<String, ExtractError> {
    let mime = essence(mime);
    let text = match mime.as_str() {
        MIME_PDF => pdf_extract::extract_text_from_mem(data)
            .map_err(|e| ExtractError::Parse(format!("PDF: {e}")))?,
        MIME_DOCX => docx_text(data)?,
        MIME_MARKDOWN | MIME_TEXT => String::from_utf8_lossy(data).into_owned(),
        _ => return Err(ExtractError::UnsupportedType(mime)),
    };

    let text = text.trim().to_string();
    debug!(%mime, chars = text.len(), "extracted document text");
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

fn docx_text(data: &[u8]) -> Result<String, ExtractError> {
    let docx = docx_rs::read_docx(data).map_err(|e| ExtractError::Parse(format!("DOCX: {e}")))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
            DocumentChild::Table(t) => table_lines(t, &mut lines),
            _ => {}
        }
    }
    Ok(lines.join("\n"))
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

// one line per row, cells separated by " | "
fn table_lines(table: &Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        #[allow(irrefutable_let_patterns)]
        let TableChild::TableRow(row) = row else {
            continue;
        };
        let mut cells = Vec::new();
        for cell in &row.cells {
            #[allow(irrefutable_let_patterns)]
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            let mut parts = Vec::new();
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(p) => parts.push(paragraph_text(p)),
                    TableCellContent::Table(inner) => {
                        let mut nested = Vec::new();
                        table_lines(inner, &mut nested);
                        parts.extend(nested);
                    }
                    _ => {}
                }
            }
            cells.push(parts.join(" "));
        }
        lines.push(cells.join(" | "));
    }
}
