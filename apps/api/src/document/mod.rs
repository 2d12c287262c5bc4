//! Turns an uploaded résumé file into plain text.
//!
//! PDF goes through `pdf-extract`, DOCX through its `word/document.xml` part,
//! legacy DOC through a UTF-16 printable-run scrape, plain text as UTF-8.

use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub mod extract;

pub use extract::{extract_basic_info, BasicAnalysis};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file exceeds the {limit} byte limit ({actual} bytes)")]
    TooLarge { limit: usize, actual: usize },

    #[error("file is empty")]
    Empty,

    #[error("could not read document: {0}")]
    Unreadable(String),
}

impl DocumentError {
    /// Error code surfaced in the HTTP envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::UnsupportedType(_) => "INVALID_FILE_TYPE",
            DocumentError::TooLarge { .. } => "FILE_TOO_LARGE",
            DocumentError::Empty => "EMPTY_FILE",
            DocumentError::Unreadable(_) => "UNREADABLE_FILE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
    Text,
}

impl DocumentKind {
    /// Resolves the kind from the declared MIME type, falling back to the file extension
    /// when the browser sends `application/octet-stream`.
    pub fn detect(mime: Option<&str>, file_name: &str) -> Result<Self, DocumentError> {
        let mime = mime.map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase());
        match mime.as_deref() {
            Some(MIME_PDF) => return Ok(DocumentKind::Pdf),
            Some(MIME_DOC) => return Ok(DocumentKind::Doc),
            Some(MIME_DOCX) => return Ok(DocumentKind::Docx),
            Some(MIME_TEXT) => return Ok(DocumentKind::Text),
            Some("application/octet-stream") | None => {}
            Some(other) => return Err(DocumentError::UnsupportedType(other.to_string())),
        }

        let ext = file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "doc" => Ok(DocumentKind::Doc),
            "docx" => Ok(DocumentKind::Docx),
            "txt" => Ok(DocumentKind::Text),
            _ => Err(DocumentError::UnsupportedType(file_name.to_string())),
        }
    }
}

/// Checks size limits before any parsing work is done.
pub fn validate_upload(len: usize, limit: usize) -> Result<(), DocumentError> {
    if len == 0 {
        return Err(DocumentError::Empty);
    }
    if len > limit {
        return Err(DocumentError::TooLarge { limit, actual: len });
    }
    Ok(())
}

/// Extracts plain text. CPU-bound; callers run it on a blocking thread.
pub fn parse_document(bytes: &[u8], kind: DocumentKind) -> Result<String, DocumentError> {
    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| DocumentError::Unreadable(format!("PDF extraction error: {e}")))?,
        DocumentKind::Docx => docx_text(bytes)?,
        DocumentKind::Doc => legacy_doc_text(bytes),
        DocumentKind::Text => String::from_utf8(bytes.to_vec())
            .map_err(|_| DocumentError::Unreadable("text file is not valid UTF-8".to_string()))?,
    };

    let text = normalize_whitespace(&text);
    if text.trim().is_empty() {
        return Err(DocumentError::Unreadable(
            "no text could be extracted".to_string(),
        ));
    }
    Ok(text)
}

static XML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{3000}]{2,}").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn docx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DocumentError::Unreadable(format!("DOCX archive error: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DocumentError::Unreadable(format!("DOCX body missing: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentError::Unreadable(format!("DOCX body unreadable: {e}")))?;
    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let xml = xml
        .replace("</w:p>", "\n")
        .replace("<w:tab/>", "\t")
        .replace("<w:br/>", "\n");
    let text = XML_TAG.replace_all(&xml, "");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Word 97 stores body text as UTF-16LE; keep runs of readable characters.
fn legacy_doc_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let mut out = String::new();
    let mut run = String::new();
    for c in char::decode_utf16(units).map(|r| r.unwrap_or('\u{FFFD}')) {
        let readable = c == '\r'
            || c == '\n'
            || (' '..='~').contains(&c)
            || ('\u{4E00}'..='\u{9FFF}').contains(&c)
            || ('\u{3000}'..='\u{303F}').contains(&c)
            || ('\u{FF00}'..='\u{FFEF}').contains(&c);
        if readable {
            run.push(if c == '\r' { '\n' } else { c });
        } else {
            if run.chars().count() >= 4 {
                out.push_str(&run);
                out.push('\n');
            }
            run.clear();
        }
    }
    if run.chars().count() >= 4 {
        out.push_str(&run);
    }
    out
}

fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = SPACE_RUN.replace_all(&text, " ");
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_mime() {
        assert_eq!(DocumentKind::detect(Some(MIME_PDF), "x").unwrap(), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::detect(Some(MIME_DOCX), "cv.docx").unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(
            DocumentKind::detect(Some("text/plain; charset=utf-8"), "cv").unwrap(),
            DocumentKind::Text
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            DocumentKind::detect(Some("application/octet-stream"), "简历.PDF").unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(DocumentKind::detect(None, "cv.doc").unwrap(), DocumentKind::Doc);
    }

    #[test]
    fn test_detect_rejects_images() {
        let err = DocumentKind::detect(Some("image/png"), "cv.png").unwrap_err();
        assert_eq!(err.code(), "INVALID_FILE_TYPE");
        assert!(DocumentKind::detect(None, "cv.exe").is_err());
    }

    #[test]
    fn test_validate_upload_limits() {
        assert!(validate_upload(1024, 10 * 1024 * 1024).is_ok());
        assert_eq!(validate_upload(0, 10).unwrap_err().code(), "EMPTY_FILE");
        assert_eq!(
            validate_upload(11 * 1024 * 1024, 10 * 1024 * 1024)
                .unwrap_err()
                .code(),
            "FILE_TOO_LARGE"
        );
    }

    #[test]
    fn test_plain_text_is_normalized() {
        let text = parse_document("张三\r\n\r\n\r\n\r\n熟悉  React".as_bytes(), DocumentKind::Text).unwrap();
        assert_eq!(text, "张三\n\n熟悉 React");
    }

    #[test]
    fn test_blank_text_is_unreadable() {
        let err = parse_document(b"   \n ", DocumentKind::Text).unwrap_err();
        assert_eq!(err.code(), "UNREADABLE_FILE");
    }

    #[test]
    fn test_docx_xml_to_text() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>工作经历</w:t></w:r></w:p><w:p><w:r><w:t>R&amp;D</w:t><w:tab/><w:t>Rust</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(docx_xml_to_text(xml), "工作经历\nR&D\tRust\n");
    }

    #[test]
    fn test_docx_archive_roundtrip() {
        use std::io::Write;
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("word/document.xml", zip::write::FileOptions::default())
                .unwrap();
            writer
                .write_all(b"<w:p><w:t>Senior Engineer</w:t></w:p>")
                .unwrap();
            writer.finish().unwrap();
        }
        let text = parse_document(buf.get_ref(), DocumentKind::Docx).unwrap();
        assert_eq!(text, "Senior Engineer");
    }

    #[test]
    fn test_legacy_doc_scrape_keeps_readable_runs() {
        let mut bytes = vec![0x01, 0x00, 0x02, 0x00];
        for unit in "项目经验 Rust".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let text = parse_document(&bytes, DocumentKind::Doc).unwrap();
        assert_eq!(text, "项目经验 Rust");
    }
}
