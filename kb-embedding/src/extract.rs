//! MIME-dispatch text extraction. Per spec, document extraction itself is
//! an external collaborator (PDF/Word/PPT parsing is out of scope for this
//! core); this module owns the dispatch table and the two extractors that
//! are pure functions of the input bytes (plain text passthrough, a bare
//! HTML-to-text reduction), and defers everything else to an injected
//! [`DocumentExtractor`].

use kb_core::{KbError, KbResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum ExtractedText {
    Plain(String),
    /// Excel-like sheet data: sheet name -> rows of cell strings.
    Sheets(BTreeMap<String, Vec<Vec<String>>>),
}

impl ExtractedText {
    pub fn as_plain(&self) -> String {
        match self {
            ExtractedText::Plain(s) => s.clone(),
            ExtractedText::Sheets(sheets) => {
                serde_json::to_string(sheets).unwrap_or_default()
            }
        }
    }
}

/// Injected extractor for MIME types this core does not parse natively
/// (PDF, Word, PowerPoint, Excel). Mirrors the `EmbeddingProvider` /
/// `LlmProvider` out-of-scope-collaborator pattern.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mime: &str) -> KbResult<ExtractedText>;
}

/// An extractor that refuses every MIME type; used when no document
/// extractor has been configured and only native formats are expected.
pub struct NoopExtractor;

impl DocumentExtractor for NoopExtractor {
    fn extract(&self, _bytes: &[u8], mime: &str) -> KbResult<ExtractedText> {
        Err(KbError::validation(format!("no extractor configured for mime type {mime}")))
    }
}

pub fn extract_text(
    bytes: &[u8],
    mime: &str,
    external: &dyn DocumentExtractor,
) -> KbResult<ExtractedText> {
    match mime {
        m if m.starts_with("text/html") => Ok(ExtractedText::Plain(html_to_text(bytes))),
        m if m.starts_with("text/") => Ok(ExtractedText::Plain(decode_utf8_lossy(bytes))),
        "application/pdf"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "application/vnd.ms-powerpoint"
        | "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            external.extract(bytes, mime)
        }
        other => Err(KbError::validation(format!("unsupported mime type: {other}"))),
    }
}

fn decode_utf8_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Strips tags and collapses whitespace. Not a full HTML parser: good
/// enough for the markdown-ish plain text the pipeline chunks.
fn html_to_text(bytes: &[u8]) -> String {
    let html = decode_utf8_lossy(bytes);
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag => {}
            '\n' | '\r' => out.push('\n'),
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let result = extract_text(b"hello world", "text/plain", &NoopExtractor).unwrap();
        assert_eq!(result.as_plain(), "hello world");
    }

    #[test]
    fn html_tags_are_stripped() {
        let result =
            extract_text(b"<p>Hello <b>world</b></p>", "text/html", &NoopExtractor).unwrap();
        assert_eq!(result.as_plain(), "Hello world");
    }

    #[test]
    fn unsupported_mime_is_an_error() {
        let err = extract_text(b"\x00\x01", "application/octet-stream", &NoopExtractor);
        assert!(err.is_err());
    }

    #[test]
    fn office_formats_delegate_to_external_extractor() {
        let err = extract_text(b"", "application/pdf", &NoopExtractor);
        assert!(err.is_err());
    }
}
