//! Plain-text extraction from uploaded project documents.
//!
//! Extraction is a pure function over the document bytes; callers own the
//! buffer and may reuse it afterwards.

pub mod docx;
pub mod pdf;
pub mod samples;

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error("PDF parsing failed: {0}")]
    Pdf(String),

    #[error("DOCX parsing failed: {0}")]
    Docx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub const ALLOWED_EXTENSIONS: &'static [&'static str] = &["pdf", "doc", "docx"];

    /// Word documents share the DOCX path regardless of the `.doc` or `.docx` suffix.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "doc" | "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    /// Canonical file suffix, used when naming stored objects.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

pub fn extract(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractionError> {
    match format {
        DocumentFormat::Pdf => pdf::extract_text(bytes),
        DocumentFormat::Docx => docx::extract_text(bytes),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_format_from_filename() {
        assert_eq!(
            DocumentFormat::from_filename("Proposal.PDF"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_filename("plan.final.docx"),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(
            DocumentFormat::from_filename("legacy.doc"),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::from_filename("project.exe"), None);
        assert_eq!(DocumentFormat::from_filename("no-extension"), None);
        assert_eq!(DocumentFormat::Docx.extension(), "docx");
    }

    #[test]
    fn dispatches_by_format() {
        let pdf = fixtures::pdf_with_lines(&["Quarterly innovation roadmap"]);
        let text = extract(&pdf, DocumentFormat::Pdf).unwrap();
        assert!(text.contains("innovation"));

        let docx = fixtures::docx_with_paragraphs(&["Solar irrigation pilot"]);
        let text = extract(&docx, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "Solar irrigation pilot");
    }
}
