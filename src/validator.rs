use tracing::{error, warn};

use crate::error::{AppError, AppResult};
use crate::extraction::{self, DocumentFormat, ExtractionError};
use crate::scanner;

pub const FILE_FIELD: &str = "file";

/// Outcome of an accepted document; the text itself is not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedDocument {
    pub format: DocumentFormat,
    pub characters: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentValidator {
    max_characters: usize,
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new(scanner::DEFAULT_MAX_CHARACTERS)
    }
}

impl DocumentValidator {
    pub fn new(max_characters: usize) -> Self {
        Self { max_characters }
    }

    /// Accepts or rejects an uploaded document. CPU bound; async callers run
    /// it on the blocking pool.
    ///
    /// The character limit is checked before the sensitive data scan.
    pub fn validate(&self, bytes: &[u8], filename: &str) -> AppResult<ValidatedDocument> {
        let format = DocumentFormat::from_filename(filename).ok_or_else(|| {
            AppError::validation(
                FILE_FIELD,
                format!(
                    "unsupported file format; allowed extensions: {}",
                    DocumentFormat::ALLOWED_EXTENSIONS.join(", ")
                ),
            )
        })?;

        let text = extract_text(bytes, format)?;
        let characters = text.chars().count();

        if !scanner::within_limit(&text, self.max_characters) {
            return Err(AppError::validation(
                FILE_FIELD,
                format!(
                    "document exceeds character limit of {} characters",
                    self.max_characters
                ),
            ));
        }

        let findings = scanner::scan(&text);
        if !findings.is_empty() {
            let categories: Vec<&str> = findings.keys().map(|category| category.label()).collect();
            warn!(
                filename,
                categories = ?categories,
                "rejected document containing sensitive data"
            );
            return Err(AppError::validation(
                FILE_FIELD,
                format!("document contains sensitive data: {}", categories.join(", ")),
            ));
        }

        Ok(ValidatedDocument { format, characters })
    }
}

/// Extracts text and requires it to be non-blank. An empty document is the
/// uploader's problem; any other extraction failure is ours.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> AppResult<String> {
    match extraction::extract(bytes, format) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) | Err(ExtractionError::EmptyDocument) => Err(AppError::validation(
            FILE_FIELD,
            "document contains no extractable text",
        )),
        Err(err) => {
            error!(%format, error = %err, "document text extraction failed");
            Err(AppError::internal(format!("failed to process {format} document")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::extraction::fixtures::{docx_with_paragraphs, pdf_with_lines};

    fn field_errors(err: AppError) -> Vec<FieldError> {
        match err {
            AppError::Validation(fields) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_disallowed_extension_before_extraction() {
        let validator = DocumentValidator::default();
        // Bytes are a valid PDF; the extension alone decides.
        let pdf = pdf_with_lines(&["Perfectly fine content for a project"]);
        let fields = field_errors(validator.validate(&pdf, "project.exe").unwrap_err());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, FILE_FIELD);
        assert!(fields[0].message.contains("unsupported file format"));
    }

    #[test]
    fn empty_document_is_rejected_the_same_way_every_time() {
        let validator = DocumentValidator::default();
        let pdf = pdf_with_lines(&[]);

        let first = field_errors(validator.validate(&pdf, "blank.pdf").unwrap_err());
        let second = field_errors(validator.validate(&pdf, "blank.pdf").unwrap_err());
        assert_eq!(first, second);
        assert_eq!(first[0].message, "document contains no extractable text");

        let docx = docx_with_paragraphs(&["   "]);
        let fields = field_errors(validator.validate(&docx, "blank.docx").unwrap_err());
        assert_eq!(fields[0].message, "document contains no extractable text");
    }

    #[test]
    fn accepts_harmless_pdf() {
        let validator = DocumentValidator::default();
        let pdf = pdf_with_lines(&[
            "Hello world, this is a harmless project description with more than ten characters",
        ]);
        let validated = validator.validate(&pdf, "proposal.pdf").unwrap();
        assert_eq!(validated.format, DocumentFormat::Pdf);
        assert!(validated.characters > 10);
    }

    #[test]
    fn character_limit_is_inclusive() {
        let validator = DocumentValidator::new(25_000);

        let exact = "a".repeat(25_000);
        let docx = docx_with_paragraphs(&[exact.as_str()]);
        assert!(validator.validate(&docx, "exact.docx").is_ok());

        let over = "a".repeat(25_001);
        let docx = docx_with_paragraphs(&[over.as_str()]);
        let fields = field_errors(validator.validate(&docx, "over.docx").unwrap_err());
        assert!(fields[0].message.contains("exceeds character limit"));
    }

    #[test]
    fn sensitive_data_names_categories_not_values() {
        let validator = DocumentValidator::default();
        let docx = docx_with_paragraphs(&["Responsável: CPF 529.982.247-25"]);
        let fields = field_errors(validator.validate(&docx, "plan.doc").unwrap_err());
        assert!(fields[0].message.contains("CPF"));
        assert!(!fields[0].message.contains("529.982.247-25"));
    }

    #[test]
    fn corrupt_document_is_an_internal_error() {
        let validator = DocumentValidator::default();
        let err = validator.validate(b"not a zip archive", "broken.docx").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
