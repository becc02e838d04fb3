use std::panic;

use tracing::{debug, warn};

use super::ExtractionError;

/// Extracts text page by page, preferring the layout-aware extractor and
/// falling back to the raw content-stream text when the first pass is blank.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let primary = match extract_layout_text(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "layout pdf extraction failed; trying page text");
            String::new()
        }
    };

    if !primary.trim().is_empty() {
        return Ok(primary);
    }

    debug!("layout pdf extraction produced no text; falling back to page text");
    let fallback = extract_page_text(bytes)?;
    if fallback.trim().is_empty() {
        return Err(ExtractionError::EmptyDocument);
    }

    Ok(fallback)
}

fn extract_layout_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    // pdf-extract panics on some malformed inputs.
    let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractionError::Pdf("layout extractor panicked".into()))?
        .map_err(|err| ExtractionError::Pdf(err.to_string()))?;

    Ok(pages.join("\n"))
}

fn extract_page_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|err| ExtractionError::Pdf(format!("load pdf: {err}")))?;

    let mut combined = String::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => {
                combined.push_str(&text);
                combined.push('\n');
            }
            Err(err) => {
                debug!(page = page_number, error = %err, "skipping unreadable pdf page");
            }
        }
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::pdf_with_lines;

    #[test]
    fn extracts_text_from_digital_pdf() {
        let pdf = pdf_with_lines(&["Hello world from the review pipeline"]);
        let text = extract_text(&pdf).unwrap();
        assert!(
            text.contains("Hello") && text.contains("pipeline"),
            "unexpected text: {text}"
        );
    }

    #[test]
    fn page_text_fallback_reads_the_same_document() {
        let pdf = pdf_with_lines(&["Fallback extraction check"]);
        let text = extract_page_text(&pdf).unwrap();
        assert!(text.contains("Fallback"), "unexpected text: {text}");
    }

    #[test]
    fn blank_pdf_is_empty_document() {
        let pdf = pdf_with_lines(&[]);
        let err = extract_text(&pdf).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument));
    }

    #[test]
    fn garbage_bytes_fail_as_pdf_error() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf(_)));
    }
}
