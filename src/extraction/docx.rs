use std::io::{Cursor, Read};
use std::mem;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Joins the non-empty paragraphs of the main document part with newlines.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ExtractionError::Docx(format!("open archive: {err}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| ExtractionError::Docx(format!("missing {DOCUMENT_PART}: {err}")))?
        .read_to_string(&mut xml)
        .map_err(|err| ExtractionError::Docx(format!("read {DOCUMENT_PART}: {err}")))?;

    let text = paragraphs(&xml)?
        .into_iter()
        .filter(|paragraph| !paragraph.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyDocument);
    }

    Ok(text)
}

fn paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| ExtractionError::Docx(format!("malformed {DOCUMENT_PART}: {err}")))?;

        match event {
            Event::Start(element) => match element.name().as_ref() {
                b"w:t" => in_text_run = true,
                b"w:p" => current.clear(),
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text_run => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| ExtractionError::Docx(format!("bad text run: {err}")))?;
                current.push_str(&unescaped);
            }
            Event::End(element) => match element.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => paragraphs.push(mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::docx_with_paragraphs;

    #[test]
    fn joins_non_empty_paragraphs_with_newlines() {
        let docx = docx_with_paragraphs(&["First paragraph", "", "   ", "Second &amp; last"]);
        let text = extract_text(&docx).unwrap();
        assert_eq!(text, "First paragraph\nSecond & last");
    }

    #[test]
    fn document_without_text_is_empty() {
        let docx = docx_with_paragraphs(&["", " "]);
        let err = extract_text(&docx).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument));
    }

    #[test]
    fn non_zip_payload_is_a_docx_error() {
        let err = extract_text(b"plain text pretending to be word").unwrap_err();
        assert!(matches!(err, ExtractionError::Docx(_)));
    }

    #[test]
    fn tabs_and_breaks_are_preserved_inside_paragraphs() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p></w:body></w:document>"#;
        let paragraphs = paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["a\tb\nc".to_string()]);
    }
}
