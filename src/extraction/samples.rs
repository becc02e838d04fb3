//! Minimal well-formed PDF and DOCX documents built from plain text.

use std::io::{Cursor, Write};

use lopdf::dictionary;
use lopdf::{Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExtractionError;

/// Single-page PDF with one line of Helvetica text per entry in `lines`.
pub fn pdf_document(lines: &[&str]) -> Result<Vec<u8>, ExtractionError> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut content = String::from("BT /F1 12 Tf 72 720 Td ");
    for line in lines {
        content.push_str(&format!("({line}) Tj 0 -16 Td "));
    }
    content.push_str("ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });

    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    });

    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Parent", pages_id);
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|err| ExtractionError::Pdf(err.to_string()))?;
    Ok(buf)
}

/// DOCX container holding only `word/document.xml`, one `w:p` per entry.
pub fn docx_document(paragraphs: &[&str]) -> Result<Vec<u8>, ExtractionError> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{p}</w:t></w:r></w:p>"#))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let docx_error = |err: &dyn std::fmt::Display| ExtractionError::Docx(err.to_string());

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer
            .start_file("word/document.xml", options)
            .map_err(|err| docx_error(&err))?;
        writer
            .write_all(xml.as_bytes())
            .map_err(|err| docx_error(&err))?;
        writer.finish().map_err(|err| docx_error(&err))?;
    }
    Ok(cursor.into_inner())
}
