//! Text extraction from downloaded report files.
//!
//! Reports arrive as raw bytes from the chat platform. A file is treated as a
//! PDF when the platform labels it `application/pdf`, its name ends in `.pdf`,
//! or the bytes carry a PDF header. The intake gate uses the same label check
//! through [`declares_pdf`], so anything the gate accepts reaches the PDF
//! reader here.

use std::path::Path;

use crate::types::EventFile;

/// MIME type Slack reports for PDF uploads.
pub const PDF_MIME_TYPE: &str = "application/pdf";

const PDF_HEADER: &[u8] = b"%PDF";

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    Pdf,
    Unsupported,
}

/// Errors that can occur during text extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// File format is not supported for extraction.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Format-specific extraction failure.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}

/// Converts downloaded bytes of an attached file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], file: &EventFile) -> Result<String, ExtractError>;
}

/// PDF extractor used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8], file: &EventFile) -> Result<String, ExtractError> {
        extract_text(bytes, &file.name, &file.mime_type)
    }
}

/// Whether the upload metadata says this is a PDF.
pub fn declares_pdf(file_name: &str, mime_type: &str) -> bool {
    if mime_type.trim().eq_ignore_ascii_case(PDF_MIME_TYPE) {
        return true;
    }
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Detect the document format from upload metadata and content.
pub fn detect_format(bytes: &[u8], file_name: &str, mime_type: &str) -> SupportedFormat {
    if bytes.starts_with(PDF_HEADER) || declares_pdf(file_name, mime_type) {
        SupportedFormat::Pdf
    } else {
        SupportedFormat::Unsupported
    }
}

/// Extract the full text content from file bytes.
pub fn extract_text(bytes: &[u8], file_name: &str, mime_type: &str) -> Result<String, ExtractError> {
    match detect_format(bytes, file_name, mime_type) {
        SupportedFormat::Pdf => extract_pdf(bytes),
        SupportedFormat::Unsupported => {
            let label = if mime_type.trim().is_empty() {
                file_name.to_string()
            } else {
                mime_type.to_string()
            };
            Err(ExtractError::UnsupportedFormat(label))
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    if !bytes.starts_with(PDF_HEADER) {
        return Err(ExtractError::ExtractionFailed(
            "PDF: file does not start with a PDF header".to_string(),
        ));
    }

    // pdf-extract can panic on malformed PDFs, so isolate it
    let owned = bytes.to_vec();
    let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::ExtractionFailed(format!("PDF: {}", e))),
        Err(_) => Err(ExtractError::ExtractionFailed(
            "PDF extraction panicked (malformed file)".to_string(),
        )),
    }
}
