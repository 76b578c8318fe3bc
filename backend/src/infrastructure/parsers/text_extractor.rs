/// Text extractor - normalizes raw document bytes into plain UTF-8 text
use super::{docx, pdf};
use crate::domain::value_objects::ContentType;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Unsupported document type: {0}")]
    UnsupportedFormat(String),

    #[error("No text content extracted from {0}")]
    EmptyContent(String),

    #[error("Failed to extract text from {file_name}: {reason}")]
    ExtractionFailed { file_name: String, reason: String },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Plain text pulled out of a document, plus page bookkeeping for paginated formats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: Option<usize>,
    pub skipped_pages: usize,
}

impl ExtractedText {
    fn unpaginated(text: String) -> Self {
        ExtractedText {
            text,
            page_count: None,
            skipped_pages: 0,
        }
    }

    /// Character length of the extracted text
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Dispatches on the declared content type. CPU-bound; async callers should run
/// it on a blocking thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        TextExtractor
    }

    /// Extract text from `bytes`. `file_name` is only used in diagnostics.
    pub fn extract(
        &self,
        bytes: &[u8],
        content_type: &str,
        file_name: &str,
    ) -> ExtractionResult<ExtractedText> {
        let kind = ContentType::from_mime(content_type)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(content_type.to_string()))?;

        info!("Extracting text from {} ({})", file_name, kind);

        let failed = |reason: String| ExtractionError::ExtractionFailed {
            file_name: file_name.to_string(),
            reason,
        };

        let extracted = match kind {
            ContentType::PlainText => ExtractedText::unpaginated(decode_plain_text(bytes)),
            ContentType::Docx | ContentType::MsWord => {
                ExtractedText::unpaginated(docx::extract_docx_text(bytes).map_err(failed)?)
            }
            ContentType::Pdf => pdf::extract_pdf_text(bytes).map_err(failed)?,
        };

        if extracted.text.trim().is_empty() {
            return Err(ExtractionError::EmptyContent(file_name.to_string()));
        }

        if extracted.skipped_pages > 0 {
            warn!(
                "Skipped {} unreadable page(s) in {}",
                extracted.skipped_pages, file_name
            );
        }
        info!(
            "Extracted {} characters from {}",
            extracted.char_count(),
            file_name
        );
        Ok(extracted)
    }
}

fn decode_plain_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
