/// Text extraction for uploaded product documents
mod docx;
mod pdf;
mod text_extractor;

pub use text_extractor::{ExtractedText, ExtractionError, ExtractionResult, TextExtractor};
