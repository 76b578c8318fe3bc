/// Page-by-page PDF text extraction
use super::text_extractor::ExtractedText;
use lopdf::Document;
use tracing::{debug, warn};

/// Extract text from every readable page, in page order.
///
/// A page whose text cannot be decoded is skipped and counted. The document
/// only fails when it cannot be parsed at all or no page could be read.
pub(super) fn extract_pdf_text(bytes: &[u8]) -> Result<ExtractedText, String> {
    let document = Document::load_mem(bytes).map_err(|e| format!("invalid PDF: {}", e))?;
    let pages = document.get_pages();
    debug!("PDF loaded with {} pages", pages.len());

    // Each page's text is produced and folded in before the next page is read
    let page_texts = pages.keys().map(|&number| {
        document
            .extract_text(&[number])
            .map_err(|e| e.to_string())
    });

    collect_pages(page_texts)
}

/// Fold per-page extraction results into a single text.
fn collect_pages<I>(page_texts: I) -> Result<ExtractedText, String>
where
    I: IntoIterator<Item = Result<String, String>>,
{
    let mut text = String::new();
    let mut page_count = 0;
    let mut skipped_pages = 0;

    for (index, page) in page_texts.into_iter().enumerate() {
        page_count += 1;
        match page {
            Ok(page_text) => {
                let normalized = normalize_page(&page_text);
                if normalized.is_empty() {
                    continue;
                }
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(&normalized);
            }
            Err(e) => {
                warn!("Skipping unreadable PDF page {}: {}", index + 1, e);
                skipped_pages += 1;
            }
        }
    }

    if page_count == 0 {
        return Err("PDF has no pages".to_string());
    }
    if skipped_pages == page_count {
        return Err(format!("none of the {} page(s) could be read", page_count));
    }

    Ok(ExtractedText {
        text,
        page_count: Some(page_count),
        skipped_pages,
    })
}

/// Collapse the whitespace runs lopdf leaves between text operators
fn normalize_page(page_text: &str) -> String {
    page_text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
