/// Raw-text extraction from Office Open XML word-processing documents
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use std::sync::OnceLock;
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK";
const BODY_PART: &str = "word/document.xml";

struct DocxMarkup {
    hidden_runs: Regex,
    paragraph_end: Regex,
    line_break: Regex,
    tab: Regex,
    tag: Regex,
    entity: Regex,
    blank_lines: Regex,
}

impl DocxMarkup {
    fn instance() -> &'static DocxMarkup {
        static INSTANCE: OnceLock<DocxMarkup> = OnceLock::new();
        INSTANCE.get_or_init(|| DocxMarkup {
            // Field codes and tracked deletions are not visible text
            hidden_runs: Regex::new(r"(?s)<w:(instrText|delText)\b[^>]*>.*?</w:(instrText|delText)>")
                .unwrap(),
            paragraph_end: Regex::new(r"</w:p>").unwrap(),
            line_break: Regex::new(r"<w:(br|cr)\b[^>]*/>").unwrap(),
            tab: Regex::new(r"<w:tab\b[^>]*/>").unwrap(),
            tag: Regex::new(r"<[^>]+>").unwrap(),
            entity: Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|quot|apos|amp);").unwrap(),
            blank_lines: Regex::new(r"\n{3,}").unwrap(),
        })
    }
}

/// Extract the body text of a .docx archive.
///
/// Legacy binary `.doc` files are rejected; only zip-packaged documents are readable.
pub(super) fn extract_docx_text(bytes: &[u8]) -> Result<String, String> {
    if !bytes.starts_with(ZIP_MAGIC) {
        return Err("not an Office Open XML document (legacy binary .doc is not supported)".to_string());
    }

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("unreadable archive: {}", e))?;

    let mut xml = String::new();
    archive
        .by_name(BODY_PART)
        .map_err(|e| format!("missing {}: {}", BODY_PART, e))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable {}: {}", BODY_PART, e))?;

    Ok(xml_to_text(&xml))
}

fn xml_to_text(xml: &str) -> String {
    let markup = DocxMarkup::instance();

    let text = markup.hidden_runs.replace_all(xml, "");
    let text = markup.paragraph_end.replace_all(&text, "\n");
    let text = markup.line_break.replace_all(&text, "\n");
    let text = markup.tab.replace_all(&text, "\t");
    let text = markup.tag.replace_all(&text, "");
    let text = markup.entity.replace_all(&text, |caps: &Captures| decode_entity(&caps[1]));

    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let joined = lines.join("\n");
    markup
        .blank_lines
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

fn decode_entity(name: &str) -> String {
    match name {
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        "amp" => "&".to_string(),
        numeric => {
            let code = match numeric.strip_prefix("#x") {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => numeric.trim_start_matches('#').parse().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        }
    }
}
