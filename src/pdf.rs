//! PDF loading and positional text extraction using lopdf.
//!
//! Statement PDFs are frequently exported with text operators in arbitrary
//! order, so page text is rebuilt from positioned fragments: top-to-bottom,
//! then left-to-right, with fragments merged into one line when their
//! vertical positions are within [`LINE_MERGE_DELTA`] units.

use crate::error::{ExtractionError, Result};
use log::debug;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

/// Fragments closer than this vertically belong to the same visual line.
const LINE_MERGE_DELTA: f32 = 5.0;

/// Extracted text of a single page, in reading order.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-indexed page number.
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
struct TextFragment {
    x: f32,
    y: f32,
    text: String,
}

/// Load a PDF from bytes. Encrypted documents are decrypted with the
/// supplied password (or the empty password many exporters use); if that
/// fails the document needs user input and the error says so.
pub fn load_document(bytes: &[u8], password: Option<&str>) -> Result<Document> {
    let mut doc = Document::load_mem(bytes)
        .map_err(|e| ExtractionError::DocumentError(format!("PDF parse failed: {}", e)))?;

    if doc.is_encrypted() {
        if doc.decrypt(password.unwrap_or("")).is_err() {
            return Err(ExtractionError::PasswordProtected);
        }
        debug!("Decrypted PDF");
    }

    if doc.get_pages().is_empty() {
        return Err(ExtractionError::DocumentError("PDF has no pages".to_string()));
    }

    Ok(doc)
}

/// Extract per-page text, preserving reading order.
pub fn extract_page_texts(doc: &Document) -> Vec<PageText> {
    let mut pages = Vec::new();
    for (number, page_id) in doc.get_pages() {
        let fragments = page_fragments(doc, page_id);
        pages.push(PageText {
            number,
            text: assemble_reading_order(fragments),
        });
    }
    debug!("Extracted text from {} pages", pages.len());
    pages
}

/// Walk a page's content stream tracking the text position, collecting one
/// fragment per text-showing operator. A page that fails to decode yields
/// no fragments rather than failing the document.
fn page_fragments(doc: &Document, page_id: ObjectId) -> Vec<TextFragment> {
    let data = match doc.get_page_content(page_id) {
        Ok(data) => data,
        Err(_) => return Vec::new(),
    };
    let content = match Content::decode(&data) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    let mut fragments = Vec::new();
    let mut x = 0.0_f32;
    let mut y = 0.0_f32;
    let mut leading = 0.0_f32;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                x = 0.0;
                y = 0.0;
            }
            "Tm" => {
                if op.operands.len() == 6 {
                    x = number(&op.operands[4]).unwrap_or(x);
                    y = number(&op.operands[5]).unwrap_or(y);
                }
            }
            "Td" => {
                if op.operands.len() == 2 {
                    x += number(&op.operands[0]).unwrap_or(0.0);
                    y += number(&op.operands[1]).unwrap_or(0.0);
                }
            }
            "TD" => {
                if op.operands.len() == 2 {
                    x += number(&op.operands[0]).unwrap_or(0.0);
                    let ty = number(&op.operands[1]).unwrap_or(0.0);
                    y += ty;
                    leading = -ty;
                }
            }
            "TL" => {
                if let Some(value) = op.operands.first().and_then(number) {
                    leading = value;
                }
            }
            "T*" => {
                y -= leading;
            }
            "Tj" | "'" | "\"" => {
                let text: String = op.operands.iter().filter_map(string_of).collect();
                push_fragment(&mut fragments, x, y, text);
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let text: String = items.iter().filter_map(string_of).collect();
                    push_fragment(&mut fragments, x, y, text);
                }
            }
            _ => {}
        }
    }

    fragments
}

fn push_fragment(fragments: &mut Vec<TextFragment>, x: f32, y: f32, text: String) {
    let text = text.trim().to_string();
    if !text.is_empty() {
        fragments.push(TextFragment { x, y, text });
    }
}

/// Sort fragments top-to-bottom then left-to-right and merge near-equal
/// baselines into single lines.
fn assemble_reading_order(mut fragments: Vec<TextFragment>) -> String {
    if fragments.is_empty() {
        return String::new();
    }

    // PDF y grows upward: higher y renders higher on the page.
    fragments.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<Vec<TextFragment>> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some(line) if (line[0].y - fragment.y).abs() < LINE_MERGE_DELTA => {
                line.push(fragment);
            }
            _ => lines.push(vec![fragment]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            line.iter()
                .map(|fragment| fragment.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn string_of(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    }
}
