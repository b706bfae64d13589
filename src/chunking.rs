//! Page-boundary-aware text chunking for embedding.

use crate::pdf::PageText;

/// Default chunk budget in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 5000;

#[derive(Debug, Clone)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub first_page: u32,
    pub last_page: u32,
}

/// Combine per-page text into one document string with page markers, the
/// form the extraction prompt receives.
pub fn combine_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| format!("--- Page {} ---\n{}", page.number, page.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split pages into chunks of at most `max_chars` characters, preferring
/// page boundaries. A single page larger than the budget is split on
/// character boundaries instead of being dropped.
pub fn chunk_pages(pages: &[PageText], max_chars: usize) -> Vec<TextChunk> {
    let max_chars = max_chars.max(1);
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current = String::new();
    let mut first_page = 0_u32;
    let mut last_page = 0_u32;

    let mut flush = |current: &mut String, first: u32, last: u32, chunks: &mut Vec<TextChunk>| {
        if !current.trim().is_empty() {
            chunks.push(TextChunk {
                index: chunks.len(),
                text: std::mem::take(current),
                first_page: first,
                last_page: last,
            });
        } else {
            current.clear();
        }
    };

    for page in pages {
        let page_len = page.text.chars().count();

        if page_len > max_chars {
            // Oversized page: flush what we have, then split the page itself.
            flush(&mut current, first_page, last_page, &mut chunks);
            let chars: Vec<char> = page.text.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(TextChunk {
                    index: chunks.len(),
                    text: piece.iter().collect(),
                    first_page: page.number,
                    last_page: page.number,
                });
            }
            continue;
        }

        if !current.is_empty() && current.chars().count() + page_len + 1 > max_chars {
            flush(&mut current, first_page, last_page, &mut chunks);
        }

        if current.is_empty() {
            first_page = page.number;
        } else {
            current.push('\n');
        }
        current.push_str(&page.text);
        last_page = page.number;
    }

    flush(&mut current, first_page, last_page, &mut chunks);
    chunks
}
