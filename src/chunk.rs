//! Overlapping character-window chunker.
//!
//! Splits article body text into [`Chunk`]s of at most `chunk_size`
//! characters. Consecutive windows share exactly `chunk_overlap` characters.
//! A window is shortened to end on a sentence boundary when a period falls in
//! its last [`SENTENCE_LOOKBACK`] characters and past its midpoint.
//!
//! The `sections` strategy first cuts the text at MediaWiki headings
//! (`== Heading ==`) and windows only the sections that are too long.
//!
//! Offsets are counted in `char`s, never bytes, so multi-byte text is never
//! split inside a code point. Each chunk gets a deterministic UUID derived
//! from its file and index plus a SHA-256 hash of its text.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Article, Chunk};

/// How far back from a window's end to look for a sentence end.
pub const SENTENCE_LOOKBACK: usize = 100;

/// Half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"={2,3}\s*[^=]+?\s*={2,3}").expect("heading pattern is valid"))
}

/// Fixed-size overlapping windows over `text`.
pub fn window_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    windows_in(&chars, 0, chars.len(), chunk_size, overlap)
}

fn windows_in(
    chars: &[char],
    from: usize,
    to: usize,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Span> {
    if to <= from || chunk_size == 0 {
        return Vec::new();
    }
    if to - from <= chunk_size {
        return vec![Span {
            start: from,
            end: to,
        }];
    }

    let overlap = overlap.min(chunk_size - 1);
    let mut spans = Vec::new();
    let mut start = from;

    loop {
        let mut end = (start + chunk_size).min(to);

        if end < to {
            let search_start = (start + chunk_size)
                .saturating_sub(SENTENCE_LOOKBACK)
                .max(start);
            if let Some(pos) = chars[search_start..end].iter().rposition(|&c| c == '.') {
                let period = search_start + pos;
                // Only snap when the window stays reasonably full and the
                // next window still moves forward.
                if period > start + chunk_size / 2 && period + 1 > start + overlap {
                    end = period + 1;
                }
            }
        }

        spans.push(Span { start, end });

        if end >= to {
            break;
        }
        start = end - overlap;
    }

    spans
}

/// Heading-aligned sections of `text`, windowed when longer than `chunk_size`.
/// Sections shorter than `min_chunk_size` are dropped.
pub fn section_spans(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    min_chunk_size: usize,
) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let to_char = |byte: usize| byte_offsets.partition_point(|&b| b < byte);

    let mut boundaries = vec![0];
    for m in heading_regex().find_iter(text) {
        let at = to_char(m.start());
        if at > 0 {
            boundaries.push(at);
        }
    }
    boundaries.push(chars.len());
    boundaries.dedup();

    let mut spans = Vec::new();
    for pair in boundaries.windows(2) {
        let (mut start, mut end) = (pair[0], pair[1]);
        while start < end && chars[start].is_whitespace() {
            start += 1;
        }
        while end > start && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        if end - start < min_chunk_size.max(1) {
            continue;
        }
        spans.extend(windows_in(&chars, start, end, chunk_size, overlap));
    }

    spans
}

/// Split an article into chunks using the configured strategy.
/// Returns chunks with contiguous indices starting at 0; empty bodies yield none.
pub fn chunk_article(article: &Article, config: &ChunkingConfig) -> Vec<Chunk> {
    let text = article.body.as_str();
    let spans = match config.strategy.as_str() {
        "sections" => section_spans(
            text,
            config.chunk_size,
            config.chunk_overlap,
            config.min_chunk_size,
        ),
        _ => window_spans(text, config.chunk_size, config.chunk_overlap),
    };

    let byte_offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    spans
        .iter()
        .enumerate()
        .map(|(index, span)| {
            let slice = &text[byte_offsets[span.start]..byte_offsets[span.end]];
            make_chunk(article, index, *span, slice)
        })
        .collect()
}

fn make_chunk(article: &Article, index: usize, span: Span, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let key = format!("travelrag:{}#{}", article.source_file, index);

    Chunk {
        id: Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string(),
        title: article.title.clone(),
        site: article.site.clone(),
        source_url: article.source_url.clone(),
        source_file: article.source_file.clone(),
        chunk_index: index,
        start: span.start,
        end: span.end,
        text: text.to_string(),
        hash,
    }
}
