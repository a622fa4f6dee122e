//! Recursive character splitter.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! preferring coarse separators (paragraph breaks) over fine ones (commas).
//!
//! # Algorithm
//!
//! 1. Pick the first separator in the preference list that occurs in the
//!    text. Separators after it are kept for recursion.
//! 2. Split on it, attaching each separator to the start of the piece that
//!    follows it, so no text is lost.
//! 3. Pieces shorter than `chunk_size` are packed greedily into chunks,
//!    carrying up to `chunk_overlap` characters of trailing pieces into the
//!    next chunk.
//! 4. A piece of `chunk_size` characters or more is split again with the
//!    finer separators. When none remain it is emitted whole, so a run with
//!    no separator at all can exceed `chunk_size`.
//! 5. Chunks are whitespace-trimmed and empty chunks are dropped.
//!
//! Lengths are counted in `char`s, not bytes.
//!
//! # Example
//!
//! ```rust
//! use fingenius_core::split::RecursiveSplitter;
//!
//! let splitter = RecursiveSplitter::new(vec!["\n\n".into()], 10, 0).unwrap();
//! let parts = splitter.split_text("aaaa\n\nbbbb\n\ncccc");
//! assert_eq!(parts, vec!["aaaa\n\nbbbb", "cccc"]);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};

use crate::error::SplitError;
use crate::models::{Chunk, Document};

/// Paragraph, line, sentence, clause.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", ","];
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecursiveSplitter {
    separators: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl RecursiveSplitter {
    /// Build a splitter. An empty-string separator splits between characters.
    pub fn new(
        separators: Vec<String>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(SplitError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            });
        }
        if separators.is_empty() {
            return Err(SplitError::NoSeparators);
        }
        Ok(Self {
            separators,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into trimmed, non-empty pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split a document into chunks that point back at its source.
    ///
    /// Indices are contiguous from 0. Blank documents yield no chunks.
    pub fn split_document(&self, doc: &Document) -> Vec<Chunk> {
        self.split_text(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| make_chunk(&doc.source, i as u32, text))
            .collect()
    }

    /// Split every document, preserving document order.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        docs.iter().flat_map(|d| self.split_document(d)).collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge_pieces(&short));
                short.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !short.is_empty() {
            chunks.extend(self.merge_pieces(&short));
        }

        chunks
    }

    /// Pack consecutive short pieces into chunks of at most `chunk_size`.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);
                // Keep at most `chunk_overlap` chars, and make room for `piece`.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        push_joined(&mut chunks, &window);
        chunks
    }
}

/// First separator present in `text`, plus the finer ones after it.
///
/// Falls back to the last separator (with nothing finer) when none occur.
fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep.as_str(), &[]);
        }
        if text.contains(sep.as_str()) {
            return (sep.as_str(), &separators[i + 1..]);
        }
    }
    let last = separators.len() - 1;
    (separators[last].as_str(), &[])
}

/// Split `text` on `separator`, attaching each separator to the next piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(source: &str, index: u32, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        source: source.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}
