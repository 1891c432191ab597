
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::corpus::Document;
use crate::{RagError, Result};

/// Fixed namespace for deriving chunk ids, so re-ingestion reproduces them.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x2c, 0x1d, 0x5a, 0x9b, 0x41, 0x4e, 0x8f, 0xb3, 0x07, 0xc4, 0xd8, 0x2a, 0x65, 0x90,
    0x1e,
]);

/// A contiguous span of a document's text, the unit of embedding and
/// retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: String,
    /// Position of this chunk within its document.
    pub sequence_index: u32,
    pub text: String,
    /// Character offset into the document's `raw_text` where this chunk
    /// starts.
    pub char_start: usize,
    /// Character offset one past the last character of this chunk.
    pub char_end: usize,
}

/// Configuration for splitting documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Span of each chunk, in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks. Must be smaller than
    /// `chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Splits document text into overlapping fixed-size character spans.
///
/// Successive chunks start `chunk_size - overlap` characters after the
/// previous chunk's start. The last chunk may be shorter than `chunk_size`;
/// a document shorter than `chunk_size` yields exactly one chunk, and empty
/// text yields none.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk size must be positive".to_string(),
            ));
        }
        if config.overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                config.overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// Split a document into chunks.
    ///
    /// Offsets are character offsets, so a span never splits a UTF-8 scalar.
    /// Chunk ids are a pure function of `(document_id, sequence_index)`;
    /// re-chunking the same document reproduces the same ids.
    #[inline]
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.raw_text;
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of each character, so spans can be cut without scanning
        // from the start of the text for every chunk.
        let byte_offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        let total_chars = byte_offsets.len();
        let byte_at = |char_index: usize| {
            if char_index >= total_chars {
                text.len()
            } else {
                byte_offsets[char_index]
            }
        };

        let step = self.config.chunk_size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(total_chars);
            let sequence_index = chunks.len() as u32;
            chunks.push(Chunk {
                id: chunk_id(&document.id, sequence_index),
                document_id: document.id.clone(),
                sequence_index,
                text: text[byte_at(start)..byte_at(end)].to_string(),
                char_start: start,
                char_end: end,
            });

            if end == total_chars {
                break;
            }
            start += step;
        }

        debug!(
            "Chunked document '{}' ({} chars) into {} chunks",
            document.id,
            total_chars,
            chunks.len()
        );

        chunks
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }
}

/// Deterministic chunk id for `(document_id, sequence_index)`.
#[inline]
pub fn chunk_id(document_id: &str, sequence_index: u32) -> Uuid {
    let name = format!("{}/{}", document_id, sequence_index);
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, name.as_bytes())
}
