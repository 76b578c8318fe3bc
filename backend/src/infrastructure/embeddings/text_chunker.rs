/// Boundary-aware text chunking for embedding generation
use crate::domain::base::{DomainError, DomainResult};
use crate::domain::entities::{Chunk, ChunkMetadata};
use crate::domain::value_objects::DocumentId;
use tracing::debug;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '?', '!'];

/// Window configuration for the chunker (sizes are in characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Overlap must stay below half a window, otherwise a boundary cut in the
    /// trailing half could fail to move the next window forward.
    pub fn validate(&self) -> DomainResult<()> {
        if self.chunk_size < 2 {
            return Err(DomainError::InvalidValue(format!(
                "chunk_size must be at least 2, got {}",
                self.chunk_size
            )));
        }
        if self.overlap * 2 >= self.chunk_size {
            return Err(DomainError::InvalidValue(format!(
                "overlap ({}) must be less than half of chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits extracted text into bounded, overlapping chunks that prefer to end on
/// sentence boundaries, then on whitespace.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(TextChunker { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk `text`, attaching `metadata` and the parent document id to every chunk.
    ///
    /// Whitespace-only fragments are dropped without consuming an index, so
    /// indices are always contiguous from 0.
    pub fn chunk_text(
        &self,
        text: &str,
        document_id: &DocumentId,
        metadata: &ChunkMetadata,
    ) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut start = 0;

        while start < len {
            let edge = start + self.config.chunk_size;
            let end = if edge >= len {
                len
            } else {
                self.find_cut(&chars, start, edge)
            };

            let fragment: String = chars[start..end].iter().collect();
            let trimmed = fragment.trim();
            if !trimmed.is_empty() {
                let mut chunk_metadata = metadata.clone();
                chunk_metadata.insert(
                    "chunkSize".to_string(),
                    serde_json::Value::from(trimmed.chars().count() as u64),
                );
                chunks.push(Chunk::new(
                    chunks.len(),
                    trimmed.to_string(),
                    start,
                    end,
                    document_id.clone(),
                    chunk_metadata,
                ));
            }

            if end >= len {
                break;
            }
            start = end.saturating_sub(self.config.overlap).max(start + 1);
        }

        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.set_total_chunks(total);
        }

        debug!("Created {} chunks from {} characters", total, len);
        chunks
    }

    /// Choose where a window that does not reach the end of the text is cut.
    ///
    /// Looks backward through the trailing half of the window for a sentence
    /// terminator, then whitespace. A window that is one unbroken run gets a
    /// bounded look-ahead of half a window before falling back to a hard cut.
    fn find_cut(&self, chars: &[char], start: usize, edge: usize) -> usize {
        let floor = start + self.config.chunk_size / 2;

        if let Some(pos) = (floor + 1..edge).rev().find(|&i| is_terminator(chars[i])) {
            return pos + 1;
        }
        if let Some(pos) = (floor + 1..edge).rev().find(|&i| chars[i].is_whitespace()) {
            return pos;
        }

        let horizon = (edge + self.config.chunk_size / 2).min(chars.len());
        if let Some(pos) = (edge..horizon).find(|&i| is_terminator(chars[i])) {
            return pos + 1;
        }
        if let Some(pos) = (edge..horizon).find(|&i| chars[i].is_whitespace()) {
            return pos.max(start + 1);
        }

        edge
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        TextChunker {
            config: ChunkerConfig::default(),
        }
    }
}

fn is_terminator(c: char) -> bool {
    SENTENCE_TERMINATORS.contains(&c)
}
