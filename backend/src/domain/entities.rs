/// Domain entities
use super::value_objects::{DocumentId, EmbeddingVector};
use serde_json::{Map, Value};

/// Free-form metadata carried from the parent document onto every chunk
pub type ChunkMetadata = Map<String, Value>;

/// A bounded slice of a document's text
///
/// Offsets are character offsets into the extracted text; `end_offset` is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    index: usize,
    text: String,
    start_offset: usize,
    end_offset: usize,
    document_id: DocumentId,
    metadata: ChunkMetadata,
    total_chunks: Option<usize>,
}

impl Chunk {
    pub fn new(
        index: usize,
        text: String,
        start_offset: usize,
        end_offset: usize,
        document_id: DocumentId,
        metadata: ChunkMetadata,
    ) -> Self {
        Chunk {
            index,
            text,
            start_offset,
            end_offset,
            document_id,
            metadata,
            total_chunks: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    /// Character count of the (trimmed) chunk text
    pub fn size(&self) -> usize {
        self.text.chars().count()
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    /// Known only once the whole chunk set has been produced
    pub fn total_chunks(&self) -> Option<usize> {
        self.total_chunks
    }

    pub fn set_total_chunks(&mut self, total: usize) {
        self.total_chunks = Some(total);
        self.metadata
            .insert("totalChunks".to_string(), Value::from(total as u64));
    }
}

/// A chunk together with its embedding and the tokens the provider consumed
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: EmbeddingVector,
    pub tokens: u32,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embedding: EmbeddingVector, tokens: u32) -> Self {
        EmbeddedChunk {
            chunk,
            embedding,
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        let mut metadata = ChunkMetadata::new();
        metadata.insert("documentName".to_string(), Value::from("brochure.pdf"));
        Chunk::new(
            0,
            "Our product ships with SSO.".to_string(),
            0,
            27,
            DocumentId::new("doc-1").unwrap(),
            metadata,
        )
    }

    #[test]
    fn test_chunk_accessors() {
        let chunk = sample_chunk();
        assert_eq!(chunk.index(), 0);
        assert_eq!(chunk.size(), 27);
        assert_eq!(chunk.document_id().as_str(), "doc-1");
        assert_eq!(chunk.metadata()["documentName"], "brochure.pdf");
        assert_eq!(chunk.total_chunks(), None);
    }

    #[test]
    fn test_set_total_chunks_updates_metadata() {
        let mut chunk = sample_chunk();
        chunk.set_total_chunks(4);
        assert_eq!(chunk.total_chunks(), Some(4));
        assert_eq!(chunk.metadata()["totalChunks"], 4);
    }

    #[test]
    fn test_size_counts_characters_not_bytes() {
        let chunk = Chunk::new(
            0,
            "café".to_string(),
            0,
            4,
            DocumentId::new("doc-1").unwrap(),
            ChunkMetadata::new(),
        );
        assert_eq!(chunk.size(), 4);
    }
}
