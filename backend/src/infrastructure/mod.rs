pub mod embeddings;
pub mod parsers;
pub mod persistence;
pub mod storage;
