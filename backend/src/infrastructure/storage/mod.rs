/// Blob stores holding the raw uploaded bytes
mod fs_blob_store;
mod memory_blob_store;

pub use fs_blob_store::FsBlobStore;
pub use memory_blob_store::InMemoryBlobStore;
