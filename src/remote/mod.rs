//! Remote object store abstraction (external interface, spec.md §6) and the
//! in-memory chunk index built from it (C4).

pub mod chunk_index;
pub mod store;

pub use chunk_index::RemoteChunkSet;
pub use store::{FsObjectStore, ObjectStore};
