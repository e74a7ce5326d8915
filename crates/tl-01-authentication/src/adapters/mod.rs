//! Adapters for sequence persistence.

pub mod file;
pub mod memory;

pub use file::FileSequencePersistence;
pub use memory::InMemorySequencePersistence;
