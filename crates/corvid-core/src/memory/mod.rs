//! Long-term per-user memory: extraction, ranking, eviction.

pub mod engine;
pub mod extractor;

pub use engine::MemoryEngine;
pub use extractor::MemoryExtractor;
