//! Vector index backends for IssuesPilot.
//!
//! All backends implement the `issuespilot_core::VectorIndex` trait.
//!
//! - [`ChromaIndex`]: Chroma HTTP API (v2 routes)
//! - [`InMemoryIndex`]: in-process store for tests and offline runs

pub mod chroma;
pub mod in_memory;
pub mod vector;

pub use chroma::ChromaIndex;
pub use in_memory::InMemoryIndex;
pub use vector::{cosine_distance, cosine_similarity, rank_by_distance};
