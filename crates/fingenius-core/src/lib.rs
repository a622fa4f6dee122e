//! # FinGenius Core
//!
//! I/O-free logic shared by the FinGenius tools: document and chunk
//! models, the recursive character splitter, the in-memory vector index
//! with its merge semantics, and the binary snapshot codec used for the
//! persisted store.
//!
//! Nothing in this crate touches the network, the filesystem or an async
//! runtime. Loading, embedding, generation and persistence live in the
//! `fingenius` application crate.

pub mod error;
pub mod index;
pub mod models;
pub mod snapshot;
pub mod split;

pub use error::{FormatError, IndexError, SplitError};
pub use index::{cosine_similarity, VectorIndex};
pub use models::{Chunk, Document, IndexEntry, ScoredChunk};
pub use split::RecursiveSplitter;
