//! Error taxonomy for ingestion and querying.
//!
//! Every variant propagates to the caller unmodified; nothing here is
//! retried or recovered locally.

use std::path::PathBuf;

use fingenius_core::{FormatError, IndexError};
use thiserror::Error;

/// One loader strategy's failure for a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderFailure {
    pub loader: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Every loader strategy failed for `uri`.
    #[error("no loader could read {uri}: {}", summarize(.attempts))]
    Load {
        uri: String,
        attempts: Vec<LoaderFailure>,
    },

    /// The store file exists but is not a valid snapshot.
    #[error("store {} is not a valid index: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("failed to {action} store {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("no store at {}; ingest documents first", .0.display())]
    NotFound(PathBuf),

    #[error("generation failed: {0}")]
    Upstream(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error(
        "store {} is locked by another writer (delete {} if no ingest is running)",
        .store.display(),
        .lock.display()
    )]
    Locked { store: PathBuf, lock: PathBuf },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("url source failed: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn summarize(attempts: &[LoaderFailure]) -> String {
    if attempts.is_empty() {
        return "no loaders configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.loader, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}
