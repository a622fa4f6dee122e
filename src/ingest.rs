//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for a batch of URIs: load → split → embed →
//! build a fresh index → merge into the persisted store.
//!
//! A URI whose loaders all fail is skipped with a warning and listed in the
//! [`IngestReport`]; the rest of the batch is still indexed. Only when no
//! URI loads does the run fail, with the first [`Error::Load`], and the
//! store is left untouched.

use fingenius_core::{Document, RecursiveSplitter, VectorIndex};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{create_embedder, embed_all, Embedder};
use crate::error::{Error, Result};
use crate::loader::LoaderChain;
use crate::store::{IndexStore, MergeOutcome};

/// A URI that was skipped because no loader could read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUri {
    pub uri: String,
    pub error: String,
}

/// Summary of one ingest run. The store itself is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub uris: usize,
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedUri>,
    pub store: MergeOutcome,
}

pub struct Ingestor {
    loaders: LoaderChain,
    splitter: RecursiveSplitter,
    embedder: Box<dyn Embedder>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        loaders: LoaderChain,
        splitter: RecursiveSplitter,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        Self {
            loaders,
            splitter,
            embedder,
            batch_size: 64,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            LoaderChain::from_config(&config.loaders)?,
            config.chunking.splitter()?,
            create_embedder(&config.embedding)?,
        )
        .with_batch_size(config.embedding.batch_size))
    }

    /// Index `uris` and merge the result into `store`.
    ///
    /// The writer lock is taken before anything is loaded, so a concurrent
    /// ingest fails fast with [`Error::Locked`].
    pub async fn ingest(&self, uris: &[String], store: &IndexStore) -> Result<IngestReport> {
        if uris.is_empty() {
            return Err(Error::Config("no URIs to ingest".to_string()));
        }

        let _guard = store.writer_lock()?;

        let mut documents: Vec<Document> = Vec::new();
        let mut skipped = Vec::new();
        let mut first_failure = None;

        for uri in uris {
            match self.loaders.load(uri).await {
                Ok(docs) => {
                    info!(uri = %uri, documents = docs.len(), "loaded");
                    documents.extend(docs);
                }
                Err(e) => {
                    warn!(uri = %uri, error = %e, "skipping URI");
                    skipped.push(SkippedUri {
                        uri: uri.clone(),
                        error: e.to_string(),
                    });
                    first_failure.get_or_insert(e);
                }
            }
        }

        if documents.is_empty() {
            return Err(first_failure
                .unwrap_or_else(|| Error::Config("no documents loaded".to_string())));
        }

        let chunks = self.splitter.split_documents(&documents);
        if chunks.is_empty() {
            return Err(Error::Config("loaded documents contain no text".to_string()));
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "embedding chunks"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_all(self.embedder.as_ref(), &texts, self.batch_size).await?;

        let fresh = VectorIndex::from_embeddings(
            self.embedder.model_name(),
            self.embedder.dims(),
            chunks,
            vectors,
        )?;
        let chunk_count = fresh.len();

        let outcome = store.merge_while_locked(fresh)?;
        info!(
            path = %store.path().display(),
            previous = outcome.previous,
            total = outcome.total,
            "store updated"
        );

        Ok(IngestReport {
            uris: uris.len(),
            documents: documents.len(),
            chunks: chunk_count,
            skipped,
            store: outcome,
        })
    }
}
