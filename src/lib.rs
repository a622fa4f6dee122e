//! # FinGenius
//!
//! Incremental document index and retrieval-augmented Q&A for financial and
//! compliance documents.
//!
//! Documents are fetched from URIs (web pages, local or remote PDFs), split
//! into chunks, embedded with a sentence-embedding model and accumulated in
//! a persisted similarity index across independent ingest runs. Questions
//! are answered by retrieving the nearest chunks and handing them, with the
//! question, to a hosted text-generation API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ URL sources │──▶│ LoaderChain  │──▶│ split + embed │
//! │ CLI/file/db │   │ pdf → html   │   │               │
//! └─────────────┘   └──────────────┘   └───────┬───────┘
//!                                              ▼
//!                 ┌──────────────┐     ┌───────────────┐
//!                 │ QueryEngine  │◀────│  IndexStore   │
//!                 │ search + LLM │     │ merge + save  │
//!                 └──────────────┘     └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`loader`] | PDF and HTML loader strategies |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Chat-completions answer generation |
//! | [`store`] | Persisted index with lock and atomic replace |
//! | [`ingest`] | Load → split → embed → merge pipeline |
//! | [`query`] | Retrieval and answering |
//! | [`sources`] | Where URIs to ingest come from |
//! | [`stats`] | Store summary |
//!
//! Pure logic (splitter, vector index, snapshot codec) lives in the
//! `fingenius-core` crate.

pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod loader;
pub mod query;
pub mod sources;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
