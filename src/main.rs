//! # FinGenius CLI (`fingenius`)
//!
//! Builds and queries an incremental document index for financial and
//! compliance documents.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fingenius ingest [URI...]` | Load, split, embed and merge documents into the store |
//! | `fingenius query "<question>"` | Answer a question from the indexed documents |
//! | `fingenius report` | Run the fixed compliance-analysis question |
//! | `fingenius stats` | Summarize the store |
//!
//! ## Examples
//!
//! ```bash
//! # Index two filings
//! fingenius ingest https://example.com/10-k.pdf ./policies/aml.html
//!
//! # Index every URI listed in a file, then every local PDF under ./filings
//! fingenius ingest --urls-file urls.txt --dir ./filings
//!
//! # Ask a question
//! fingenius query "What are the reporting deadlines?"
//! ```
//!
//! `.env` in the working directory is loaded before the config, so API keys
//! (`GROQ_API_KEY`, `OPENAI_API_KEY`, `MONGO_URI`) can live there.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fingenius::config::{self, Config};
use fingenius::ingest::{IngestReport, Ingestor};
use fingenius::query::{self, Answer};
use fingenius::sources::{collect_urls, DirectorySource, StaticUrls, UrlFile, UrlSource};
use fingenius::stats;
use fingenius::store::IndexStore;

/// FinGenius: ask questions about financial and compliance documents.
#[derive(Parser)]
#[command(
    name = "fingenius",
    version,
    about = "Incremental document index and Q&A for financial and compliance documents"
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is absent.
    #[arg(long, global = true, default_value = "./config/fingenius.toml")]
    config: PathBuf,

    /// Override `[store].path`.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents and merge them into the store.
    ///
    /// Each URI is tried with the configured loaders in order (PDF, then
    /// HTML/text by default). URIs no loader can read are skipped and
    /// reported; the run fails only if none load.
    Ingest {
        /// Document URIs: local paths, `file://` or `http(s)://` URLs.
        uris: Vec<String>,

        /// Read additional URIs from a file, one per line.
        #[arg(long)]
        urls_file: Option<PathBuf>,

        /// Add every matching file under a directory.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Add URIs from the configured MongoDB collection.
        #[arg(long)]
        mongodb: bool,
    },

    /// Answer a question from the indexed documents.
    Query {
        question: String,

        /// Number of chunks to retrieve (overrides `[retrieval].k`).
        #[arg(long)]
        k: Option<usize>,

        /// Also print the retrieved chunks with their scores.
        #[arg(long)]
        show_chunks: bool,
    },

    /// Run the built-in compliance analysis over the indexed documents.
    Report,

    /// Show what the store contains.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "fingenius=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load_or_default(&cli.config)?;
    if let Some(path) = cli.store {
        cfg.store.path = path;
    }
    let store = IndexStore::from_config(&cfg.store);

    match cli.command {
        Commands::Ingest {
            uris,
            urls_file,
            dir,
            mongodb,
        } => {
            let sources = url_sources(&cfg, uris, urls_file, dir, mongodb)?;
            let uris = collect_urls(&sources).await?;
            if uris.is_empty() {
                bail!("no URIs to ingest");
            }

            let ingestor = Ingestor::from_config(&cfg)?;
            let report = ingestor.ingest(&uris, &store).await?;
            print_ingest_report(&store, &report);
        }
        Commands::Query {
            question,
            k,
            show_chunks,
        } => {
            if let Some(k) = k {
                cfg.retrieval.k = k;
                config::validate(&cfg)?;
            }
            let answer = query::run_query(&cfg, &store, &question).await?;
            print_answer(&answer, show_chunks);
        }
        Commands::Report => {
            let answer = query::run_report(&cfg, &store).await?;
            print_answer(&answer, false);
        }
        Commands::Stats => {
            let summary = stats::store_stats(&store)?;
            stats::print_stats(&summary);
        }
    }

    Ok(())
}

fn url_sources(
    cfg: &Config,
    uris: Vec<String>,
    urls_file: Option<PathBuf>,
    dir: Option<PathBuf>,
    mongodb: bool,
) -> anyhow::Result<Vec<Box<dyn UrlSource>>> {
    let mut sources: Vec<Box<dyn UrlSource>> = Vec::new();
    if !uris.is_empty() {
        sources.push(Box::new(StaticUrls(uris)));
    }
    if let Some(path) = urls_file {
        sources.push(Box::new(UrlFile::new(path)));
    }
    if let Some(root) = dir {
        sources.push(Box::new(DirectorySource::new(
            root,
            cfg.sources.directory.clone(),
        )));
    }
    if mongodb {
        sources.push(mongo_source(cfg)?);
    }
    if sources.is_empty() {
        bail!("nothing to ingest: pass URIs, --urls-file, --dir or --mongodb");
    }
    Ok(sources)
}

#[cfg(feature = "mongodb")]
fn mongo_source(cfg: &Config) -> anyhow::Result<Box<dyn UrlSource>> {
    Ok(Box::new(fingenius::sources::MongoUrlSource::new(
        cfg.sources.mongodb.clone(),
    )))
}

#[cfg(not(feature = "mongodb"))]
fn mongo_source(_cfg: &Config) -> anyhow::Result<Box<dyn UrlSource>> {
    bail!("--mongodb requires building with --features mongodb")
}

fn print_ingest_report(store: &IndexStore, report: &IngestReport) {
    println!("ingest");
    println!("  uris: {}", report.uris);
    println!("  documents loaded: {}", report.documents);
    println!("  chunks indexed: {}", report.chunks);
    if !report.skipped.is_empty() {
        println!("  skipped: {}", report.skipped.len());
        for skipped in &report.skipped {
            println!("    {}: {}", skipped.uri, skipped.error);
        }
    }
    println!(
        "  store: {} ({} → {} entries)",
        store.path().display(),
        report.store.previous,
        report.store.total
    );
    println!("ok");
}

fn print_answer(answer: &Answer, show_chunks: bool) {
    print!("{}", render_answer(answer, show_chunks));
}

fn render_answer(answer: &Answer, show_chunks: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.answer);

    if !answer.sources.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for source in &answer.sources {
            let _ = writeln!(out, "  - {}", source);
        }
    }

    if !answer.cited_sources.is_empty() {
        let _ = writeln!(out, "\nCited by the model:");
        for source in &answer.cited_sources {
            let _ = writeln!(out, "  - {}", source);
        }
    }

    if show_chunks {
        let _ = writeln!(out);
        for (rank, hit) in answer.hits.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. [{:.3}] {} #{}",
                rank + 1,
                hit.score,
                hit.chunk.source,
                hit.chunk.chunk_index
            );
            let preview: String = hit.chunk.text.chars().take(240).collect();
            let _ = writeln!(out, "   {}", preview.replace('\n', " "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ingest_sources() {
        let cli = Cli::try_parse_from([
            "fingenius",
            "--store",
            "/tmp/x.fgvs",
            "ingest",
            "a.pdf",
            "https://example.com/b",
            "--urls-file",
            "urls.txt",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/x.fgvs")));
        match cli.command {
            Commands::Ingest {
                uris,
                urls_file,
                dir,
                mongodb,
            } => {
                assert_eq!(uris, vec!["a.pdf", "https://example.com/b"]);
                assert_eq!(urls_file, Some(PathBuf::from("urls.txt")));
                assert!(dir.is_none());
                assert!(!mongodb);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_ingest_requires_some_source() {
        let err = url_sources(&Config::default(), vec![], None, None, false)
            .err()
            .unwrap();
        assert!(err.to_string().contains("nothing to ingest"));
    }

    #[test]
    fn test_query_k_override() {
        let cli = Cli::try_parse_from(["fingenius", "query", "deadlines?", "--k", "8"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { k: Some(8), .. }));
    }

    #[test]
    fn test_answer_lists_retrieved_then_cited_sources() {
        let answer = Answer {
            answer: "Filings are due in March.".to_string(),
            sources: vec!["a.pdf".to_string(), "b.html".to_string()],
            cited_sources: vec!["a.pdf".to_string()],
            hits: Vec::new(),
        };
        let text = render_answer(&answer, false);
        assert_eq!(
            text,
            "Filings are due in March.\n\nSources:\n  - a.pdf\n  - b.html\n\nCited by the model:\n  - a.pdf\n"
        );
    }
}
