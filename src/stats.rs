//! Store statistics.
//!
//! Re-opens the store and summarizes what's indexed: entry count, the
//! embedding model that produced it, file size and per-source chunk counts.
//! Used by `fingenius stats` to confirm that ingest runs are accumulating.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::IndexStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    pub entries: usize,
    pub model: String,
    pub dims: usize,
    pub sources: BTreeMap<String, usize>,
}

pub fn store_stats(store: &IndexStore) -> Result<StoreStats> {
    let index = store.load()?;
    let metadata = std::fs::metadata(store.path()).map_err(|source| Error::Persistence {
        path: store.path().to_path_buf(),
        action: "stat",
        source,
    })?;

    Ok(StoreStats {
        path: store.path().to_path_buf(),
        size_bytes: metadata.len(),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        entries: index.len(),
        model: index.model().to_string(),
        dims: index.dims(),
        sources: index.source_counts(),
    })
}

/// Print a summary of the store to stdout.
pub fn print_stats(stats: &StoreStats) {
    println!("FinGenius — Store Stats");
    println!("=======================");
    println!();
    println!("  Store:       {}", stats.path.display());
    println!("  Size:        {}", format_bytes(stats.size_bytes));
    if let Some(modified) = stats.modified {
        println!("  Updated:     {}", format_ts_relative(modified));
    }
    println!("  Model:       {} ({} dims)", stats.model, stats.dims);
    println!("  Entries:     {}", stats.entries);
    println!("  Sources:     {}", stats.sources.len());

    if !stats.sources.is_empty() {
        println!();
        println!("  {:<60} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(69));
        let mut by_count: Vec<(&String, &usize)> = stats.sources.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (source, count) in by_count {
            println!("  {:<60} {:>8}", truncate(source, 60), count);
        }
    }

    println!();
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let tail: String = s
        .chars()
        .rev()
        .take(max - 1)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{}", tail)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        ts.format("%Y-%m-%d %H:%M").to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingenius_core::{Chunk, VectorIndex};

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        assert_eq!(format_ts_relative(Utc::now()), "just now");
        let two_hours = Utc::now() - chrono::Duration::hours(2);
        assert_eq!(format_ts_relative(two_hours), "2 hours ago");
    }

    #[test]
    fn test_truncate_keeps_tail() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("https://example.com/filing.pdf", 10), "…iling.pdf");
    }

    #[test]
    fn test_store_stats_counts_sources() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("docs.fgvs"));
        let chunk = |source: &str| Chunk {
            source: source.to_string(),
            chunk_index: 0,
            text: "t".to_string(),
            hash: String::new(),
        };
        let index = VectorIndex::from_embeddings(
            "all-minilm-l6-v2",
            2,
            vec![chunk("a.pdf"), chunk("a.pdf"), chunk("b.html")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();
        store.save(&index).unwrap();

        let stats = store_stats(&store).unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.model, "all-minilm-l6-v2");
        assert_eq!(stats.dims, 2);
        assert_eq!(stats.sources.get("a.pdf"), Some(&2));
        assert_eq!(stats.sources.get("b.html"), Some(&1));
        assert!(stats.size_bytes > 0);
        assert!(stats.modified.is_some());
    }

    #[test]
    fn test_store_stats_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("absent.fgvs"));
        assert!(matches!(store_stats(&store), Err(Error::NotFound(_))));
    }
}
