//! Where the URIs to ingest come from.
//!
//! | Source | Input |
//! |--------|-------|
//! | [`StaticUrls`] | URIs given on the command line |
//! | [`UrlFile`] | a text file, one URI per line, `#` comments |
//! | [`DirectorySource`] | local files under a root, filtered by globs |
//! | `MongoUrlSource` | documents with a `url` field (feature `mongodb`) |

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::DirectorySourceConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait UrlSource: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    async fn urls(&self) -> Result<Vec<String>>;
}

/// Gather URIs from every source, in order.
pub async fn collect_urls(sources: &[Box<dyn UrlSource>]) -> Result<Vec<String>> {
    let mut all = Vec::new();
    for source in sources {
        let urls = source.urls().await?;
        tracing::info!(source = %source.describe(), count = urls.len(), "collected URIs");
        all.extend(urls);
    }
    Ok(all)
}

pub struct StaticUrls(pub Vec<String>);

#[async_trait]
impl UrlSource for StaticUrls {
    fn describe(&self) -> String {
        "command line".to_string()
    }

    async fn urls(&self) -> Result<Vec<String>> {
        Ok(self
            .0
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect())
    }
}

pub struct UrlFile {
    path: PathBuf,
}

impl UrlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UrlSource for UrlFile {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn urls(&self) -> Result<Vec<String>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Source(format!("cannot read {}: {}", self.path.display(), e)))?;
        Ok(parse_url_list(&content))
    }
}

fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Local documents under `root`, as file paths.
pub struct DirectorySource {
    root: PathBuf,
    config: DirectorySourceConfig,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, config: DirectorySourceConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn scan(&self) -> Result<Vec<String>> {
        let root = &self.root;
        if !root.is_dir() {
            return Err(Error::Source(format!(
                "directory does not exist: {}",
                root.display()
            )));
        }

        let include_set = build_globset(&self.config.include_globs)?;
        let mut excludes = vec!["**/.git/**".to_string()];
        excludes.extend(self.config.exclude_globs.iter().cloned());
        let exclude_set = build_globset(&excludes)?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(self.config.follow_symlinks) {
            let entry = entry.map_err(|e| Error::Source(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_str(root, path);
            if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
                continue;
            }
            paths.push(path.to_string_lossy().to_string());
        }

        paths.sort();
        Ok(paths)
    }
}

fn relative_str(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}

#[async_trait]
impl UrlSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn urls(&self) -> Result<Vec<String>> {
        self.scan()
    }
}

#[cfg(feature = "mongodb")]
pub use mongo::MongoUrlSource;

#[cfg(feature = "mongodb")]
mod mongo {
    use super::*;
    use futures::TryStreamExt;
    use mongodb::bson::Document;

    use crate::config::MongoSourceConfig;

    /// Every document in the collection that has the URL field, fetched in
    /// one pass.
    pub struct MongoUrlSource {
        config: MongoSourceConfig,
    }

    impl MongoUrlSource {
        pub fn new(config: MongoSourceConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl UrlSource for MongoUrlSource {
        fn describe(&self) -> String {
            format!(
                "mongodb {}.{}",
                self.config.database, self.config.collection
            )
        }

        async fn urls(&self) -> Result<Vec<String>> {
            let uri = std::env::var(&self.config.uri_env).map_err(|_| {
                Error::Source(format!("{} environment variable not set", self.config.uri_env))
            })?;

            let client = mongodb::Client::with_uri_str(&uri)
                .await
                .map_err(|e| Error::Source(format!("cannot connect: {}", e)))?;
            let collection = client
                .database(&self.config.database)
                .collection::<Document>(&self.config.collection);

            let field = self.config.field.as_str();
            let mut exists = Document::new();
            exists.insert("$exists", true);
            let mut filter = Document::new();
            filter.insert(field, exists);
            let mut projection = Document::new();
            projection.insert(field, 1);

            let mut cursor = collection
                .find(filter)
                .projection(projection)
                .await
                .map_err(|e| Error::Source(format!("find failed: {}", e)))?;

            let mut urls = Vec::new();
            while let Some(doc) = cursor
                .try_next()
                .await
                .map_err(|e| Error::Source(format!("cursor failed: {}", e)))?
            {
                match doc.get_str(field) {
                    Ok(url) if !url.trim().is_empty() => urls.push(url.trim().to_string()),
                    _ => tracing::warn!(field, "skipping document without a string URL"),
                }
            }
            Ok(urls)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_url_list() {
        let content = "# quarterly filings\nhttps://example.com/q1.pdf\n\n  https://example.com/q2.pdf  \n#https://skipped\n";
        assert_eq!(
            parse_url_list(content),
            vec!["https://example.com/q1.pdf", "https://example.com/q2.pdf"]
        );
    }

    #[tokio::test]
    async fn test_static_urls_drop_blanks() {
        let source = StaticUrls(vec!["a.pdf".into(), "  ".into(), " b.html ".into()]);
        assert_eq!(source.urls().await.unwrap(), vec!["a.pdf", "b.html"]);
    }

    #[tokio::test]
    async fn test_url_file_missing_is_source_error() {
        let source = UrlFile::new("/nonexistent/urls.txt");
        assert!(matches!(source.urls().await, Err(Error::Source(_))));
    }

    #[tokio::test]
    async fn test_directory_source_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("filings/2024")).unwrap();
        fs::create_dir_all(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("filings/2024/q2.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("filings/a.txt"), b"text").unwrap();
        fs::write(dir.path().join("filings/image.png"), b"png").unwrap();
        fs::write(dir.path().join("drafts/wip.txt"), b"draft").unwrap();

        let config = DirectorySourceConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..DirectorySourceConfig::default()
        };
        let source = DirectorySource::new(dir.path(), config);
        let urls = source.urls().await.unwrap();

        let names: Vec<String> = urls
            .iter()
            .map(|u| relative_str(dir.path(), Path::new(u)))
            .collect();
        assert_eq!(names, vec!["filings/2024/q2.pdf", "filings/a.txt"]);
    }

    #[tokio::test]
    async fn test_collect_urls_concatenates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("urls.txt");
        fs::write(&list, "https://example.com/b\n").unwrap();

        let sources: Vec<Box<dyn UrlSource>> = vec![
            Box::new(StaticUrls(vec!["https://example.com/a".into()])),
            Box::new(UrlFile::new(&list)),
        ];
        assert_eq!(
            collect_urls(&sources).await.unwrap(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }
}
