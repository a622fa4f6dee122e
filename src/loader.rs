//! Document loaders: turn a URI into [`Document`]s.
//!
//! Two strategies are built in:
//!
//! | Name | Accepts | Extraction |
//! |------|---------|------------|
//! | `pdf` | local path, `file://`, `http(s)://` | `pdf-extract`; non-PDF bytes are rejected |
//! | `html` | local path, `file://`, `http(s)://` | `readability` for HTML, passthrough for plain text and Markdown |
//!
//! A [`LoaderChain`] tries its strategies in order for each URI and returns
//! the first one that yields non-blank text. When every strategy fails, the
//! resulting [`Error::Load`] carries each strategy's error.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use fingenius_core::Document;
use tracing::debug;

use crate::config::LoadersConfig;
use crate::error::{Error, LoaderFailure};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_HTML: &str = "text/html";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// One loading strategy.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Short name used in configuration and error reports.
    fn name(&self) -> &str;

    /// Load `uri` into one or more documents.
    async fn load(&self, uri: &str) -> Result<Vec<Document>>;
}

/// Where a URI points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(reqwest::Url),
}

impl Location {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            bail!("empty URI");
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let url = reqwest::Url::parse(uri).with_context(|| format!("invalid URL: {}", uri))?;
            return Ok(Location::Remote(url));
        }
        if let Some(rest) = uri.strip_prefix("file://") {
            return Ok(Location::Local(PathBuf::from(rest)));
        }
        if uri.contains("://") {
            bail!("unsupported URI scheme: {}", uri);
        }
        Ok(Location::Local(PathBuf::from(uri)))
    }
}

/// Fetched bytes plus the content type the server (or file extension) reports.
struct Fetched {
    bytes: Vec<u8>,
    content_type: Option<String>,
    /// Final URL after redirects, for remote fetches.
    url: Option<reqwest::Url>,
}

/// HTTP client shared by the built-in strategies.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &LoadersConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch(&self, location: &Location) -> Result<Fetched> {
        match location {
            Location::Local(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(Fetched {
                    bytes,
                    content_type: content_type_from_extension(path).map(str::to_string),
                    url: None,
                })
            }
            Location::Remote(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch {}", url))?;

                let status = response.status();
                if !status.is_success() {
                    bail!("HTTP {} from {}", status, url);
                }

                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string());
                let final_url = response.url().clone();
                let bytes = response
                    .bytes()
                    .await
                    .with_context(|| format!("Failed to read response body from {}", url))?;

                Ok(Fetched {
                    bytes: bytes.to_vec(),
                    content_type,
                    url: Some(final_url),
                })
            }
        }
    }
}

fn content_type_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "html" | "htm" | "xhtml" => Some(MIME_HTML),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Strip parameters (`; charset=...`) and normalize case.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

// ============ PDF ============

pub struct PdfLoader {
    fetcher: Fetcher,
}

impl PdfLoader {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Loader for PdfLoader {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn load(&self, uri: &str) -> Result<Vec<Document>> {
        let location = Location::parse(uri)?;
        let fetched = self.fetcher.fetch(&location).await?;

        if !fetched.bytes.starts_with(b"%PDF") {
            bail!(
                "not a PDF (content-type {})",
                fetched.content_type.as_deref().unwrap_or("unknown")
            );
        }

        let bytes = fetched.bytes;
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await?
            .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;

        Ok(vec![Document::new(uri, MIME_PDF, text)])
    }
}

// ============ HTML / text ============

pub struct HtmlLoader {
    fetcher: Fetcher,
}

impl HtmlLoader {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Loader for HtmlLoader {
    fn name(&self) -> &str {
        "html"
    }

    async fn load(&self, uri: &str) -> Result<Vec<Document>> {
        let location = Location::parse(uri)?;
        let fetched = self.fetcher.fetch(&location).await?;

        // Local files without a known extension are read as text.
        let content_type = fetched
            .content_type
            .as_deref()
            .map(essence)
            .unwrap_or_else(|| match &location {
                Location::Local(_) => MIME_TEXT.to_string(),
                Location::Remote(_) => String::new(),
            });

        let text = match content_type.as_str() {
            MIME_HTML | "application/xhtml+xml" => {
                let base = match (&fetched.url, &location) {
                    (Some(url), _) => url.clone(),
                    (None, Location::Local(path)) => file_url(path)?,
                    (None, Location::Remote(url)) => url.clone(),
                };
                let product =
                    readability::extractor::extract(&mut Cursor::new(fetched.bytes.as_slice()), &base)
                        .map_err(|e| anyhow::anyhow!("Failed to extract article content: {}", e))?;
                product.text
            }
            MIME_TEXT | MIME_MARKDOWN => String::from_utf8(fetched.bytes)
                .with_context(|| format!("{} is not valid UTF-8", uri))?,
            other => bail!("unsupported content-type: {}", other),
        };

        Ok(vec![Document::new(uri, content_type, text)])
    }
}

fn file_url(path: &Path) -> Result<reqwest::Url> {
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    reqwest::Url::from_file_path(&absolute)
        .map_err(|_| anyhow::anyhow!("cannot form a file URL for {}", absolute.display()))
}

// ============ Chain ============

/// Ordered loader strategies; the first success wins.
pub struct LoaderChain {
    loaders: Vec<Box<dyn Loader>>,
}

impl LoaderChain {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }

    /// Build the built-in strategies in the configured order.
    pub fn from_config(config: &LoadersConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config)?;
        let mut loaders: Vec<Box<dyn Loader>> = Vec::with_capacity(config.order.len());
        for name in &config.order {
            match name.as_str() {
                "pdf" => loaders.push(Box::new(PdfLoader::new(fetcher.clone()))),
                "html" => loaders.push(Box::new(HtmlLoader::new(fetcher.clone()))),
                other => bail!("Unknown loader: '{}'. Available: pdf, html", other),
            }
        }
        Ok(Self::new(loaders))
    }

    pub fn names(&self) -> Vec<&str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Load `uri` with the first strategy that produces text.
    ///
    /// Blank documents are dropped from a successful result; a strategy
    /// that produces nothing else counts as failed.
    pub async fn load(&self, uri: &str) -> crate::Result<Vec<Document>> {
        let mut attempts = Vec::with_capacity(self.loaders.len());

        for loader in &self.loaders {
            let message = match loader.load(uri).await {
                Ok(docs) => {
                    let docs: Vec<Document> = docs
                        .into_iter()
                        .filter(|d| !d.text.trim().is_empty())
                        .collect();
                    if !docs.is_empty() {
                        debug!(uri, loader = loader.name(), documents = docs.len(), "loaded");
                        return Ok(docs);
                    }
                    "no text extracted".to_string()
                }
                Err(e) => format!("{:#}", e),
            };

            debug!(uri, loader = loader.name(), error = %message, "loader failed");
            attempts.push(LoaderFailure {
                loader: loader.name().to_string(),
                message,
            });
        }

        Err(Error::Load {
            uri: uri.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        name: &'static str,
        result: std::result::Result<&'static str, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Loader for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn load(&self, uri: &str) -> Result<Vec<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Ok(text) => Ok(vec![Document::new(uri, MIME_TEXT, text)]),
                Err(msg) => bail!("{}", msg),
            }
        }
    }

    fn scripted(
        name: &'static str,
        result: std::result::Result<&'static str, &'static str>,
    ) -> (Box<dyn Loader>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = Scripted {
            name,
            result,
            calls: calls.clone(),
        };
        (Box::new(loader), calls)
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(
            Location::parse("/srv/filings/q3.pdf").unwrap(),
            Location::Local(PathBuf::from("/srv/filings/q3.pdf"))
        );
        assert_eq!(
            Location::parse("file:///srv/q3.pdf").unwrap(),
            Location::Local(PathBuf::from("/srv/q3.pdf"))
        );
        assert!(matches!(
            Location::parse("https://example.com/q3.pdf").unwrap(),
            Location::Remote(_)
        ));
        assert!(Location::parse("ftp://example.com/q3.pdf").is_err());
        assert!(Location::parse("   ").is_err());
    }

    #[test]
    fn test_essence() {
        assert_eq!(essence("text/HTML; charset=utf-8"), "text/html");
        assert_eq!(essence("application/pdf"), "application/pdf");
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (a, a_calls) = scripted("a", Ok("from a"));
        let (b, b_calls) = scripted("b", Ok("from b"));
        let chain = LoaderChain::new(vec![a, b]);

        let docs = chain.load("doc").await.unwrap();
        assert_eq!(docs[0].text, "from a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_after_error() {
        let (a, _) = scripted("a", Err("not a PDF"));
        let (b, b_calls) = scripted("b", Ok("fallback text"));
        let chain = LoaderChain::new(vec![a, b]);

        let docs = chain.load("doc").await.unwrap();
        assert_eq!(docs[0].text, "fallback text");
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_success_falls_back() {
        let (a, _) = scripted("a", Ok("  \n\t "));
        let (b, _) = scripted("b", Ok("real text"));
        let chain = LoaderChain::new(vec![a, b]);

        assert_eq!(chain.load("doc").await.unwrap()[0].text, "real text");
    }

    #[tokio::test]
    async fn test_all_fail_reports_every_attempt() {
        let (a, _) = scripted("a", Err("bad magic"));
        let (b, _) = scripted("b", Ok(""));
        let chain = LoaderChain::new(vec![a, b]);

        match chain.load("https://example.com/x").await {
            Err(Error::Load { uri, attempts }) => {
                assert_eq!(uri, "https://example.com/x");
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].loader, "a");
                assert_eq!(attempts[0].message, "bad magic");
                assert_eq!(attempts[1].message, "no text extracted");
            }
            other => panic!("expected Load error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pdf_loader_rejects_text_then_html_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notice.txt");
        std::fs::write(&path, "Annual compliance notice.\n\nAll filings are due in March.").unwrap();
        let uri = path.to_string_lossy().to_string();

        let fetcher = Fetcher::new(&LoadersConfig::default()).unwrap();
        let pdf = PdfLoader::new(fetcher.clone());
        let err = pdf.load(&uri).await.unwrap_err();
        assert!(err.to_string().contains("not a PDF"));

        let chain = LoaderChain::from_config(&LoadersConfig::default()).unwrap();
        assert_eq!(chain.names(), vec!["pdf", "html"]);
        let docs = chain.load(&uri).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, uri);
        assert_eq!(docs[0].content_type, MIME_TEXT);
        assert!(docs[0].text.contains("due in March"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_every_loader() {
        let chain = LoaderChain::from_config(&LoadersConfig::default()).unwrap();
        let err = chain.load("/nonexistent/filing.pdf").await.unwrap_err();
        match err {
            Error::Load { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts.iter().all(|a| a.message.contains("Failed to read")));
            }
            other => panic!("expected Load error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_html_loader_rejects_unknown_binary_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();

        let html = HtmlLoader::new(Fetcher::new(&LoadersConfig::default()).unwrap());
        let err = html.load(&path.to_string_lossy()).await.unwrap_err();
        assert!(err.to_string().contains("unsupported content-type"));
    }
}
