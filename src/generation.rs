//! Answer generation over retrieved chunks.
//!
//! The [`Generator`] receives the question and the retrieved chunks and
//! returns the model's answer. [`ChatCompletionsGenerator`] talks to any
//! OpenAI-compatible `chat/completions` endpoint (Groq by default). Calls
//! are made once; a failure or timeout surfaces as [`Error::Upstream`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fingenius_core::ScoredChunk;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

const SYSTEM_PROMPT: &str = "You answer questions about financial and compliance documents. \
Use only the extracted parts below. If they do not contain the answer, say that you don't know. \
End your answer with a line starting with \"SOURCES:\" listing the sources you used.";

/// Generated answer plus any sources the model cited in a `SOURCES:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub answer: String,
    pub cited_sources: Vec<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, chunks: &[ScoredChunk]) -> Result<Generation>;
}

pub struct ChatCompletionsGenerator {
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatCompletionsGenerator {
    /// # Errors
    ///
    /// Fails if the API key variable for the configured provider is not set.
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let key_env = config.api_key_env();
        let api_key = std::env::var(key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", key_env))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            model: config.model().to_string(),
            endpoint: format!("{}/chat/completions", config.base_url().trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    async fn generate(&self, question: &str, chunks: &[ScoredChunk]) -> Result<Generation> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(question, chunks)},
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Upstream(format!("request to {} timed out", self.endpoint))
                } else {
                    Error::Upstream(format!("request to {} failed: {}", self.endpoint, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("HTTP {}: {}", status, body_text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid response body: {}", e)))?;

        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| Error::Upstream("response has no choices[0].message.content".into()))?;

        Ok(parse_answer(content))
    }
}

/// Lay out retrieved chunks as `Content:`/`Source:` pairs followed by the
/// question.
pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let mut prompt = String::from("Extracted parts of documents:\n\n");
    for hit in chunks {
        prompt.push_str("Content: ");
        prompt.push_str(hit.chunk.text.trim());
        prompt.push_str("\nSource: ");
        prompt.push_str(&hit.chunk.source);
        prompt.push_str("\n\n");
    }
    prompt.push_str("QUESTION: ");
    prompt.push_str(question.trim());
    prompt.push_str("\nFINAL ANSWER:");
    prompt
}

/// Split a trailing `SOURCES:` (or `SOURCE:`) section off the answer.
///
/// Sources may be separated by commas or newlines; duplicates are dropped.
pub fn parse_answer(raw: &str) -> Generation {
    // ASCII upper-casing keeps byte offsets aligned with `raw`.
    let upper = raw.to_ascii_uppercase();
    let marker = upper
        .rfind("SOURCES:")
        .map(|i| (i, "SOURCES:".len()))
        .or_else(|| upper.rfind("SOURCE:").map(|i| (i, "SOURCE:".len())));

    let Some((at, len)) = marker else {
        return Generation {
            answer: raw.trim().to_string(),
            cited_sources: Vec::new(),
        };
    };

    let mut cited_sources: Vec<String> = Vec::new();
    for source in raw[at + len..].split([',', '\n']) {
        let source = source.trim();
        if !source.is_empty() && !cited_sources.iter().any(|s| s == source) {
            cited_sources.push(source.to_string());
        }
    }

    Generation {
        answer: raw[..at].trim().to_string(),
        cited_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingenius_core::Chunk;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn hit(source: &str, text: &str) -> ScoredChunk {
        ScoredChunk {
            id: "id".to_string(),
            chunk: Chunk {
                source: source.to_string(),
                chunk_index: 0,
                text: text.to_string(),
                hash: String::new(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_prompt_pairs_content_with_source() {
        let prompt = build_prompt(
            "When are filings due?",
            &[
                hit("https://example.com/a.pdf", "Filings are due in March."),
                hit("b.html", "Late filings incur a penalty."),
            ],
        );
        assert!(prompt.contains(
            "Content: Filings are due in March.\nSource: https://example.com/a.pdf\n\n"
        ));
        assert!(prompt.contains("Source: b.html"));
        assert!(prompt.ends_with("QUESTION: When are filings due?\nFINAL ANSWER:"));
    }

    #[test]
    fn test_parse_answer_with_sources() {
        let g = parse_answer("Filings are due in March.\nSOURCES: a.pdf, b.html\na.pdf");
        assert_eq!(g.answer, "Filings are due in March.");
        assert_eq!(g.cited_sources, vec!["a.pdf", "b.html"]);
    }

    #[test]
    fn test_parse_answer_singular_and_lowercase() {
        let g = parse_answer("No penalty applies.\nSource: rules.pdf");
        assert_eq!(g.answer, "No penalty applies.");
        assert_eq!(g.cited_sources, vec!["rules.pdf"]);
    }

    #[test]
    fn test_parse_answer_without_sources() {
        let g = parse_answer("  I don't know.  ");
        assert_eq!(g.answer, "I don't know.");
        assert!(g.cited_sources.is_empty());
    }

    #[test]
    fn test_missing_key_fails_construction() {
        let config = GenerationConfig {
            api_key_env: Some("FINGENIUS_TEST_UNSET_GROQ".to_string()),
            ..GenerationConfig::default()
        };
        let err = ChatCompletionsGenerator::new(&config).err().unwrap();
        assert!(err.to_string().contains("FINGENIUS_TEST_UNSET_GROQ"));
    }

    #[test]
    fn test_provider_selects_endpoint() {
        let groq =
            ChatCompletionsGenerator::with_api_key(&GenerationConfig::default(), "k".into()).unwrap();
        assert_eq!(groq.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(groq.model(), "llama-3.3-70b-versatile");

        let config = GenerationConfig {
            provider: "openai".to_string(),
            ..GenerationConfig::default()
        };
        let openai = ChatCompletionsGenerator::with_api_key(&config, "k".into()).unwrap();
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(openai.model(), "gpt-4o-mini");
    }

    fn local_generator(base_url: String) -> ChatCompletionsGenerator {
        let config = GenerationConfig {
            base_url: Some(base_url),
            timeout_secs: 1,
            ..GenerationConfig::default()
        };
        ChatCompletionsGenerator::with_api_key(&config, "test-key".into()).unwrap()
    }

    /// Read one HTTP request (headers plus `content-length` body).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer a single request with `status` and `body`; returns the base URL
    /// and the received request.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (base_url, handle)
    }

    #[tokio::test]
    async fn test_generate_parses_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "Due in March.\nSOURCES: a.pdf"}}]
        })
        .to_string();
        let (base_url, server) = serve_once("200 OK", body).await;

        let generation = local_generator(base_url)
            .generate("When?", &[hit("a.pdf", "Filings are due in March.")])
            .await
            .unwrap();
        assert_eq!(generation.answer, "Due in March.");
        assert_eq!(generation.cited_sources, vec!["a.pdf"]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer test-key"));
        assert!(request.contains("llama-3.3-70b-versatile"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let (base_url, _server) =
            serve_once("503 Service Unavailable", "overloaded".to_string()).await;

        let err = local_generator(base_url)
            .generate("When?", &[])
            .await
            .unwrap_err();
        match err {
            Error::Upstream(message) => {
                assert!(message.contains("503"), "{}", message);
                assert!(message.contains("overloaded"), "{}", message);
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out_as_upstream_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let err = local_generator(base_url)
            .generate("When?", &[])
            .await
            .unwrap_err();
        match err {
            Error::Upstream(message) => assert!(message.contains("timed out"), "{}", message),
            other => panic!("expected Upstream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reply_without_content_is_upstream_error() {
        let (base_url, _server) = serve_once("200 OK", "{\"choices\": []}".to_string()).await;

        let err = local_generator(base_url)
            .generate("When?", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
