//! Question answering over the persisted store.
//!
//! A query opens the store, embeds the question, retrieves the `k` nearest
//! chunks and hands them to the [`Generator`]. The store is opened first,
//! so a missing store fails with [`Error::NotFound`] before any embedding
//! or generation call is made.

use fingenius_core::{ScoredChunk, VectorIndex};
use tracing::{debug, info};

use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::error::{Error, Result};
use crate::generation::{ChatCompletionsGenerator, Generator};
use crate::store::IndexStore;

/// Fixed question used by the `report` command: a structured compliance
/// report ending in a SWOT analysis.
pub const REPORT_PROMPT: &str = r#"Give and Extract and summarize all key compliance-related information from the provided company compliance documents.
The output should be structured and each point answer should be in 3 to 4 lines in the following format based on whatever data you provided doesn't matter its sufficient or not.:

### **Company Compliance Report Analysis**
#### **1. Overview of Compliance Policies**
- List the compliance policies and standards mentioned in the document.

#### **2. Financial & Tax Compliance Details**
- Summarize details related to financial disclosures, tax policies, and financial reporting.

#### **3. Legal & Regulatory Compliance**
- List key legal obligations and regulations the company follows.

#### **4. Data Privacy & Security Policies**
- Summarize company policies related to data protection, cybersecurity, and GDPR-like compliance.

#### **5. Industry-Specific Compliance**
- Extract any specific compliance measures relevant to the company's industry.

#### **6. Risk Management & Internal Controls**
- Summarize how the company handles risk management and internal audits.

#### **7. Employee & Ethical Compliance**
- List company policies on ethical behavior, whistleblower protection, and employee compliance.

#### **8. provide all raw info about company policies and standards.
- details of all company policies and standards mentioned in the document.

#### **9. give the detailed summary.
- detailed summary of the document.

#### **10. Provide a detailed breakdown without making comparisons or judgments.

### **11. also Provide a Detailed SWOT Analysis of the company.
- Strengths, Weaknesses, Opportunities, and Threats of the company.
- Pros and Cons of the company.
- Opportunities and Threats faced by the company.

**Provide a detailed breakdown without making comparisons or judgments. The extracted details will be further analyzed by another model.**"#;

/// Answer text plus the distinct sources of the retrieved chunks, in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
    /// Sources the model itself listed, if any.
    pub cited_sources: Vec<String>,
    pub hits: Vec<ScoredChunk>,
}

pub struct QueryEngine {
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    k: usize,
}

impl QueryEngine {
    pub fn new(embedder: Box<dyn Embedder>, generator: Box<dyn Generator>, k: usize) -> Self {
        Self {
            embedder,
            generator,
            k: k.max(1),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            create_embedder(&config.embedding)?,
            Box::new(ChatCompletionsGenerator::new(&config.generation)?),
            config.retrieval.k,
        ))
    }

    /// Open `store` and answer `question` against it.
    pub async fn query(&self, store: &IndexStore, question: &str) -> Result<Answer> {
        let index = store.load()?;
        self.answer(&index, question).await
    }

    /// Answer `question` against an already loaded index.
    pub async fn answer(&self, index: &VectorIndex, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Config("question is empty".to_string()));
        }
        if index.model() != self.embedder.model_name() {
            return Err(Error::Config(format!(
                "store was built with embedding model '{}' but '{}' is configured",
                index.model(),
                self.embedder.model_name()
            )));
        }

        let probe = embed_query(self.embedder.as_ref(), question).await?;
        let hits = index.search(&probe, self.k)?;
        debug!(hits = hits.len(), k = self.k, "retrieved chunks");

        let generation = self.generator.generate(question, &hits).await?;
        info!(sources = hits.len(), "answer generated");

        Ok(Answer {
            answer: generation.answer,
            sources: distinct_sources(&hits),
            cited_sources: generation.cited_sources,
            hits,
        })
    }
}

fn distinct_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.chunk.source) {
            sources.push(hit.chunk.source.clone());
        }
    }
    sources
}

/// Load the store before building any provider, then answer.
///
/// Used by the CLI so that a missing store never triggers a model download
/// or a credential check.
pub async fn run_query(config: &Config, store: &IndexStore, question: &str) -> anyhow::Result<Answer> {
    let index = store.load()?;
    let engine = QueryEngine::from_config(config)?;
    Ok(engine.answer(&index, question).await?)
}

/// [`run_query`] with [`REPORT_PROMPT`].
pub async fn run_report(config: &Config, store: &IndexStore) -> anyhow::Result<Answer> {
    run_query(config, store, REPORT_PROMPT).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingenius_core::Chunk;

    fn hit(source: &str) -> ScoredChunk {
        ScoredChunk {
            id: String::new(),
            chunk: Chunk {
                source: source.to_string(),
                chunk_index: 0,
                text: String::new(),
                hash: String::new(),
            },
            score: 0.0,
        }
    }

    #[test]
    fn test_distinct_sources_keep_rank_order() {
        let hits = vec![hit("b.pdf"), hit("a.html"), hit("b.pdf"), hit("c.pdf")];
        assert_eq!(distinct_sources(&hits), vec!["b.pdf", "a.html", "c.pdf"]);
    }

    #[tokio::test]
    async fn test_run_query_missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("absent.fgvs"));
        // The default config would need a model download and GROQ_API_KEY;
        // neither is reached.
        let err = run_query(&Config::default(), &store, "anything").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_report_missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("absent.fgvs"));
        let err = run_report(&Config::default(), &store).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_report_prompt_covers_all_sections() {
        assert!(REPORT_PROMPT.contains("### **Company Compliance Report Analysis**"));
        for n in 1..=11 {
            assert!(REPORT_PROMPT.contains(&format!("**{}. ", n)), "section {}", n);
        }
        assert!(REPORT_PROMPT.contains("Detailed SWOT Analysis"));
    }
}
