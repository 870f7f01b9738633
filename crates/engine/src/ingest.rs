//! Chunked ingestion: folds oversized documents into a knowledge
//! representation under a token budget.
//!
//! While the remaining text is over budget, a fixed number of characters is
//! cut off the front and summarized. Whatever is left afterwards is
//! summarized once more. The cursor always advances, so the loop ends.
//! Each digest ends with a newline and digests are concatenated as they are,
//! so the appended text is exactly as long as the digests together. Callers
//! digest every document first and append once: a model failure halfway
//! leaves the representation untouched.

use crate::model::ModelClient;
use crate::parser::SectionParser;
use crate::prompt::{PromptContext, PromptTemplate};
use crate::token::TokenCounter;
use async_trait::async_trait;
use docforge_config::IngestConfig;
use docforge_core::error::{Error, Result};
use docforge_core::representation::{RepresentationSpec, RepresentationStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Budget settings for one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Remaining text above this many tokens is cut into chunks.
    pub token_budget: usize,
    /// Characters per chunk.
    pub chunk_chars: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            token_budget: 3000,
            chunk_chars: 10_000,
        }
    }
}

impl From<&IngestConfig> for IngestSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            token_budget: config.token_budget,
            chunk_chars: config.chunk_chars,
        }
    }
}

/// Digests produced for one document, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub representation: String,
    /// One entry per model call, in document order.
    pub digests: Vec<String>,
    /// The digests concatenated, exactly as they are appended.
    pub appended: String,
}

impl IngestOutcome {
    pub fn model_calls(&self) -> usize {
        self.digests.len()
    }
}

pub struct ChunkedIngester<'a> {
    model: &'a ModelClient,
    tokens: &'a dyn TokenCounter,
    prompt: &'a PromptTemplate,
    target: &'a RepresentationSpec,
    settings: IngestSettings,
}

impl<'a> ChunkedIngester<'a> {
    pub fn new(
        model: &'a ModelClient,
        tokens: &'a dyn TokenCounter,
        prompt: &'a PromptTemplate,
        target: &'a RepresentationSpec,
        settings: IngestSettings,
    ) -> Self {
        Self {
            model,
            tokens,
            prompt,
            target,
            settings,
        }
    }

    /// Summarize `document` and append the digests to the target representation.
    pub async fn ingest(&self, store: &mut RepresentationStore, document: &str) -> Result<IngestOutcome> {
        // Fail before spending model calls on an unknown target.
        store.get(&self.target.name)?;
        let outcome = self.digest(document).await?;
        self.append(store, std::slice::from_ref(&outcome))?;
        Ok(outcome)
    }

    /// Summarize `document` chunk by chunk without touching any store.
    pub async fn digest(&self, document: &str) -> Result<IngestOutcome> {
        let parser = SectionParser::for_representation(self.target);
        let chunk_chars = self.settings.chunk_chars.max(1);
        let mut remaining = document;
        let mut digests = Vec::new();

        while !remaining.is_empty() && self.tokens.count(remaining) > self.settings.token_budget {
            let split = remaining
                .char_indices()
                .nth(chunk_chars)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
            let (chunk, rest) = remaining.split_at(split);
            remaining = rest;

            debug!(chunk = digests.len() + 1, chars = chunk_chars, "Summarizing chunk");
            digests.push(self.summarize(&parser, chunk).await?);
        }

        if !remaining.trim().is_empty() {
            digests.push(self.summarize(&parser, remaining).await?);
        }

        let appended = digests.concat();
        debug!(
            representation = %self.target.name,
            model_calls = digests.len(),
            chars = appended.len(),
            "Document digested"
        );

        Ok(IngestOutcome {
            representation: self.target.name.clone(),
            digests,
            appended,
        })
    }

    /// Append every outcome's digests to the target in a single write.
    pub fn append(&self, store: &mut RepresentationStore, outcomes: &[IngestOutcome]) -> Result<()> {
        let text: String = outcomes.iter().map(|o| o.appended.as_str()).collect();
        if !text.is_empty() {
            store.append(&self.target.name, &text)?;
        }

        info!(
            representation = %self.target.name,
            documents = outcomes.len(),
            chars = text.len(),
            "Digests appended"
        );
        Ok(())
    }

    /// A digest is the parsed body plus a line terminator, or empty.
    async fn summarize(&self, parser: &SectionParser, chunk: &str) -> Result<String> {
        let context = PromptContext::new().with("document", chunk);
        let raw = self.model.complete(self.prompt, &context).await?;

        let parsed = parser.parse(&raw)?;
        let body = parsed.get(&self.target.name).map(str::trim).unwrap_or_default();
        Ok(if body.is_empty() {
            String::new()
        } else {
            format!("{body}\n")
        })
    }
}

/// An uploaded file: either inline text or a path the server can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileRef {
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Some(content.into()),
            path: None,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            content: None,
            path: Some(path),
        }
    }
}

/// Turns an uploaded file reference into plain text.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, file: &FileRef) -> Result<String>;
}

/// Reads inline content, or the file at `path` as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileReader;

#[async_trait]
impl FileReader for LocalFileReader {
    async fn read(&self, file: &FileRef) -> Result<String> {
        if let Some(content) = &file.content {
            return Ok(content.clone());
        }

        let path = file.path.as_ref().ok_or_else(|| Error::FileRead {
            name: file.name.clone(),
            reason: "neither content nor path given".into(),
        })?;

        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::FileRead {
                name: file.name.clone(),
                reason: e.to_string(),
            })
    }
}
