//! Bot variants.
//!
//! A variant is everything that differs between bots built on the same
//! engine: the representation schema, the prompt templates, where ingested
//! documents go, the ephemeral query section and the optional derived
//! refresh. The orchestrators themselves are shared.

pub mod knowledge_bot;
pub mod kql_expert;

use crate::prompt::PromptTemplate;
use docforge_core::representation::RepresentationSchema;

/// Where chunked ingestion folds documents, and how it asks for a digest.
#[derive(Debug, Clone)]
pub struct IngestTarget {
    /// Representation the digests are appended to.
    pub representation: String,
    /// Prompt for one chunk; the chunk text is `{document}`.
    pub prompt: PromptTemplate,
}

/// A derived representation refreshed from an external data source once a
/// JSON configuration representation is complete.
#[derive(Debug, Clone)]
pub struct DerivedRefresh {
    /// JSON representation holding the connection settings.
    pub source: String,
    /// Representation overwritten with the fetched text.
    pub target: String,
    /// Keys that must all be present and non-empty in `source`.
    pub required_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BotVariant {
    pub name: String,
    pub description: String,
    pub schema: RepresentationSchema,
    pub command_prompt: PromptTemplate,
    pub query_prompt: PromptTemplate,
    pub ingest: Option<IngestTarget>,
    /// Section label for response-scoped state in query output.
    pub ephemeral_label: Option<String>,
    pub refresh: Option<DerivedRefresh>,
}

/// Names of the built-in variants.
pub const BUILTIN: [&str; 2] = [kql_expert::NAME, knowledge_bot::NAME];

/// Look up a built-in variant by name.
pub fn by_name(name: &str) -> Option<BotVariant> {
    match name {
        kql_expert::NAME => Some(kql_expert::variant()),
        knowledge_bot::NAME => Some(knowledge_bot::variant()),
        _ => None,
    }
}
