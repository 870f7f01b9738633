//! LLM provider and data source implementations for docforge.
//!
//! All providers implement the `docforge_core::Provider` trait.
//! The router selects the correct provider based on configuration.
//! [`KustoSchemaSource`] implements `docforge_core::DataSource` for the
//! KQL expert bot's schema refresh.

pub mod kusto;
pub mod openai_compat;
pub mod router;

pub use kusto::KustoSchemaSource;
pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
