//! # docforge Core
//!
//! Domain types, traits, and error definitions for docforge.
//! This crate has **no framework dependencies**: it defines the document
//! model that the engine, providers, and gateway all build against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator (the LLM, the progress channel) is a trait
//! here. Implementations live in their respective crates, so tests can swap
//! in scripted stand-ins and the dependency graph points inward.

pub mod datasource;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod representation;

// Re-export key types at crate root for ergonomics
pub use datasource::DataSource;
pub use error::{Error, ProviderError, Result};
pub use event::{EventBus, ProgressEvent, ProgressKind, ProgressSink};
pub use message::{ChatTurn, Message, Role, Speaker};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use representation::{
    Representation, RepresentationKind, RepresentationSchema, RepresentationSpec,
    RepresentationStore,
};
