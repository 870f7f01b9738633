//! The docforge document engine.
//!
//! A session owns a small set of named documents ("representations"). Each
//! inbound action is one of:
//!
//! 1. **Command**: an instruction goes to the model, named sections are
//!    parsed out of the reply and written back
//! 2. **Query**: the model answers from the current documents, which stay
//!    untouched
//! 3. **Ingest**: an uploaded document is summarized chunk by chunk into the
//!    knowledge representation
//! 4. **Edit**: one representation is overwritten directly
//!
//! Every action ends in exactly one progress notification.

pub mod command;
pub mod engine;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod query;
pub mod session;
pub mod token;
pub mod variants;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandOrchestrator, CommandOutcome};
pub use engine::{Action, ActionOutcome, BotEngine};
pub use ingest::{ChunkedIngester, FileReader, FileRef, IngestOutcome, IngestSettings, LocalFileReader};
pub use model::ModelClient;
pub use parser::{BoundaryMarker, ParsedCommandResult, QueryParse, Section, SectionParser};
pub use prompt::{PromptContext, PromptTemplate};
pub use query::{QueryOrchestrator, QueryOutcome};
pub use session::{Session, SessionRegistry};
pub use token::{HeuristicTokenCounter, TokenCounter, estimate_tokens};
pub use variants::BotVariant;
