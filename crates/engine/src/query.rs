//! Query orchestrator: answers a question from the current documents.
//!
//! Takes the store by shared reference: a query can read every
//! representation but cannot change any. Response-scoped state the model
//! reports (for example variable values) is handed back to the caller.

use crate::model::ModelClient;
use crate::parser::SectionParser;
use crate::prompt::PromptContext;
use crate::variants::BotVariant;
use docforge_core::error::Result;
use docforge_core::event::{ProgressEvent, ProgressSink};
use docforge_core::message::ChatTurn;
use docforge_core::representation::RepresentationStore;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub response: String,
    /// Body of the variant's ephemeral section, if the model produced one.
    pub ephemeral: Option<String>,
}

pub struct QueryOrchestrator<'a> {
    variant: &'a BotVariant,
    model: &'a ModelClient,
    parser: SectionParser,
}

impl<'a> QueryOrchestrator<'a> {
    pub fn new(variant: &'a BotVariant, model: &'a ModelClient) -> Self {
        Self {
            variant,
            model,
            parser: SectionParser::for_query(variant.ephemeral_label.as_deref()),
        }
    }

    pub async fn handle(
        &self,
        store: &RepresentationStore,
        utterance: &str,
        history: &[ChatTurn],
        sink: &dyn ProgressSink,
    ) -> Result<QueryOutcome> {
        let context = PromptContext::from_store(&self.variant.schema, store)
            .with_user_input(utterance)
            .with_history(history);

        let raw = self.model.complete(&self.variant.query_prompt, &context).await?;
        let parsed = self.parser.parse_query(&raw);

        debug!(
            bot = %self.variant.name,
            chars = parsed.response.len(),
            ephemeral = parsed.ephemeral.is_some(),
            "Query answered"
        );

        sink.notify(ProgressEvent::output(parsed.response.clone(), store.snapshot()))
            .await;

        Ok(QueryOutcome {
            response: parsed.response,
            ephemeral: parsed.ephemeral,
        })
    }
}
