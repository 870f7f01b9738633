//! Bot engine: dispatches session actions to the orchestrators.
//!
//! Every action produces exactly one progress notification. Successful
//! commands and queries notify from their orchestrator; ingests and edits
//! notify here; any error is reported as a failure message instead.

use crate::command::{CommandOrchestrator, CommandOutcome};
use crate::ingest::{ChunkedIngester, FileReader, FileRef, IngestOutcome, IngestSettings, LocalFileReader};
use crate::model::ModelClient;
use crate::query::{QueryOrchestrator, QueryOutcome};
use crate::session::Session;
use crate::token::{HeuristicTokenCounter, TokenCounter};
use crate::variants::BotVariant;
use docforge_core::datasource::DataSource;
use docforge_core::error::{Error, Result};
use docforge_core::event::{ProgressEvent, ProgressSink};
use docforge_core::message::ChatTurn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// User-facing text when the model could not be reached.
pub const MODEL_UNAVAILABLE: &str = "The language model is unavailable right now. Please try again.";

/// One unit of work against a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Fold uploaded documents into the knowledge representation.
    Ingest { files: Vec<FileRef> },
    /// Change representations through the model.
    Command {
        utterance: String,
        #[serde(default)]
        history: Vec<ChatTurn>,
    },
    /// Answer from the representations without changing them.
    Query {
        utterance: String,
        #[serde(default)]
        history: Vec<ChatTurn>,
    },
    /// Overwrite one representation, bypassing the model.
    Edit { name: String, text: String },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ingest { .. } => "ingest",
            Self::Command { .. } => "command",
            Self::Query { .. } => "query",
            Self::Edit { .. } => "edit",
        }
    }
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Ingested(Vec<IngestOutcome>),
    Command(CommandOutcome),
    Query(QueryOutcome),
    Edited { name: String },
}

pub struct BotEngine {
    variant: Arc<BotVariant>,
    model: ModelClient,
    tokens: Arc<dyn TokenCounter>,
    files: Arc<dyn FileReader>,
    data_source: Option<Arc<dyn DataSource>>,
    ingest: IngestSettings,
}

impl BotEngine {
    pub fn new(variant: impl Into<Arc<BotVariant>>, model: ModelClient) -> Self {
        Self {
            variant: variant.into(),
            model,
            tokens: Arc::new(HeuristicTokenCounter),
            files: Arc::new(LocalFileReader),
            data_source: None,
            ingest: IngestSettings::default(),
        }
    }

    pub fn with_token_counter(mut self, tokens: Arc<dyn TokenCounter>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_file_reader(mut self, files: Arc<dyn FileReader>) -> Self {
        self.files = files;
        self
    }

    pub fn with_data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn with_ingest_settings(mut self, settings: IngestSettings) -> Self {
        self.ingest = settings;
        self
    }

    pub fn variant(&self) -> &BotVariant {
        &self.variant
    }

    /// Run `action` against `session`, emitting exactly one notification.
    pub async fn handle(
        &self,
        session: &Session,
        action: Action,
        sink: &dyn ProgressSink,
    ) -> Result<ActionOutcome> {
        let kind = action.kind();
        info!(session = %session.id(), bot = %self.variant.name, action = kind, "Handling action");

        let result = match action {
            Action::Command { utterance, history } => {
                let mut store = session.store().write().await;
                CommandOrchestrator::new(&self.variant, &self.model)
                    .with_data_source(self.data_source.as_deref())
                    .handle(&mut store, &utterance, &history, sink)
                    .await
                    .map(ActionOutcome::Command)
            }
            Action::Query { utterance, history } => {
                let store = session.store().read().await;
                QueryOrchestrator::new(&self.variant, &self.model)
                    .handle(&store, &utterance, &history, sink)
                    .await
                    .map(ActionOutcome::Query)
            }
            Action::Edit { name, text } => self.edit(session, name, text, sink).await,
            Action::Ingest { files } => self.ingest(session, &files, sink).await,
        };

        if let Err(e) = &result {
            error!(session = %session.id(), action = kind, error = %e, "Action failed");
            let snapshot = session.snapshot().await;
            sink.notify(ProgressEvent::output(failure_message(e), snapshot))
                .await;
        }

        result
    }

    async fn edit(
        &self,
        session: &Session,
        name: String,
        text: String,
        sink: &dyn ProgressSink,
    ) -> Result<ActionOutcome> {
        let mut store = session.store().write().await;
        store.set(&name, text)?;

        sink.notify(ProgressEvent::output(
            format!("Representation '{name}' modified"),
            store.snapshot(),
        ))
        .await;
        Ok(ActionOutcome::Edited { name })
    }

    async fn ingest(
        &self,
        session: &Session,
        files: &[FileRef],
        sink: &dyn ProgressSink,
    ) -> Result<ActionOutcome> {
        let target = self.variant.ingest.as_ref().ok_or_else(|| {
            Error::Unsupported(format!("bot '{}' does not ingest documents", self.variant.name))
        })?;
        let spec = self
            .variant
            .schema
            .get(&target.representation)
            .ok_or_else(|| Error::not_found(&target.representation))?;

        // Read everything before locking: a bad file must not half-ingest.
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            documents.push((file.name.clone(), self.files.read(file).await?));
        }

        let mut store = session.store().write().await;
        store.get(&target.representation)?;
        let ingester = ChunkedIngester::new(&self.model, self.tokens.as_ref(), &target.prompt, spec, self.ingest);

        // Digest everything, then write once: a failing file leaves no partial digests.
        let mut outcomes = Vec::with_capacity(documents.len());
        for (name, text) in &documents {
            info!(file = %name, chars = text.len(), "Ingesting document");
            outcomes.push(ingester.digest(text).await?);
        }
        ingester.append(&mut store, &outcomes)?;

        let message = match outcomes.len() {
            0 => "No documents to ingest".to_string(),
            1 => format!("Ingested 1 document into '{}'", target.representation),
            n => format!("Ingested {n} documents into '{}'", target.representation),
        };
        sink.notify(ProgressEvent::output(message, store.snapshot()))
            .await;
        Ok(ActionOutcome::Ingested(outcomes))
    }
}

fn failure_message(error: &Error) -> String {
    match error {
        Error::ModelUnavailable(_) => MODEL_UNAVAILABLE.to_string(),
        other => {
            warn!(error = %other, "Reporting failure to caller");
            format!("Unable to process the request: {other}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CollectingSink, ScriptedProvider};
    use crate::variants::{knowledge_bot, kql_expert};
    use docforge_core::error::ProviderError;
    use std::time::Duration;

    fn engine(variant: BotVariant, provider: Arc<ScriptedProvider>) -> BotEngine {
        BotEngine::new(variant, ModelClient::new(provider, "mock"))
    }

    #[tokio::test]
    async fn edit_overwrites_and_acknowledges() {
        let engine = engine(kql_expert::variant(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));
        let session = Session::new("s", engine.variant());
        let sink = CollectingSink::new();

        engine
            .handle(
                &session,
                Action::Edit {
                    name: "schema".into(),
                    text: "Logs: msg:string".into(),
                },
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(session.store().read().await.get("schema").unwrap(), "Logs: msg:string");
        assert_eq!(sink.messages(), vec!["Representation 'schema' modified"]);
    }

    #[tokio::test]
    async fn edit_of_unknown_name_fails_with_one_notification() {
        let engine = engine(kql_expert::variant(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));
        let session = Session::new("s", engine.variant());
        let sink = CollectingSink::new();
        let before = session.snapshot().await;

        let err = engine
            .handle(
                &session,
                Action::Edit {
                    name: "logic".into(),
                    text: "x".into(),
                },
                &sink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(session.snapshot().await, before);
        assert_eq!(sink.events().len(), 1);
        assert!(sink.messages()[0].contains("logic"));
    }

    #[tokio::test]
    async fn model_failure_emits_generic_message() {
        let engine = engine(
            kql_expert::variant(),
            Arc::new(ScriptedProvider::failing(ProviderError::RateLimited { retry_after_secs: 5 })),
        );
        let session = Session::new("s", engine.variant());
        let sink = CollectingSink::new();

        let result = engine
            .handle(
                &session,
                Action::Command {
                    utterance: "set db".into(),
                    history: vec![],
                },
                &sink,
            )
            .await;

        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
        assert_eq!(sink.messages(), vec![MODEL_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn each_action_emits_exactly_one_notification() {
        let provider = Arc::new(ScriptedProvider::new([
            "summary: added rule\n[Logic]\nbe brief",
            "[Response]\nhello",
            "[KB]\nfact",
        ]));
        let engine = engine(knowledge_bot::variant(), provider);
        let session = Session::new("s", engine.variant());

        let actions = vec![
            Action::Command {
                utterance: "be brief".into(),
                history: vec![],
            },
            Action::Query {
                utterance: "hi".into(),
                history: vec![],
            },
            Action::Ingest {
                files: vec![FileRef::inline("a.txt", "some fact")],
            },
            Action::Edit {
                name: "variables".into(),
                text: "total".into(),
            },
        ];

        for action in actions {
            let sink = CollectingSink::new();
            engine.handle(&session, action, &sink).await.unwrap();
            assert_eq!(sink.events().len(), 1);
        }

        let store = session.store().read().await;
        assert_eq!(store.get("logic").unwrap(), "be brief");
        assert_eq!(store.get("kb").unwrap(), "fact\n");
        assert_eq!(store.get("variables").unwrap(), "total");
    }

    #[tokio::test]
    async fn unreadable_file_ingests_nothing() {
        let engine = engine(knowledge_bot::variant(), Arc::new(ScriptedProvider::new(Vec::<String>::new())));
        let session = Session::new("s", engine.variant());
        let sink = CollectingSink::new();

        let err = engine
            .handle(
                &session,
                Action::Ingest {
                    files: vec![
                        FileRef::inline("ok.txt", "fine"),
                        FileRef {
                            name: "broken".into(),
                            content: None,
                            path: None,
                        },
                    ],
                },
                &sink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FileRead { .. }));
        assert_eq!(session.store().read().await.get("kb").unwrap(), "");
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn failure_on_second_file_discards_first_digest() {
        let provider = Arc::new(ScriptedProvider::scripted([
            Ok("[KB]\nfirst file facts".to_string()),
            Err(ProviderError::Network("connection reset".into())),
        ]));
        let engine = engine(knowledge_bot::variant(), provider.clone());
        let session = Session::new("s", engine.variant());
        session.store().write().await.set("kb", "existing").unwrap();
        let sink = CollectingSink::new();

        let err = engine
            .handle(
                &session,
                Action::Ingest {
                    files: vec![FileRef::inline("one.txt", "alpha"), FileRef::inline("two.txt", "beta")],
                },
                &sink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ModelUnavailable(ProviderError::Network(_))));
        assert_eq!(provider.calls(), 2);
        assert_eq!(session.store().read().await.get("kb").unwrap(), "existing");
        assert_eq!(sink.messages(), vec![MODEL_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn several_files_are_appended_in_one_write() {
        let provider = Arc::new(ScriptedProvider::new(["[KB]\nfrom one", "[KB]\nfrom two"]));
        let engine = engine(knowledge_bot::variant(), provider);
        let session = Session::new("s", engine.variant());
        let sink = CollectingSink::new();

        engine
            .handle(
                &session,
                Action::Ingest {
                    files: vec![FileRef::inline("one.txt", "alpha"), FileRef::inline("two.txt", "beta")],
                },
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(session.store().read().await.get("kb").unwrap(), "from one\nfrom two\n");
        assert_eq!(sink.messages(), vec!["Ingested 2 documents into 'kb'"]);
    }

    #[tokio::test(start_paused = true)]
    async fn query_waits_for_running_command() {
        let provider = Arc::new(
            ScriptedProvider::new(["summary: s\n[Logic]\nnew rule", "[Response]\nok"])
                .with_delay(Duration::from_secs(1)),
        );
        let engine = Arc::new(engine(knowledge_bot::variant(), provider.clone()));
        let session = Arc::new(Session::new("s", engine.variant()));

        let command = {
            let (engine, session) = (engine.clone(), session.clone());
            tokio::spawn(async move {
                let sink = CollectingSink::new();
                engine
                    .handle(
                        &session,
                        Action::Command {
                            utterance: "add rule".into(),
                            history: vec![],
                        },
                        &sink,
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;

        let sink = CollectingSink::new();
        engine
            .handle(
                &session,
                Action::Query {
                    utterance: "rules?".into(),
                    history: vec![],
                },
                &sink,
            )
            .await
            .unwrap();
        command.await.unwrap().unwrap();

        // The query's prompt was built after the command released the lock.
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].messages[1].content.contains("new rule"));
        assert_eq!(sink.events()[0].representations[1].text, "new rule");
    }

    #[test]
    fn action_wire_format() {
        let action: Action =
            serde_json::from_str(r#"{"kind":"edit","name":"kb","text":"x"}"#).unwrap();
        assert_eq!(action.kind(), "edit");
        let action: Action = serde_json::from_str(r#"{"kind":"query","utterance":"hi"}"#).unwrap();
        assert!(matches!(action, Action::Query { ref history, .. } if history.is_empty()));
    }
}
