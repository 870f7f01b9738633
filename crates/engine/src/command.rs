//! Command orchestrator: one instruction, one bounded set of document updates.
//!
//! Pipeline:
//! 1. Snapshot every representation into the prompt context
//! 2. Ask the model for the updated sections
//! 3. Parse the sections out of the raw reply
//! 4. Write each returned section; untouched names keep their text
//! 5. Refresh a derived representation from a data source (best effort)
//! 6. Emit one progress notification with the summary
//!
//! The caller holds the session's write lock for the whole call. Writes
//! already applied stay applied if a later step fails.

use crate::model::ModelClient;
use crate::parser::{ParsedCommandResult, SectionParser};
use crate::prompt::PromptContext;
use crate::variants::{BotVariant, DerivedRefresh};
use docforge_core::datasource::DataSource;
use docforge_core::error::{Error, Result};
use docforge_core::event::{ProgressEvent, ProgressSink};
use docforge_core::message::ChatTurn;
use docforge_core::representation::{RepresentationKind, RepresentationSpec, RepresentationStore};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const NO_CHANGES: &str = "no changes";
pub const UNPARSEABLE: &str = "unable to parse model response";

/// What one command did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub summary: String,
    /// Representation name to the text now stored.
    pub applied: BTreeMap<String, String>,
}

pub struct CommandOrchestrator<'a> {
    variant: &'a BotVariant,
    model: &'a ModelClient,
    data_source: Option<&'a dyn DataSource>,
    parser: SectionParser,
}

impl<'a> CommandOrchestrator<'a> {
    pub fn new(variant: &'a BotVariant, model: &'a ModelClient) -> Self {
        Self {
            variant,
            model,
            data_source: None,
            parser: SectionParser::for_schema(&variant.schema),
        }
    }

    pub fn with_data_source(mut self, data_source: Option<&'a dyn DataSource>) -> Self {
        self.data_source = data_source;
        self
    }

    pub async fn handle(
        &self,
        store: &mut RepresentationStore,
        utterance: &str,
        history: &[ChatTurn],
        sink: &dyn ProgressSink,
    ) -> Result<CommandOutcome> {
        let context = PromptContext::from_store(&self.variant.schema, store)
            .with_user_input(utterance)
            .with_history(history);

        let raw = self.model.complete(&self.variant.command_prompt, &context).await?;

        let parsed = match self.parser.parse(&raw) {
            Ok(parsed) => parsed,
            Err(Error::MalformedModelOutput(reason)) => {
                warn!(bot = %self.variant.name, %reason, "Model reply had no recognisable sections");
                sink.notify(ProgressEvent::output(UNPARSEABLE, store.snapshot()))
                    .await;
                return Ok(CommandOutcome {
                    summary: UNPARSEABLE.into(),
                    applied: BTreeMap::new(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut applied = self.apply(store, &parsed)?;

        if let Some(refresh) = &self.variant.refresh
            && applied.contains_key(&refresh.source)
        {
            if let Some(text) = self.refresh(store, refresh).await {
                store.set(&refresh.target, text.clone())?;
                applied.insert(refresh.target.clone(), text);
            }
        }

        let summary = parsed.summary.unwrap_or_else(|| NO_CHANGES.to_string());
        info!(
            bot = %self.variant.name,
            changed = ?applied.keys().collect::<Vec<_>>(),
            summary = %summary,
            "Command applied"
        );

        sink.notify(ProgressEvent::output(summary.clone(), store.snapshot()))
            .await;

        Ok(CommandOutcome { summary, applied })
    }

    fn apply(
        &self,
        store: &mut RepresentationStore,
        parsed: &ParsedCommandResult,
    ) -> Result<BTreeMap<String, String>> {
        let mut applied = BTreeMap::new();

        for section in &parsed.sections {
            let Some(spec) = self.variant.schema.get(&section.name) else {
                continue;
            };

            if let Err(e) = validate(spec, &section.body) {
                warn!(error = %e, "Keeping previous value");
                continue;
            }

            store.set(&section.name, section.body.clone())?;
            applied.insert(section.name.clone(), section.body.clone());
        }

        Ok(applied)
    }

    /// Fetch fresh text for the derived representation. `None` when the
    /// configuration is incomplete, the source fails, or it returns nothing.
    async fn refresh(&self, store: &RepresentationStore, refresh: &DerivedRefresh) -> Option<String> {
        let source = self.data_source?;
        let config = complete_config(store.get(&refresh.source).ok()?, &refresh.required_keys)?;

        let timeout = self.model.timeout().max(Duration::from_secs(1));
        match tokio::time::timeout(timeout, source.refresh(&config)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                info!(source = source.name(), target = %refresh.target, "Derived representation refreshed");
                Some(text)
            }
            Ok(Ok(_)) => {
                debug!(source = source.name(), "Data source returned nothing");
                None
            }
            Ok(Err(e)) => {
                warn!(source = source.name(), error = %e, "Derived refresh failed");
                None
            }
            Err(_) => {
                warn!(source = source.name(), timeout = ?timeout, "Derived refresh timed out");
                None
            }
        }
    }
}

/// JSON representations only accept bodies that parse as JSON.
fn validate(spec: &RepresentationSpec, body: &str) -> Result<()> {
    if spec.kind != RepresentationKind::Json || body.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(body)
        .map(|_| ())
        .map_err(|e| Error::InvalidRepresentation {
            name: spec.name.clone(),
            reason: e.to_string(),
        })
}

/// The JSON object in `text` if every required key holds a non-empty string.
fn complete_config(
    text: &str,
    required: &[String],
) -> Option<serde_json::Map<String, serde_json::Value>> {
    let serde_json::Value::Object(map) = serde_json::from_str(text).ok()? else {
        return None;
    };
    let complete = required.iter().all(|key| {
        map.get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|v| !v.trim().is_empty())
    });
    complete.then_some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CollectingSink, ScriptedProvider};
    use crate::variants::{knowledge_bot, kql_expert};
    use async_trait::async_trait;
    use docforge_core::error::ProviderError;
    use std::sync::{Arc, Mutex};

    const FULL_CONFIG: &str = r#"{"KUSTO_CLUSTER_URL":"https://c","KUSTO_DATABASE_NAME":"db","SERVICE_CLIENT_ID":"id","SERVICE_CLIENT_SECRET":"s","TENANT_ID":"t"}"#;

    struct FakeSource {
        result: std::result::Result<String, String>,
        calls: Mutex<usize>,
    }

    impl FakeSource {
        fn ok(text: &str) -> Self {
            Self {
                result: Ok(text.into()),
                calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err("cluster unreachable".into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn refresh(&self, _config: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.result.clone().map_err(Error::DataSource)
        }
    }

    fn client(provider: Arc<ScriptedProvider>) -> ModelClient {
        ModelClient::new(provider, "mock")
    }

    #[tokio::test]
    async fn sets_config_and_returns_summary() {
        let variant = kql_expert::variant();
        let provider = Arc::new(ScriptedProvider::text(
            "summary: set cluster url\n[CONFIG]\n{\"KUSTO_CLUSTER_URL\":\"https://x\"}",
        ));
        let model = client(provider.clone());
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);

        let outcome = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "set cluster url to https://x", &[], &sink)
            .await
            .unwrap();

        assert_eq!(outcome.summary, "set cluster url");
        assert_eq!(store.get("config").unwrap(), "{\"KUSTO_CLUSTER_URL\":\"https://x\"}");
        assert_eq!(sink.messages(), vec!["set cluster url"]);
        assert!(
            provider.last_request().unwrap().messages[1]
                .content
                .contains("set cluster url to https://x")
        );
    }

    #[tokio::test]
    async fn omitted_section_is_never_cleared() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::text(
            "summary: updated config\n[CONFIG]\n{\"KUSTO_CLUSTER_URL\":\"\"}",
        )));
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);
        store.set("schema", "X").unwrap();

        let outcome = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "anything", &[], &sink)
            .await
            .unwrap();

        assert_eq!(store.get("schema").unwrap(), "X");
        assert!(!outcome.applied.contains_key("schema"));
    }

    #[tokio::test]
    async fn summary_only_reply_is_noop() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::text("summary: nothing to do")));
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);
        let before = store.snapshot();

        let outcome = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "hello", &[], &sink)
            .await
            .unwrap();

        assert_eq!(store.snapshot(), before);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.summary, "nothing to do");
    }

    #[tokio::test]
    async fn missing_summary_defaults_to_no_changes() {
        let variant = knowledge_bot::variant();
        let model = client(Arc::new(ScriptedProvider::text("[Logic]\nbe polite")));
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);

        let outcome = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "be polite", &[], &sink)
            .await
            .unwrap();

        assert_eq!(outcome.summary, NO_CHANGES);
        assert_eq!(store.get("logic").unwrap(), "be polite");
    }

    #[tokio::test]
    async fn unparseable_reply_is_recovered_as_noop() {
        let variant = knowledge_bot::variant();
        let model = client(Arc::new(ScriptedProvider::text("Sure! What would you like?")));
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);
        store.set("kb", "facts").unwrap();
        let before = store.snapshot();

        let outcome = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "??", &[], &sink)
            .await
            .unwrap();

        assert_eq!(outcome.summary, UNPARSEABLE);
        assert_eq!(store.snapshot(), before);
        assert_eq!(sink.messages(), vec![UNPARSEABLE]);
    }

    #[tokio::test]
    async fn invalid_json_section_is_skipped() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::text(
            "summary: s\n[SCHEMA]\nT: a:int\n[CONFIG]\nKUSTO_CLUSTER_URL is https://x",
        )));
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);
        let config_before = store.get("config").unwrap().to_string();

        let outcome = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "x", &[], &sink)
            .await
            .unwrap();

        assert_eq!(store.get("config").unwrap(), config_before);
        assert_eq!(store.get("schema").unwrap(), "T: a:int");
        assert_eq!(outcome.applied.len(), 1);
    }

    #[tokio::test]
    async fn model_failure_mutates_nothing_and_emits_nothing() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::failing(ProviderError::Network("down".into()))));
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);
        let before = store.snapshot();

        let err = CommandOrchestrator::new(&variant, &model)
            .handle(&mut store, "x", &[], &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ModelUnavailable(_)));
        assert_eq!(store.snapshot(), before);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn complete_config_triggers_refresh() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::text(&format!(
            "summary: set everything\n[CONFIG]\n{FULL_CONFIG}"
        ))));
        let source = FakeSource::ok("Events: ts:datetime");
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);

        let outcome = CommandOrchestrator::new(&variant, &model)
            .with_data_source(Some(&source))
            .handle(&mut store, "x", &[], &sink)
            .await
            .unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(store.get("schema").unwrap(), "Events: ts:datetime");
        assert!(outcome.applied.contains_key("schema"));
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn incomplete_config_skips_refresh() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::text(
            "summary: s\n[CONFIG]\n{\"KUSTO_CLUSTER_URL\":\"https://c\",\"KUSTO_DATABASE_NAME\":\"\"}",
        )));
        let source = FakeSource::ok("tables");
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);

        CommandOrchestrator::new(&variant, &model)
            .with_data_source(Some(&source))
            .handle(&mut store, "x", &[], &sink)
            .await
            .unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(store.get("schema").unwrap(), "");
    }

    #[tokio::test]
    async fn refresh_failure_is_swallowed() {
        let variant = kql_expert::variant();
        let model = client(Arc::new(ScriptedProvider::text(&format!(
            "summary: set everything\n[CONFIG]\n{FULL_CONFIG}"
        ))));
        let source = FakeSource::failing();
        let sink = CollectingSink::new();
        let mut store = RepresentationStore::from_schema(&variant.schema);
        store.set("schema", "old").unwrap();

        let outcome = CommandOrchestrator::new(&variant, &model)
            .with_data_source(Some(&source))
            .handle(&mut store, "x", &[], &sink)
            .await
            .unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(outcome.summary, "set everything");
        assert_eq!(store.get("schema").unwrap(), "old");
        assert_eq!(store.get("config").unwrap(), FULL_CONFIG);
    }

    #[test]
    fn complete_config_checks_every_key() {
        let keys: Vec<String> = kql_expert::CONFIG_KEYS.iter().map(|k| k.to_string()).collect();
        assert!(complete_config(FULL_CONFIG, &keys).is_some());
        assert!(complete_config(r#"{"KUSTO_CLUSTER_URL":"x"}"#, &keys).is_none());
        assert!(complete_config("not json", &keys).is_none());
        assert!(complete_config("[1,2]", &keys).is_none());
    }
}
