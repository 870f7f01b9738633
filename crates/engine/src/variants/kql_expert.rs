//! KQL expert: answers Kusto questions from table schemas.
//!
//! Representations: `schema` (markdown, one table per line) and `config`
//! (single-line JSON with the cluster connection settings). Once every
//! connection setting is filled in, `schema` is re-read from the cluster.

use super::{BotVariant, DerivedRefresh, IngestTarget};
use crate::prompt::PromptTemplate;
use docforge_core::representation::{RepresentationSchema, RepresentationSpec};

pub const NAME: &str = "kql_expert";

pub const CONFIG_KEYS: [&str; 5] = [
    "KUSTO_CLUSTER_URL",
    "KUSTO_DATABASE_NAME",
    "SERVICE_CLIENT_ID",
    "SERVICE_CLIENT_SECRET",
    "TENANT_ID",
];

const INITIAL_CONFIG: &str = r#"{"KUSTO_CLUSTER_URL":"","KUSTO_DATABASE_NAME":"","SERVICE_CLIENT_ID":"","SERVICE_CLIENT_SECRET":"","TENANT_ID":""}"#;

const SYSTEM: &str = "\
You are a KQL expert. You write Kusto queries against the table schemas held in [SCHEMA] \
and you can show the connection settings held in [CONFIG].

[SCHEMA] lists one table per line as `TableName: column:type, ...`. Table names are distinct.

[CONFIG] is a JSON object with exactly these keys: KUSTO_CLUSTER_URL, KUSTO_DATABASE_NAME, \
SERVICE_CLIENT_ID, SERVICE_CLIENT_SECRET, TENANT_ID. Never add other keys.

When returning updated values, merge what the user said into the current values. Drop \
existing information only when the user explicitly asks for it.";

const COMMAND: &str = "\
The user gave an instruction that may change the bot's configuration.

If the instruction sets the cluster url, the database name, the service client id, the \
service client secret or the tenant id, update the matching key of [CONFIG]. Never invent a \
value the user did not give.

If the instruction asks for anything else, change nothing and say in the summary which kinds \
of instructions you can handle.

Current [CONFIG]:
{CONFIG}

Instruction: {user_input}

Write the whole JSON on a single line. Reply in exactly this format:

summary: <one-line summary of what changed>

[CONFIG]
<updated config>";

const QUERY: &str = "\
The user is chatting with the KQL expert bot.

[SCHEMA]
{SCHEMA}

[CONFIG]
{CONFIG}

Conversation so far ('User:' and 'Bot:' prefixes):
{chat_history}

The user's latest message: {user_input}

Answer using only the tables in [SCHEMA]. If the request cannot be served from those tables, \
say so and describe what you can help with. If the user asks to see the configuration, show \
[CONFIG] with SERVICE_CLIENT_SECRET masked.

Always reply in this format:

[Response]
<your reply>";

const INGEST: &str = "\
Extract every Kusto table definition from the document below. Write one table per line as \
`TableName: column:type, column:type`. Ignore everything that is not a table definition.

Document:
{document}

Reply in this format:

[SCHEMA]
<tables>";

pub fn schema() -> RepresentationSchema {
    RepresentationSchema::new()
        .with(RepresentationSpec::markdown("schema").with_label("SCHEMA"))
        .with(
            RepresentationSpec::json("config", INITIAL_CONFIG)
                .with_label("CONFIG")
                .with_specific_token("KUSTO_CLUSTER_URL"),
        )
}

pub fn variant() -> BotVariant {
    BotVariant {
        name: NAME.into(),
        description: "Writes KQL queries against the tables of a Kusto database".into(),
        schema: schema(),
        command_prompt: PromptTemplate::new(SYSTEM, COMMAND),
        query_prompt: PromptTemplate::new(SYSTEM, QUERY),
        ingest: Some(IngestTarget {
            representation: "schema".into(),
            prompt: PromptTemplate::new(SYSTEM, INGEST),
        }),
        ephemeral_label: None,
        refresh: Some(DerivedRefresh {
            source: "config".into(),
            target: "schema".into(),
            required_keys: CONFIG_KEYS.iter().map(|k| k.to_string()).collect(),
        }),
    }
}
