//! Knowledge bot: answers from a knowledge base under a rule set.
//!
//! `kb` holds facts (ingested documents land here), `logic` the rules the
//! bot follows, `variables` the variables it tracks in conversation and
//! `variable_values` their defaults. During a query the model reports the
//! current values in a `[Variable_values]` section, which goes back to the
//! caller rather than into the store.

use super::{BotVariant, IngestTarget};
use crate::prompt::PromptTemplate;
use docforge_core::representation::{RepresentationSchema, RepresentationSpec};

pub const NAME: &str = "knowledge_bot";

const SYSTEM: &str = "\
You maintain a chatbot defined by four sections:
[KB] the knowledge base, facts the bot may use.
[Logic] rules describing how the bot behaves.
[Variables] variables the bot tracks during a conversation, one per line.
[Variable_values] the current value of each variable, one `name = value` per line.

When returning updated sections, merge the user's input into the current contents. Remove \
existing content only when the user explicitly asks for it.";

const COMMAND: &str = "\
The user gave an instruction to change the chatbot. Decide which sections it affects and \
rewrite only those.

[KB]
{KB}

[Logic]
{LOGIC}

[Variables]
{VARIABLES}

[Variable_values]
{VARIABLE_VALUES}

Instruction: {user_input}

Reply with a one-line summary followed by each changed section in full. Leave out sections \
that do not change:

summary: <one-line summary of what changed>

[KB]
<knowledge base>

[Logic]
<rules>

[Variables]
<variables>

[Variable_values]
<values>";

const QUERY: &str = "\
Act as the chatbot defined below and reply to the user.

[KB]
{KB}

[Logic]
{LOGIC}

[Variables]
{VARIABLES}

[Variable_values]
{VARIABLE_VALUES}

Conversation so far ('User:' and 'Bot:' prefixes):
{chat_history}

The user's latest message: {user_input}

Use only facts from [KB] and follow [Logic]. Then report each variable's value after this \
turn. Reply in this format:

[Response]
<your reply>

[Variable_values]
<name = value per line>";

const INGEST: &str = "\
Summarize the document below into concise facts for a knowledge base. Keep names, numbers \
and definitions. Drop formatting and repetition.

Document:
{document}

Reply in this format:

[KB]
<facts>";

pub fn schema() -> RepresentationSchema {
    RepresentationSchema::new()
        .with(RepresentationSpec::markdown("kb").with_label("KB"))
        .with(RepresentationSpec::markdown("logic").with_label("Logic"))
        .with(RepresentationSpec::markdown("variables").with_label("Variables"))
        .with(RepresentationSpec::markdown("variable_values").with_label("Variable_values"))
}

pub fn variant() -> BotVariant {
    BotVariant {
        name: NAME.into(),
        description: "Answers questions from a knowledge base, following a rule set".into(),
        schema: schema(),
        command_prompt: PromptTemplate::new(SYSTEM, COMMAND),
        query_prompt: PromptTemplate::new(SYSTEM, QUERY),
        ingest: Some(IngestTarget {
            representation: "kb".into(),
            prompt: PromptTemplate::new(SYSTEM, INGEST),
        }),
        ephemeral_label: Some("Variable_values".into()),
        refresh: None,
    }
}
