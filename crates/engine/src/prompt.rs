//! Prompt templates with named `{PLACEHOLDER}` expansion.
//!
//! Templates are plain text. A placeholder is `{` + identifier + `}` where
//! the identifier is made of ASCII letters, digits and `_`. Only names
//! present in the [`PromptContext`] are substituted; any other brace text
//! (JSON skeletons in the instructions, for instance) is left as written.
//! Substituted values are never re-scanned.

use docforge_core::message::ChatTurn;
use docforge_core::representation::{RepresentationSchema, RepresentationStore};
use std::collections::BTreeMap;

/// A system/user prompt pair for one kind of model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Named values available to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    values: BTreeMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose every declared representation under its upper-cased section
    /// label (`schema` labelled `SCHEMA` becomes `{SCHEMA}`, `kb` labelled
    /// `KB` becomes `{KB}`, `variable_values` becomes `{VARIABLE_VALUES}`).
    pub fn from_store(schema: &RepresentationSchema, store: &RepresentationStore) -> Self {
        let mut context = Self::new();
        for spec in schema.specs() {
            if let Ok(text) = store.get(&spec.name) {
                context.insert(spec.label.to_uppercase(), text);
            }
        }
        context
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds `{user_input}`.
    pub fn with_user_input(self, utterance: &str) -> Self {
        self.with("user_input", utterance)
    }

    /// Adds `{chat_history}` as `User: ...` / `Bot: ...` lines.
    pub fn with_history(self, history: &[ChatTurn]) -> Self {
        self.with("chat_history", ChatTurn::transcript(history))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Expand `{NAME}` placeholders in `template` from `context`.
pub fn render(template: &str, context: &PromptContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let ident_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let ident = &after[..ident_len];

        match (ident.is_empty(), after[ident_len..].starts_with('}')) {
            (false, true) => match context.get(ident) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[ident_len + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::representation::RepresentationSpec;

    #[test]
    fn substitutes_known_names() {
        let ctx = PromptContext::new().with("CONFIG", "{}").with_user_input("hi");
        assert_eq!(
            render("[CONFIG]\n{CONFIG}\nThe user said: {user_input}", &ctx),
            "[CONFIG]\n{}\nThe user said: hi"
        );
    }

    #[test]
    fn leaves_unknown_and_json_braces_alone() {
        let ctx = PromptContext::new().with("A", "x");
        assert_eq!(
            render(r#"{"KEY":""} {B} {A}{ {} {A"#, &ctx),
            r#"{"KEY":""} {B} x{ {} {A"#
        );
    }

    #[test]
    fn values_are_not_rescanned() {
        let ctx = PromptContext::new().with("A", "{B}").with("B", "boom");
        assert_eq!(render("{A}", &ctx), "{B}");
    }

    #[test]
    fn context_from_store_uses_upper_labels() {
        let schema = RepresentationSchema::new()
            .with(RepresentationSpec::markdown("kb").with_label("KB"))
            .with(RepresentationSpec::markdown("variable_values").with_label("Variable_values"));
        let mut store = RepresentationStore::from_schema(&schema);
        store.set("kb", "facts").unwrap();

        let ctx = PromptContext::from_store(&schema, &store);
        assert_eq!(ctx.get("KB"), Some("facts"));
        assert_eq!(ctx.get("VARIABLE_VALUES"), Some(""));
    }

    #[test]
    fn history_is_rendered_as_transcript() {
        let ctx = PromptContext::new().with_history(&[ChatTurn::user("q"), ChatTurn::bot("a")]);
        assert_eq!(ctx.get("chat_history"), Some("User: q\nBot: a"));
    }
}
