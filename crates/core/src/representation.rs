//! Representations: the named text documents a session evolves.
//!
//! A [`RepresentationSchema`] fixes which documents exist for a bot variant,
//! what they start as, and how their sections are labelled in model output.
//! A [`RepresentationStore`] owns the live text for one session. Mutation
//! always replaces a document's text wholesale; nothing is ever deleted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// The format of a representation's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationKind {
    #[serde(rename = "md", alias = "markdown")]
    Markdown,
    #[serde(rename = "json")]
    Json,
}

/// One named document and its current text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub name: String,
    pub text: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: RepresentationKind,
}

/// Declaration of a single representation within a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentationSpec {
    /// Identity of the representation within a session.
    pub name: String,
    pub kind: RepresentationKind,
    /// Text the representation holds right after session start.
    pub initial: String,
    /// Section label the model uses for this document, matched as `[LABEL]`
    /// or `LABEL:`. Case-sensitive.
    pub label: String,
    /// Tokens that only ever appear inside the real section body. A line
    /// carrying one of them starts the body, overriding an earlier generic
    /// `[LABEL]` marker.
    pub specific_tokens: Vec<String>,
}

impl RepresentationSpec {
    /// A markdown document that starts empty, labelled by its own name.
    pub fn markdown(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind: RepresentationKind::Markdown,
            initial: String::new(),
            specific_tokens: Vec::new(),
        }
    }

    /// A JSON document with the given initial skeleton.
    pub fn json(name: impl Into<String>, initial: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind: RepresentationKind::Json,
            initial: initial.into(),
            specific_tokens: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_specific_token(mut self, token: impl Into<String>) -> Self {
        self.specific_tokens.push(token.into());
        self
    }

    /// The representation as it exists at session start.
    pub fn initial_representation(&self) -> Representation {
        Representation {
            name: self.name.clone(),
            text: self.initial.clone(),
            kind: self.kind,
        }
    }
}

/// Ordered set of representation declarations for one bot variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepresentationSchema {
    specs: Vec<RepresentationSpec>,
}

impl RepresentationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. A later declaration with the same name replaces
    /// the earlier one in place.
    pub fn with(mut self, spec: RepresentationSpec) -> Self {
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&RepresentationSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn specs(&self) -> &[RepresentationSpec] {
        &self.specs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// The live documents of one session.
///
/// No internal locking: the session layer serializes access.
#[derive(Debug, Clone, Default)]
pub struct RepresentationStore {
    entries: Vec<Representation>,
}

impl RepresentationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding every declared representation at its initial value.
    pub fn from_schema(schema: &RepresentationSchema) -> Self {
        let mut store = Self::new();
        store.initialize(schema);
        store
    }

    /// Populate every name declared by `schema` with its initial value.
    /// Anything previously held is discarded.
    pub fn initialize(&mut self, schema: &RepresentationSchema) {
        self.entries = schema
            .specs()
            .iter()
            .map(RepresentationSpec::initial_representation)
            .collect();
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.representation(name).map(|r| r.text.as_str())
    }

    pub fn representation(&self, name: &str) -> Result<&Representation> {
        self.entries
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::not_found(name))
    }

    /// Replace the whole text of `name`.
    pub fn set(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::not_found(name))?;
        entry.text = text.into();
        Ok(())
    }

    /// Append `text` after the current contents, separated by a blank line.
    pub fn append(&mut self, name: &str, text: &str) -> Result<()> {
        let current = self.get(name)?;
        let combined = if current.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}\n\n{}", current.trim_end(), text)
        };
        self.set(name, combined)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Representation> {
        self.entries.iter()
    }

    /// Owned copy of every representation, in schema order.
    pub fn snapshot(&self) -> Vec<Representation> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
