//! Section parser: pulls named sections out of free-form model output.
//!
//! The model is asked to answer in a loose format:
//!
//! ```text
//! summary: set cluster url
//!
//! [CONFIG]
//! {"KUSTO_CLUSTER_URL":"https://x"}
//! ```
//!
//! One linear scan over the lines records, per section, the *last* line
//! carrying one of its [`BoundaryMarker`]s. Bodies run from each final
//! boundary to the next header line, which may be an earlier repeat of
//! another section's header. Sections the model did not mention are simply
//! absent from the result, so callers keep their previous value.
//!
//! Rules:
//! - A generic marker is `[LABEL]` or `LABEL:` anywhere on the line
//!   (case-sensitive); the body starts on the following line.
//! - A specific-token line (e.g. one containing `KUSTO_CLUSTER_URL`) starts
//!   the body on that same line. It overrides the section's generic marker
//!   when it comes after it, or when there is no generic marker at all.
//! - Before the first boundary, a line containing `summary` is the summary
//!   marker; the text after its first colon is the summary. The
//!   last such line wins.
//! - When one line carries markers of several sections, the section
//!   declared first wins it.
//! - Leading and trailing blank lines of a body are dropped; everything in
//!   between is kept verbatim.

use docforge_core::error::{Error, Result};
use docforge_core::representation::{RepresentationSchema, RepresentationSpec};
use serde::Serialize;

/// A line pattern that marks where a section starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryMarker {
    /// `[LABEL]` or `LABEL:`.
    Generic(String),
    /// A line containing a token only found in the real body: `(label, token)`.
    SpecificToken(String, String),
}

impl BoundaryMarker {
    fn matches(&self, line: &str) -> bool {
        match self {
            Self::Generic(label) => {
                line.contains(&format!("[{label}]")) || line.contains(&format!("{label}:"))
            }
            Self::SpecificToken(_, token) => line.contains(token.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct SectionRule {
    name: String,
    markers: Vec<BoundaryMarker>,
}

impl SectionRule {
    fn new(name: &str, label: &str, tokens: &[String]) -> Self {
        let mut markers = vec![BoundaryMarker::Generic(label.to_string())];
        markers.extend(
            tokens
                .iter()
                .map(|t| BoundaryMarker::SpecificToken(label.to_string(), t.clone())),
        );
        Self {
            name: name.to_string(),
            markers,
        }
    }
}

/// One extracted section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub body: String,
}

/// Output of parsing a command response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCommandResult {
    pub summary: Option<String>,
    /// Found sections in output order. Names are unique.
    pub sections: Vec<Section>,
}

impl ParsedCommandResult {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.body.as_str())
    }

    /// No summary and no sections.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.sections.is_empty()
    }
}

/// Output of parsing a query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParse {
    pub response: String,
    pub ephemeral: Option<String>,
}

const RESPONSE: &str = "response";
const EPHEMERAL: &str = "ephemeral";

#[derive(Debug, Clone, Copy, Default)]
struct Hits {
    generic: Option<usize>,
    token: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    rule: usize,
    line: usize,
    body_start: usize,
}

#[derive(Debug, Default)]
struct Scan {
    summary: Option<String>,
    saw_summary: bool,
    boundaries: Vec<Boundary>,
    /// Lines that end a body: every generic header line, including earlier
    /// repeats, plus each section's final specific-token line.
    stops: Vec<usize>,
}

/// Schema-driven section extractor.
#[derive(Debug, Clone)]
pub struct SectionParser {
    rules: Vec<SectionRule>,
    summary: bool,
}

impl SectionParser {
    /// Parser for command responses: one section per representation, with
    /// summary detection.
    pub fn for_schema(schema: &RepresentationSchema) -> Self {
        Self {
            rules: schema
                .specs()
                .iter()
                .map(|s| SectionRule::new(&s.name, &s.label, &s.specific_tokens))
                .collect(),
            summary: true,
        }
    }

    /// Parser for a single representation's section, without summary
    /// detection. Used to reduce ingestion digests.
    pub fn for_representation(spec: &RepresentationSpec) -> Self {
        Self {
            rules: vec![SectionRule::new(&spec.name, &spec.label, &spec.specific_tokens)],
            summary: false,
        }
    }

    /// Parser for query responses: a `Response` section plus an optional
    /// ephemeral-state section.
    pub fn for_query(ephemeral_label: Option<&str>) -> Self {
        let mut rules = vec![SectionRule::new(RESPONSE, "Response", &[])];
        if let Some(label) = ephemeral_label {
            rules.push(SectionRule::new(EPHEMERAL, label, &[]));
        }
        Self {
            rules,
            summary: false,
        }
    }

    /// Parse a command response.
    ///
    /// Empty input is a no-op. Input with no boundary and no summary is the
    /// whole body of a single-section schema, and
    /// [`Error::MalformedModelOutput`] for anything larger.
    pub fn parse(&self, text: &str) -> Result<ParsedCommandResult> {
        if text.trim().is_empty() {
            return Ok(ParsedCommandResult::default());
        }

        let lines: Vec<&str> = text.lines().collect();
        let scan = self.scan(&lines);

        if scan.boundaries.is_empty() && !scan.saw_summary {
            return match self.rules.as_slice() {
                [only] => Ok(ParsedCommandResult {
                    summary: None,
                    sections: vec![Section {
                        name: only.name.clone(),
                        body: trim_blank_lines(&lines),
                    }],
                }),
                _ => Err(Error::MalformedModelOutput(
                    "no recognised section or summary in model output".into(),
                )),
            };
        }

        let sections = self.bodies(&lines, &scan);
        Ok(ParsedCommandResult {
            summary: scan.summary,
            sections,
        })
    }

    /// Parse a query response. Never fails: without a `Response` marker the
    /// raw text is the response.
    pub fn parse_query(&self, text: &str) -> QueryParse {
        let lines: Vec<&str> = text.lines().collect();
        let scan = self.scan(&lines);
        let sections = self.bodies(&lines, &scan);
        let find = |name: &str| {
            sections
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.body.clone())
        };

        QueryParse {
            response: find(RESPONSE).unwrap_or_else(|| text.to_string()),
            ephemeral: find(EPHEMERAL),
        }
    }

    fn scan(&self, lines: &[&str]) -> Scan {
        let mut scan = Scan::default();
        let mut hits = vec![Hits::default(); self.rules.len()];
        let mut header_seen = false;

        for (i, line) in lines.iter().enumerate() {
            if self.summary && !header_seen && line.contains("summary") {
                scan.saw_summary = true;
                scan.summary = line
                    .split_once(':')
                    .map(|(_, rest)| rest.trim().to_string())
                    .filter(|s| !s.is_empty());
                continue;
            }

            for (r, rule) in self.rules.iter().enumerate() {
                if let Some(marker) = rule.markers.iter().find(|m| m.matches(line)) {
                    match marker {
                        BoundaryMarker::Generic(_) => {
                            hits[r].generic = Some(i);
                            scan.stops.push(i);
                        }
                        BoundaryMarker::SpecificToken(..) => hits[r].token = Some(i),
                    }
                    header_seen = true;
                    break;
                }
            }
        }

        for (rule, hit) in hits.into_iter().enumerate() {
            let boundary = match (hit.generic, hit.token) {
                (Some(g), Some(t)) if t > g => {
                    scan.stops.push(t);
                    Boundary { rule, line: t, body_start: t }
                }
                (Some(g), _) => Boundary { rule, line: g, body_start: g + 1 },
                (None, Some(t)) => {
                    scan.stops.push(t);
                    Boundary { rule, line: t, body_start: t }
                }
                (None, None) => continue,
            };
            scan.boundaries.push(boundary);
        }

        scan.boundaries.sort_by_key(|b| b.line);
        scan.stops.sort_unstable();
        scan.stops.dedup();
        scan
    }

    fn bodies(&self, lines: &[&str], scan: &Scan) -> Vec<Section> {
        scan.boundaries
            .iter()
            .map(|b| {
                let end = scan
                    .stops
                    .iter()
                    .copied()
                    .find(|&s| s > b.line)
                    .unwrap_or(lines.len());
                let start = b.body_start.min(end);
                Section {
                    name: self.rules[b.rule].name.clone(),
                    body: trim_blank_lines(&lines[start..end]),
                }
            })
            .collect()
    }
}

fn trim_blank_lines(lines: &[&str]) -> String {
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}
