//! CI variable collection and `$VAR` expansion
//!
//! Variables participate in two places during resolution: location strings
//! are expanded before normalization, and include `rules` predicates are
//! evaluated against the collection. Unknown variables expand to the empty
//! string.

use std::sync::OnceLock;

use regex::Regex;

/// A single CI variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub key: String,
    pub value: String,
}

/// An ordered collection of CI variables.
///
/// Later entries shadow earlier ones with the same key, matching the
/// precedence of a pipeline's variable stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(Vec<Variable>);

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("variable token pattern is valid")
    })
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| Variable {
                    key: key.into(),
                    value: value.into(),
                })
                .collect(),
        )
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Variable {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Look up a variable, later entries shadowing earlier ones.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|variable| variable.key == key)
            .map(|variable| variable.value.as_str())
    }

    /// Expand `$VAR` and `${VAR}` references in `text`.
    ///
    /// Unknown variables expand to the empty string.
    pub fn expand(&self, text: &str) -> String {
        token_pattern()
            .replace_all(text, |captures: &regex::Captures<'_>| {
                let name = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                self.get(name).unwrap_or_default().to_string()
            })
            .into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.0.iter()
    }
}
