//! # Interpolation of Parameterized Files
//!
//! A fetched file may declare a header (`spec.inputs`) naming the inputs it
//! accepts. The [`Interpolator`] is the ordered gate that turns such a file
//! plus its caller-supplied arguments into a substituted configuration
//! value:
//!
//! 1. Construction validates the raw content: YAML syntax, the
//!    header/body document structure, and whether interpolation may be
//!    evaluated for the project at all.
//! 2. Files without a header (or with interpolation disabled and no
//!    header) pass through unchanged.
//! 3. Otherwise the header's input specification is validated, the supplied
//!    arguments are resolved against it, the interpolation context is
//!    checked for excessive nesting, the placeholders are substituted over
//!    the raw body, and the substituted text is parsed as YAML.
//!
//! Each stage short-circuits. Accumulated errors surface as one message
//! carrying at most the first three, joined by ", ". The computed result is
//! memoized; performing the interpolation twice returns the same value
//! without recomputation.

pub mod header;
pub mod inputs;
pub mod template;

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Maximum nesting depth of a resolved input value.
const MAX_CONTEXT_DEPTH: usize = 3;

/// How many collected errors surface in the final message.
const MAX_REPORTED_ERRORS: usize = 3;

type StageOutcome = std::result::Result<Value, String>;

/// The ordered interpolation gate for one fetched file.
pub struct Interpolator {
    raw: String,
    provided: Mapping,
    enabled: bool,
    user: Option<String>,
    errors: Vec<String>,
    header: Option<Mapping>,
    body: String,
    result: Option<StageOutcome>,
}

impl Interpolator {
    /// Validate the raw content and prepare the gate.
    ///
    /// `provided` are the caller-supplied input arguments from the include
    /// declaration; `enabled` is the per-project interpolation feature
    /// state; `user` keys the usage-tracking hook.
    pub fn new(
        raw: &str,
        provided: Mapping,
        enabled: bool,
        user: Option<&str>,
    ) -> Self {
        let mut errors = Vec::new();
        let (header, body) = match header::split(raw) {
            Ok(split_content) => (split_content.header, split_content.body),
            Err(message) => {
                errors.push(message);
                (None, raw.to_string())
            }
        };

        if header.is_some() && !enabled {
            errors.push(
                "content declares a `spec` header but interpolation cannot be evaluated for this project"
                    .to_string(),
            );
        }

        Self {
            raw: raw.to_string(),
            provided,
            enabled,
            user: user.map(str::to_string),
            errors,
            header,
            body,
            result: None,
        }
    }

    /// Whether substitution will actually run.
    pub fn interpolable(&self) -> bool {
        self.enabled && self.header.is_some() && self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Run the gate, memoizing the outcome.
    pub fn perform(&mut self) -> Result<Value> {
        if self.result.is_none() {
            let computed = self.compute();
            self.result = Some(computed);
        }
        self.result
            .clone()
            .unwrap_or_else(|| Err("interpolation produced no result".to_string()))
            .map_err(|message| Error::Interpolation { message })
    }

    fn compute(&mut self) -> StageOutcome {
        if !self.errors.is_empty() {
            return Err(join_errors(&self.errors));
        }

        let header = match (&self.header, self.enabled) {
            (Some(header), true) => header.clone(),
            // Back-compat path: nothing to substitute
            _ => return parse_document(&self.raw),
        };

        let input_specs = match header::validate(&header) {
            Ok(inputs) => inputs,
            Err(errors) => return Err(self.fail(errors)),
        };
        let specs = match inputs::parse_specs(&input_specs) {
            Ok(specs) => specs,
            Err(errors) => return Err(self.fail(errors)),
        };
        let resolved = match inputs::resolve(&specs, &self.provided) {
            Ok(resolved) => resolved,
            Err(errors) => return Err(self.fail(errors)),
        };
        if let Err(errors) = check_context(&resolved) {
            return Err(self.fail(errors));
        }
        let (substituted, replacements) = match template::substitute(&self.body, &resolved) {
            Ok(substituted) => substituted,
            Err(errors) => return Err(self.fail(errors)),
        };

        let value = parse_document(&substituted)
            .map_err(|message| self.fail(vec![format!("after interpolation, {message}")]))?;

        if replacements > 0 {
            // Telemetry hook: interpolation actually consumed inputs
            log::debug!(
                "interpolation consumed {replacements} input reference(s) for user {}",
                self.user.as_deref().unwrap_or("(anonymous)")
            );
        }

        Ok(value)
    }

    fn fail(&mut self, errors: Vec<String>) -> String {
        self.errors.extend(errors);
        join_errors(&self.errors)
    }
}

fn parse_document(text: &str) -> StageOutcome {
    serde_yaml::from_str(text)
        .map_err(|source| format!("content does not have valid YAML syntax: {source}"))
}

/// Reject resolved input values nested deeper than the context allows.
fn check_context(resolved: &[(String, Value)]) -> std::result::Result<(), Vec<String>> {
    let errors: Vec<String> = resolved
        .iter()
        .filter(|(_, value)| value_depth(value) > MAX_CONTEXT_DEPTH)
        .map(|(name, _)| format!("`{name}` input: value is too deeply nested"))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn value_depth(value: &Value) -> usize {
    match value {
        Value::Sequence(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        Value::Mapping(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn join_errors(errors: &[String]) -> String {
    errors
        .iter()
        .take(MAX_REPORTED_ERRORS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn yaml_snippet(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|rendered| rendered.trim_end().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}
