//! # Include Normalization
//!
//! This module converts raw `include` declarations into canonical
//! [`IncludeSpec`] descriptors. The raw form is permissive: a bare string, a
//! map, or an array of either. Normalization is purely syntactic:
//!
//! - A bare string that parses as an absolute `http(s)` URL becomes a remote
//!   include; any other string becomes a repository-local path.
//! - A map is carried over field by field, with CI variables expanded inside
//!   the location strings. A `project` include whose `file` value is a list
//!   expands into one spec per file.
//!
//! Normalization never rejects a map for populating the wrong combination of
//! location fields; that is the resolver's job. Only entries that are neither
//! strings nor maps, and malformed `rules` blocks, fail here.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use url::Url;

use crate::error::{Error, Result};
use crate::variables::Variables;

/// A canonical include descriptor.
///
/// Exactly one of the location kinds (`remote`, `local`, `template`,
/// `project`) should be populated; the resolver enforces this. `inputs` are
/// the caller-supplied interpolation arguments and participate in the
/// expansion-set identity of the include, so the same file included with
/// different inputs is not a duplicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSpec {
    pub remote: Option<String>,
    pub local: Option<String>,
    pub template: Option<String>,
    pub project: Option<String>,
    pub file: Option<String>,
    pub r#ref: Option<String>,
    pub inputs: Mapping,
    pub rules: Vec<IncludeRule>,
}

/// A conditional-inclusion rule attached to an include entry.
///
/// The first rule whose `if` predicate matches decides whether the entry is
/// kept (`when: never` drops it). Supported predicate forms: `$VAR`,
/// `$VAR == "literal"`, `$VAR != "literal"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncludeRule {
    #[serde(default, rename = "if")]
    pub if_cond: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
}

impl IncludeRule {
    fn matches(&self, variables: &Variables) -> bool {
        match &self.if_cond {
            None => true,
            Some(expression) => eval_if(expression, variables),
        }
    }
}

impl IncludeSpec {
    /// Whether this include survives its `rules`.
    pub fn included(&self, variables: &Variables) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        for rule in &self.rules {
            if rule.matches(variables) {
                return rule.when.as_deref() != Some("never");
            }
        }
        false
    }

    /// Stable identity string used by the expansion-set guard.
    ///
    /// Includes the inputs, so the same location with different inputs forms
    /// a distinct entry.
    pub fn expand_key_string(&self) -> String {
        if self.inputs.is_empty() {
            self.to_string()
        } else {
            let inputs = serde_yaml::to_string(&self.inputs).unwrap_or_default();
            format!("{} inputs: {}", self, inputs.trim_end())
        }
    }
}

impl std::fmt::Display for IncludeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(remote) = &self.remote {
            parts.push(format!("remote: {remote}"));
        }
        if let Some(local) = &self.local {
            parts.push(format!("local: {local}"));
        }
        if let Some(template) = &self.template {
            parts.push(format!("template: {template}"));
        }
        if let Some(project) = &self.project {
            parts.push(format!("project: {project}"));
        }
        if let Some(file) = &self.file {
            parts.push(format!("file: {file}"));
        }
        if let Some(reference) = &self.r#ref {
            parts.push(format!("ref: {reference}"));
        }
        if parts.is_empty() {
            write!(f, "(no location)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Normalize a raw `include` value into canonical specs.
///
/// Accepts a bare string, a map, or an array of either. A `null` include
/// normalizes to no specs at all.
pub fn normalize(value: &Value, variables: &Variables) -> Result<Vec<IncludeSpec>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(location) => Ok(vec![spec_from_string(location, variables)]),
        Value::Mapping(map) => specs_from_mapping(map, variables),
        Value::Sequence(entries) => {
            let mut specs = Vec::new();
            for entry in entries {
                match entry {
                    Value::String(location) => specs.push(spec_from_string(location, variables)),
                    Value::Mapping(map) => specs.extend(specs_from_mapping(map, variables)?),
                    other => {
                        return Err(Error::AmbiguousSpecification {
                            location: yaml_snippet(other),
                        })
                    }
                }
            }
            Ok(specs)
        }
        other => Err(Error::AmbiguousSpecification {
            location: yaml_snippet(other),
        }),
    }
}

fn spec_from_string(location: &str, variables: &Variables) -> IncludeSpec {
    let expanded = variables.expand(location);
    if is_absolute_url(&expanded) {
        IncludeSpec {
            remote: Some(expanded),
            ..Default::default()
        }
    } else {
        IncludeSpec {
            local: Some(expanded),
            ..Default::default()
        }
    }
}

fn specs_from_mapping(map: &Mapping, variables: &Variables) -> Result<Vec<IncludeSpec>> {
    let base = IncludeSpec {
        remote: expanded_str_field(map, "remote", variables),
        local: expanded_str_field(map, "local", variables),
        template: expanded_str_field(map, "template", variables),
        project: expanded_str_field(map, "project", variables),
        file: None,
        r#ref: expanded_str_field(map, "ref", variables),
        inputs: map
            .get(&key("inputs"))
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default(),
        rules: parse_rules(map)?,
    };

    let files = file_field(map, variables);
    Ok(files
        .into_iter()
        .map(|file| IncludeSpec {
            file,
            ..base.clone()
        })
        .collect())
}

fn parse_rules(map: &Mapping) -> Result<Vec<IncludeRule>> {
    match map.get(&key("rules")) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => {
            serde_yaml::from_value(value.clone()).map_err(|source| Error::ConfigParse {
                message: format!("include `rules` could not be parsed: {source}"),
                hint: Some("rules entries support only `if` and `when` keys".to_string()),
            })
        }
    }
}

/// The `file` field of a project include may be a single path or a list of
/// paths; a list expands into one spec per path.
fn file_field(map: &Mapping, variables: &Variables) -> Vec<Option<String>> {
    match map.get(&key("file")) {
        Some(Value::String(path)) => vec![Some(variables.expand(path))],
        Some(Value::Sequence(paths)) => {
            let files: Vec<Option<String>> = paths
                .iter()
                .filter_map(Value::as_str)
                .map(|path| Some(variables.expand(path)))
                .collect();
            if files.is_empty() {
                vec![None]
            } else {
                files
            }
        }
        _ => vec![None],
    }
}

fn expanded_str_field(map: &Mapping, field: &str, variables: &Variables) -> Option<String> {
    map.get(&key(field))
        .and_then(Value::as_str)
        .map(|value| variables.expand(value))
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn is_absolute_url(location: &str) -> bool {
    Url::parse(location)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn yaml_snippet(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|rendered| rendered.trim_end().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}

fn eval_if(expression: &str, variables: &Variables) -> bool {
    let trimmed = expression.trim();

    if let Some(rest) = trimmed.strip_prefix('$') {
        // Comparison form: $VAR == "literal" / $VAR != "literal"
        if let Some((name, operator, literal)) = split_comparison(rest) {
            let actual = variables.get(name);
            return match operator {
                "==" => actual == Some(literal),
                _ => actual != Some(literal),
            };
        }
        // Presence form: $VAR
        if rest.chars().all(|c| c.is_alphanumeric() || c == '_') && !rest.is_empty() {
            return variables.get(rest).is_some_and(|value| !value.is_empty());
        }
    }

    log::warn!("unsupported rules expression `{trimmed}`, treating as not matching");
    false
}

fn split_comparison(rest: &str) -> Option<(&str, &str, &str)> {
    for operator in ["==", "!="] {
        if let Some((name, literal)) = rest.split_once(operator) {
            let name = name.trim();
            let literal = literal.trim();
            let unquoted = literal
                .strip_prefix('"')
                .and_then(|l| l.strip_suffix('"'))
                .or_else(|| literal.strip_prefix('\'').and_then(|l| l.strip_suffix('\'')))?;
            if name.chars().all(|c| c.is_alphanumeric() || c == '_') && !name.is_empty() {
                return Some((name, operator, unquoted));
            }
            return None;
        }
    }
    None
}
