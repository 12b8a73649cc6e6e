//! Input specifications and argument validation.
//!
//! The header's `spec.inputs` block declares the named inputs a file
//! accepts. Each declaration carries a type (`string` by default), an
//! optional default, an optional closed list of allowed options, and for
//! string inputs an optional regex the value must match. Supplied arguments
//! are validated against the declarations; an input with neither a supplied
//! value nor a default is required.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Declared type of one input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    String,
    Number,
    Boolean,
    Array,
}

impl InputType {
    fn name(self) -> &'static str {
        match self {
            InputType::String => "string",
            InputType::Number => "number",
            InputType::Boolean => "boolean",
            InputType::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            InputType::String => value.is_string(),
            InputType::Number => value.is_number(),
            InputType::Boolean => value.is_bool(),
            InputType::Array => value.is_sequence(),
        }
    }
}

/// One input declaration from the header.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSpec {
    #[serde(default, rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub options: Option<Vec<Value>>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parse and validate the declarations of a `spec.inputs` mapping,
/// preserving declaration order.
pub fn parse_specs(inputs: &Mapping) -> Result<Vec<(String, InputSpec)>, Vec<String>> {
    let mut specs = Vec::new();
    let mut errors = Vec::new();

    for (name_value, declaration) in inputs {
        let Some(name) = name_value.as_str() else {
            errors.push(format!(
                "input name `{}` must be a string",
                super::yaml_snippet(name_value)
            ));
            continue;
        };

        let spec = match declaration {
            Value::Null => InputSpec::default(),
            value => match serde_yaml::from_value::<InputSpec>(value.clone()) {
                Ok(spec) => spec,
                Err(source) => {
                    errors.push(format!("`{name}` input: invalid specification: {source}"));
                    continue;
                }
            },
        };

        if spec.regex.is_some() && spec.input_type != InputType::String {
            errors.push(format!(
                "`{name}` input: `regex` can only be used with string inputs"
            ));
        }
        if spec.options.is_some()
            && !matches!(spec.input_type, InputType::String | InputType::Number)
        {
            errors.push(format!(
                "`{name}` input: `options` can only be used with string and number inputs"
            ));
        }

        specs.push((name.to_string(), spec));
    }

    if errors.is_empty() {
        Ok(specs)
    } else {
        Err(errors)
    }
}

/// Resolve the supplied arguments against the declarations.
///
/// Returns the resolved `(name, value)` pairs in declaration order, or all
/// collected validation errors.
pub fn resolve(
    specs: &[(String, InputSpec)],
    provided: &Mapping,
) -> Result<Vec<(String, Value)>, Vec<String>> {
    let mut errors = Vec::new();

    let unknown: Vec<String> = provided
        .keys()
        .filter_map(Value::as_str)
        .filter(|name| !specs.iter().any(|(declared, _)| declared == name))
        .map(|name| format!("`{name}`"))
        .collect();
    if !unknown.is_empty() {
        errors.push(format!("unknown input arguments: {}", unknown.join(", ")));
    }

    let mut resolved = Vec::with_capacity(specs.len());
    for (name, spec) in specs {
        let (value, from_default) = match provided.get(&Value::String(name.clone())) {
            Some(value) => (value.clone(), false),
            None => match &spec.default {
                Some(default) => (default.clone(), true),
                None => {
                    errors.push(format!(
                        "`{name}` input: required value has not been provided"
                    ));
                    continue;
                }
            },
        };

        if !spec.input_type.matches(&value) {
            let source = if from_default { "default" } else { "provided" };
            errors.push(format!(
                "`{name}` input: {source} value is not a {}",
                spec.input_type.name()
            ));
            continue;
        }

        if let Some(options) = &spec.options {
            if !options.contains(&value) {
                errors.push(format!(
                    "`{name}` input: `{}` cannot be used because it is not in the list of allowed options",
                    super::yaml_snippet(&value)
                ));
                continue;
            }
        }

        if let (Some(pattern), Some(text)) = (&spec.regex, value.as_str()) {
            match regex::Regex::new(pattern) {
                Ok(compiled) => {
                    if !compiled.is_match(text) {
                        errors.push(format!(
                            "`{name}` input: provided value does not match required pattern: {pattern}"
                        ));
                        continue;
                    }
                }
                Err(_) => {
                    errors.push(format!("`{name}` input: invalid regular expression"));
                    continue;
                }
            }
        }

        resolved.push((name.clone(), value));
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}
