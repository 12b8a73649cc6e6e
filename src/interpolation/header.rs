//! Header document handling for parameterized files.
//!
//! A parameterized file carries two YAML documents: a header whose mapping
//! contains the `spec` key (the input specification), then the body the
//! placeholders are substituted into:
//!
//! ```yaml
//! spec:
//!   inputs:
//!     environment:
//!       default: staging
//! ---
//! deploy:
//!   script: deploy --env $[[ inputs.environment ]]
//! ```

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Raw content split into an optional header and the body text.
#[derive(Debug, Clone)]
pub struct SplitContent {
    pub header: Option<Mapping>,
    pub body: String,
}

/// Split raw content into header and body documents.
///
/// A single-document file has no header and its body is the whole content.
/// Two documents form a header/body pair only when the first document's
/// mapping contains `spec`; anything else is a content error.
pub fn split(raw: &str) -> Result<SplitContent, String> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(raw) {
        let value = Value::deserialize(document)
            .map_err(|source| format!("content does not have valid YAML syntax: {source}"))?;
        documents.push(value);
    }

    match documents.len() {
        0 | 1 => Ok(SplitContent {
            header: None,
            body: raw.to_string(),
        }),
        2 => {
            let header = match &documents[0] {
                Value::Mapping(map) if map.contains_key(&key("spec")) => map.clone(),
                _ => {
                    return Err(
                        "content has multiple YAML documents but the first document is not a `spec` header"
                            .to_string(),
                    )
                }
            };
            let body = body_after_separator(raw).ok_or_else(|| {
                "could not locate the document separator after the `spec` header".to_string()
            })?;
            Ok(SplitContent {
                header: Some(header),
                body: body.to_string(),
            })
        }
        _ => Err("content has too many YAML documents".to_string()),
    }
}

/// Validate the header document and extract its input specification.
///
/// The header may contain only `spec`, and `spec` may contain only
/// `inputs`. A missing or null `inputs` is an empty specification.
pub fn validate(header: &Mapping) -> Result<Mapping, Vec<String>> {
    let mut errors = Vec::new();

    let unknown = unknown_keys(header, &["spec"]);
    if !unknown.is_empty() {
        errors.push(format!("header contains unknown keys: {}", unknown.join(", ")));
    }

    let inputs = match header.get(&key("spec")) {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(spec)) => {
            let unknown = unknown_keys(spec, &["inputs"]);
            if !unknown.is_empty() {
                errors.push(format!(
                    "header `spec` contains unknown keys: {}",
                    unknown.join(", ")
                ));
            }
            match spec.get(&key("inputs")) {
                None | Some(Value::Null) => Mapping::new(),
                Some(Value::Mapping(inputs)) => inputs.clone(),
                Some(_) => {
                    errors.push("header `spec` inputs must be a mapping".to_string());
                    Mapping::new()
                }
            }
        }
        Some(_) => {
            errors.push("header `spec` must be a mapping".to_string());
            Mapping::new()
        }
    };

    if errors.is_empty() {
        Ok(inputs)
    } else {
        Err(errors)
    }
}

fn unknown_keys(map: &Mapping, allowed: &[&str]) -> Vec<String> {
    map.keys()
        .filter_map(Value::as_str)
        .filter(|name| !allowed.contains(name))
        .map(|name| format!("`{name}`"))
        .collect()
}

fn body_after_separator(raw: &str) -> Option<&str> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if line.trim_end().trim() == "---" {
            // A marker on the very first line opens the header document
            // rather than closing it.
            if start == 0 {
                continue;
            }
            return Some(&raw[offset..]);
        }
    }
    None
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}
