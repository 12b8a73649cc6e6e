//! Placeholder substitution over raw file content.
//!
//! Placeholders have the form `$[[ inputs.NAME ]]` and are replaced
//! textually before the body is parsed as YAML, so a number input
//! substituted into a scalar position yields a YAML number. Non-scalar
//! values render in JSON flow style, which is valid YAML.

use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\[\[\s*([^\[\]]*?)\s*\]\]").expect("placeholder pattern is valid")
    })
}

/// Substitute every placeholder in `body` with its resolved input value.
///
/// Returns the substituted text and the number of replacements made, or all
/// collected access errors.
pub fn substitute(
    body: &str,
    inputs: &[(String, Value)],
) -> Result<(String, usize), Vec<String>> {
    let mut output = String::with_capacity(body.len());
    let mut errors = Vec::new();
    let mut replacements = 0;
    let mut last_end = 0;

    for captures in placeholder_pattern().captures_iter(body) {
        let whole = match captures.get(0) {
            Some(m) => m,
            None => continue,
        };
        output.push_str(&body[last_end..whole.start()]);
        last_end = whole.end();

        let access = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        match render_access(access, inputs) {
            Ok(rendered) => {
                output.push_str(&rendered);
                replacements += 1;
            }
            Err(error) => errors.push(error),
        }
    }
    output.push_str(&body[last_end..]);

    if errors.is_empty() {
        Ok((output, replacements))
    } else {
        Err(errors)
    }
}

fn render_access(access: &str, inputs: &[(String, Value)]) -> Result<String, String> {
    let mut parts = access.split('.');
    let root = parts.next().unwrap_or_default();
    let name = parts.next();

    if root != "inputs" {
        return Err(format!("unknown interpolation key: `{root}`"));
    }
    let name = match (name, parts.next()) {
        (Some(name), None) if !name.is_empty() => name,
        _ => return Err(format!("invalid interpolation access pattern: `{access}`")),
    };

    let value = inputs
        .iter()
        .find(|(declared, _)| declared == name)
        .map(|(_, value)| value)
        .ok_or_else(|| format!("unknown input in interpolation: `{name}`"))?;

    render_value(value).ok_or_else(|| format!("input `{name}` cannot be rendered into the content"))
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some(String::new()),
        // Flow style is valid YAML, so compound values can be inlined
        Value::Sequence(_) | Value::Mapping(_) => serde_json::to_string(value).ok(),
        Value::Tagged(_) => None,
    }
}
