//! Server-declared choice lists and mapping of user text onto choice values.

use std::collections::BTreeMap;

use serde_json::Value;

/// A server choice: stored value and human label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Choices keyed by field name
pub type ChoiceMap = BTreeMap<String, Vec<Choice>>;

/// Read `actions.POST.<field>.choices` out of an OPTIONS response.
///
/// Each choice may be `{value, display_name}`, `{value, label}` or a
/// `[value, label]` pair. Fields without choices are left out.
pub fn parse_options_choices(body: &Value, fields: &[&str]) -> ChoiceMap {
    let post = body.pointer("/actions/POST");
    let mut out = ChoiceMap::new();

    for field in fields {
        let Some(list) = post
            .and_then(|p| p.get(*field))
            .and_then(|f| f.get("choices"))
            .and_then(Value::as_array)
        else {
            continue;
        };

        let choices: Vec<Choice> = list.iter().filter_map(parse_choice).collect();
        if !choices.is_empty() {
            out.insert((*field).to_string(), choices);
        }
    }

    out
}

fn parse_choice(item: &Value) -> Option<Choice> {
    let (value, label) = match item {
        Value::Array(pair) => (pair.first()?, pair.get(1)),
        Value::Object(map) => (
            map.get("value")?,
            map.get("display_name").or_else(|| map.get("label")),
        ),
        _ => return None,
    };

    let value = scalar_text(value)?;
    let label = label.and_then(scalar_text).unwrap_or_else(|| value.clone());
    Some(Choice { value, label })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Map user-entered text (e.g. "casado") onto the server's stored value.
///
/// Tries, case-insensitively: exact label, exact value, then a unique label
/// sharing the first letter. Returns the input unchanged when nothing matches
/// or the field has no known choices.
pub fn map_choice_value(field: &str, input: &str, choices: &ChoiceMap) -> String {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return input.to_string();
    }

    let Some(list) = choices.get(field).filter(|l| !l.is_empty()) else {
        return input.to_string();
    };

    if let Some(c) = list.iter().find(|c| c.label.trim().to_lowercase() == needle) {
        return c.value.clone();
    }
    if let Some(c) = list.iter().find(|c| c.value.trim().to_lowercase() == needle) {
        return c.value.clone();
    }

    let first = &needle[..needle.chars().next().map_or(0, char::len_utf8)];
    let by_initial: Vec<&Choice> = list
        .iter()
        .filter(|c| c.label.trim().to_lowercase().starts_with(first))
        .collect();
    if let [only] = by_initial.as_slice() {
        return only.value.clone();
    }

    input.to_string()
}
