use serde_json::{Map, Value};

/// Drops a leading and trailing markdown fence line (```json ... ```).
pub fn clean_json_response(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|line| line.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Parses a cleaned reply into the translated key/value object.
///
/// Anything but a JSON object is rejected with a short reason.
pub fn parse_translation_object(content: &str) -> Result<Map<String, Value>, String> {
    let cleaned = clean_json_response(content);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(error) => Err(format!("reply is not valid JSON: {error}")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
