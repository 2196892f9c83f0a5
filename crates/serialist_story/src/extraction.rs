//! Utilities for extracting structured data from model responses.
//!
//! Analysis calls are asked for JSON, but responses often wrap it in
//! markdown fences or surround it with commentary. Payloads are then parsed
//! item by item so one malformed entry never discards the rest.

use serde::de::DeserializeOwned;
use serde_json::Value;
use serialist_error::{JsonError, JsonErrorKind, SerialistResult};

/// Extract JSON from a response that may contain markdown or extra text.
///
/// Strategies, in order:
/// 1. Markdown code blocks: ```json ... ```
/// 2. Balanced braces or brackets, whichever opens first
///
/// # Errors
///
/// Returns an error if no JSON is found in the response.
///
/// # Examples
///
/// ```
/// use serialist_story::extract_json;
///
/// let response = "Here is the analysis:\n```json\n{\"events\": []}\n```\nDone.";
/// assert_eq!(extract_json(response).unwrap(), "{\"events\": []}");
/// ```
pub fn extract_json(response: &str) -> SerialistResult<String> {
    if let Some(json) = extract_from_code_block(response) {
        return Ok(json);
    }

    let bracket_pos = response.find('[');
    let brace_pos = response.find('{');

    let order: [(char, char); 2] = match (bracket_pos, brace_pos) {
        (Some(b), Some(c)) if b < c => [('[', ']'), ('{', '}')],
        (Some(_), None) => [('[', ']'), ('[', ']')],
        _ => [('{', '}'), ('[', ']')],
    };

    for (open, close) in order {
        if let Some(json) = extract_balanced(response, open, close) {
            return Ok(json);
        }
    }

    tracing::debug!(response_length = response.len(), "No JSON found in model response");
    Err(JsonError::new(JsonErrorKind::NotFound(response.len())).into())
}

/// Extract content from a markdown code block, preferring a `json` fence.
fn extract_from_code_block(response: &str) -> Option<String> {
    if let Some(start) = response.find("```json") {
        let content_start = start + "```json".len();
        let rest = &response[content_start..];
        // A missing closing fence means a truncated response; keep what we have
        let content = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(content.trim().to_string());
    }

    let start = response.find("```")?;
    let content_start = start + 3;
    let skip_to = response[content_start..]
        .find('\n')
        .map(|n| content_start + n + 1)
        .unwrap_or(content_start);
    let rest = &response[skip_to..];
    let content = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest).trim();

    // Fenced prose is not JSON
    if content.starts_with('{') || content.starts_with('[') {
        Some(content.to_string())
    } else {
        None
    }
}

/// Extract content between balanced delimiters, ignoring delimiters inside
/// string literals.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(response[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse JSON into a specific type.
///
/// # Errors
///
/// Returns an error if the JSON string cannot be parsed into type `T`.
///
/// # Examples
///
/// ```
/// use serialist_story::parse_json;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Review {
///     action: String,
/// }
///
/// let review: Review = parse_json(r#"{"action": "keep"}"#).unwrap();
/// assert_eq!(review.action, "keep");
/// ```
pub fn parse_json<T>(json_str: &str) -> SerialistResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_str(json_str).map_err(|e| {
        let preview = json_str.chars().take(100).collect::<String>();
        tracing::debug!(error = %e, json_preview = %preview, "JSON parsing failed");
        JsonError::new(JsonErrorKind::Parse(format!("{} (JSON: {}...)", e, preview))).into()
    })
}

/// Extract and parse the JSON payload of a model response into a loose value.
///
/// # Errors
///
/// Returns an error if the response contains no parseable JSON.
pub fn parse_model_payload(response: &str) -> SerialistResult<Value> {
    let json = extract_json(response)?;
    parse_json(&json)
}

/// Parse a list field item by item, dropping entries that do not fit `T`.
///
/// A missing field or `null` yields an empty list. A single object where a
/// list was expected is treated as a one-item list.
///
/// # Examples
///
/// ```
/// use serialist_story::parse_lenient_list;
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct Event {
///     content: String,
/// }
///
/// let payload = json!({"events": [{"content": "a"}, {"wrong": 1}, {"content": "b"}]});
/// let events: Vec<Event> = parse_lenient_list(payload.get("events"), "events");
/// assert_eq!(events.len(), 2);
/// ```
pub fn parse_lenient_list<T>(value: Option<&Value>, field: &str) -> Vec<T>
where
    T: DeserializeOwned,
{
    let items: Vec<&Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(field, error = %e, "Dropping malformed item");
                None
            }
        })
        .collect();

    if parsed.len() < total {
        tracing::debug!(
            field,
            kept = parsed.len(),
            dropped = total - parsed.len(),
            "Lenient parse dropped items"
        );
    }
    parsed
}
