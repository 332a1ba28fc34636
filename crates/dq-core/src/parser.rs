//! Decoding of raw model output.
//!
//! Models are asked for JSON but are not bound to produce it, so every
//! function here is total: malformed output degrades to a defined value
//! instead of an error.

use serde_json::{Map, Value};
use tracing::debug;

use crate::answer::{Answer, DEFAULT_CONFIDENCE, DEFAULT_REASONING};

/// Remove surrounding whitespace and a Markdown code fence (with or without a language tag).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[idx + 1..]
        }
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the model's reply to an answer prompt. Never fails.
pub fn parse_answer(raw: &str) -> Answer {
    let cleaned = strip_code_fences(raw);

    match decode_object(cleaned).or_else(|| embedded_span(cleaned, '{', '}').and_then(decode_object)) {
        Some(fields) => answer_from_fields(&fields, raw),
        None => {
            debug!(raw_len = raw.len(), "Model output is not a JSON object, using fallback answer");
            Answer::unstructured(raw)
        }
    }
}

/// Parse the model's reply to a recommendation prompt.
///
/// Accepts a bare array of strings or an object holding one. The
/// `questions` key wins; otherwise the first array with a string entry
/// under any key is used (JSON modes force an object, and models pick
/// their own key names). Blank entries are dropped and at most `limit`
/// questions are kept; an empty result means nothing usable was found.
pub fn parse_question_list(raw: &str, limit: usize) -> Vec<String> {
    let cleaned = strip_code_fences(raw);

    let value = serde_json::from_str::<Value>(cleaned)
        .ok()
        .or_else(|| embedded_span(cleaned, '{', '}').and_then(|s| serde_json::from_str(s).ok()))
        .or_else(|| embedded_span(cleaned, '[', ']').and_then(|s| serde_json::from_str(s).ok()));

    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::Object(fields)) => questions_field(fields),
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            _ => None,
        })
        .take(limit)
        .collect()
}

fn questions_field(mut fields: Map<String, Value>) -> Vec<Value> {
    if let Some(Value::Array(items)) = fields.remove("questions") {
        return items;
    }
    fields
        .into_iter()
        .find_map(|(_, value)| match value {
            Value::Array(items) if items.iter().any(Value::is_string) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
}

fn decode_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

/// The outermost `open ... close` span, for replies that wrap JSON in prose.
fn embedded_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn answer_from_fields(fields: &Map<String, Value>, raw: &str) -> Answer {
    let text = match fields.get("answer") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => raw.to_string(),
    };

    let can_answer = match fields.get("canAnswer") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().parse::<bool>().unwrap_or(true),
        _ => true,
    };

    let confidence = match fields.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(DEFAULT_CONFIDENCE),
        _ => DEFAULT_CONFIDENCE,
    };

    let reasoning = match fields.get("reasoning") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => DEFAULT_REASONING.to_string(),
    };

    Answer::new(text, can_answer, confidence, reasoning)
}
