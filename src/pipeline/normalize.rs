//! Normalisation: model response text → canonical [`DocumentRecord`].
//!
//! The model is asked for a JSON array with one object per page. What comes
//! back is folded into a single record:
//!
//! 1. Take the body of the first code fence (```` ```json ````, ```` ```python ````,
//!    bare ```` ``` ````) wherever it sits in the reply. Models add one, often
//!    with a sentence before or after it, regardless of instructions.
//! 2. Parse strictly as JSON. A lone object counts as a one-element list;
//!    anything that is not an object or a list of objects is a parse error.
//! 3. Start from an all-sentinel record and let every page's meaningful
//!    values overwrite it, in page order. `vendor_name` belongs to the
//!    conversation and is never taken from the model.
//! 4. `number_plates` is the exception: every distinct plate seen on any page
//!    is kept and joined with `/`.

use crate::error::IntakeError;
use crate::record::{is_meaningful, DocumentRecord, Field};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Parse and fold a raw extraction response.
pub fn normalize_response(text: &str) -> Result<DocumentRecord, IntakeError> {
    let records = parse_records(text)?;
    debug!("Extraction response holds {} record(s)", records.len());
    Ok(fold_records(&records))
}

// ── Step 1: fences ──────────────────────────────────────────────────────────

static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```").unwrap());

/// Body of the first fenced block in `input`, or the trimmed input when
/// there is none.
pub fn strip_code_fences(input: &str) -> &str {
    match RE_FENCED_BLOCK.captures(input) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str().trim()),
        None => input.trim(),
    }
}

// ── Step 2: strict parse ────────────────────────────────────────────────────

/// Parse the response into a list of JSON objects.
pub fn parse_records(text: &str) -> Result<Vec<Map<String, Value>>, IntakeError> {
    let body = strip_code_fences(text);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!("Unparseable extraction response: {:?}", text);
        IntakeError::ResponseParse {
            detail: format!("response is not valid JSON ({})", e),
        }
    })?;

    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(IntakeError::ResponseParse {
                    detail: format!("item {} is {}, expected an object", i, kind(&other)),
                }),
            })
            .collect(),
        other => Err(IntakeError::ResponseParse {
            detail: format!("expected an object or a list of objects, got {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// ── Steps 3–4: fold ─────────────────────────────────────────────────────────

/// Fold per-page records into one canonical record.
pub fn fold_records(records: &[Map<String, Value>]) -> DocumentRecord {
    let mut out = DocumentRecord::empty();
    let mut plates: Vec<String> = Vec::new();

    for record in records {
        for (key, value) in record {
            let field = match key.to_ascii_lowercase().parse::<Field>() {
                Ok(Field::VendorName) => {
                    debug!("Ignoring model-supplied '{}'", key);
                    continue;
                }
                Ok(field) => field,
                Err(_) => {
                    debug!("Ignoring unknown key '{}'", key);
                    continue;
                }
            };
            if field == Field::NumberPlates {
                collect_plates(value, &mut plates);
            } else if let Some(text) = scalar_text(value) {
                if is_meaningful(&text) {
                    out.set(field, text);
                }
            }
        }
    }

    if !plates.is_empty() {
        out.set(Field::NumberPlates, plates.join("/"));
    }
    out
}

/// Text of a scalar (or list of scalars) value; `None` for null / empty.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(scalar_text)
                .filter(|s| is_meaningful(s))
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

/// Add every distinct plate in `value` to `plates`, keeping first-seen order.
fn collect_plates(value: &Value, plates: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_plates(v, plates)),
        Value::String(s) => {
            for plate in s.split('/').map(str::trim) {
                if is_meaningful(plate) && !plates.iter().any(|p| p == plate) {
                    plates.push(plate.to_string());
                }
            }
        }
        Value::Number(n) => {
            let plate = n.to_string();
            if !plates.contains(&plate) {
                plates.push(plate);
            }
        }
        _ => {}
    }
}
