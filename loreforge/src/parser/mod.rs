//! Parser module that turns raw LLM responses into structured JSON values.
//!
//! The pipeline has three stages: locate a candidate JSON substring
//! ([`extract`]), run it through the ordered repair passes ([`repairs`])
//! until one parses into a non-null object or array, and, only when every
//! pass has failed, scrape a minimal result straight out of the raw text
//! ([`emergency`]).

pub mod emergency;
pub mod extract;
pub mod repairs;

pub use emergency::CallerKind;
pub use extract::{extract_json_candidate, Candidate};
pub use repairs::{repair_passes, RepairPass};

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::ParseError;

/// Parses a raw LLM response into a JSON value.
///
/// `caller` is a label identifying the generation task that produced the
/// text (for example `"generateLandmarkJSON"`); it appears in diagnostics and
/// selects the emergency-extraction profile when all repairs fail.
///
/// The result is guaranteed to be a non-null object or array. Field-level
/// schema validation is the caller's responsibility, as is supplying fallback
/// content when this function errors.
///
/// # Errors
///
/// Returns [`ParseError::NoJsonFound`] when the text contains no JSON-shaped
/// substring at all (no repair is attempted in that case), and
/// [`ParseError::RepairsExhausted`] when every repair pass and the emergency
/// extractor failed.
pub fn parse_json_response(response: &str, caller: &str) -> Result<Value, ParseError> {
    let candidate = extract_json_candidate(response).ok_or_else(|| {
        warn!(caller, "no JSON structure found in response");
        ParseError::NoJsonFound {
            caller: caller.to_string(),
        }
    })?;
    debug!(
        caller,
        pattern = candidate.pattern,
        len = candidate.text.len(),
        "extracted candidate JSON"
    );

    for pass in repair_passes() {
        let attempt = pass.apply(&candidate.text);
        match serde_json::from_str::<Value>(&attempt) {
            Ok(value) if is_structured(&value) => {
                if pass.name() != "none" {
                    debug!(caller, pass = pass.name(), "parsed after repair");
                }
                return Ok(value);
            }
            Ok(_) => {
                warn!(
                    caller,
                    pass = pass.name(),
                    "parsed to a non-structural value, skipping"
                );
            }
            Err(err) => {
                let (position, context) = describe_parse_error(&attempt, &err);
                warn!(
                    caller,
                    pass = pass.name(),
                    position,
                    context = %context,
                    error = %err,
                    "repair pass failed to parse"
                );
            }
        }
    }

    warn!(caller, "all repair passes failed, trying emergency extraction");
    if let Some(kind) = CallerKind::from_label(caller) {
        if let Some(value) = emergency::emergency_extract(response, kind) {
            warn!(caller, ?kind, "emergency extraction produced a partial result");
            return Ok(value);
        }
    }

    error!(
        caller,
        raw_len = response.len(),
        "every parse attempt failed, including emergency extraction"
    );
    Err(ParseError::repairs_exhausted(caller, response))
}

/// The structural validator: accepts only non-null maps and sequences.
#[inline]
fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Locates a parse error within the attempted text and returns the character
/// offset plus a short window of surrounding characters for the log line.
fn describe_parse_error(text: &str, err: &serde_json::Error) -> (usize, String) {
    let line = err.line().max(1);
    let column = err.column();

    let mut offset = 0usize;
    for (index, l) in text.split('\n').enumerate() {
        if index + 1 == line {
            offset += column.min(l.chars().count() + 1).saturating_sub(1);
            break;
        }
        offset += l.chars().count() + 1;
    }

    let chars: Vec<char> = text.chars().collect();
    let offset = offset.min(chars.len());
    let start = offset.saturating_sub(10);
    let end = (offset + 10).min(chars.len());
    let context: String = chars[start..end].iter().collect();

    (offset, context)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_clean_response_parses_without_repair() {
        let response = r#"{"tavern": {"name": "The Gilded Eel"}}"#;
        let value = parse_json_response(response, "generateTavernJSON").unwrap();
        assert_eq!(value, json!({"tavern": {"name": "The Gilded Eel"}}));
    }

    #[test]
    fn test_structural_validator_rejects_scalars() {
        assert!(is_structured(&json!({"a": 1})));
        assert!(is_structured(&json!([1, 2])));
        assert!(!is_structured(&json!(null)));
        assert!(!is_structured(&json!("text")));
        assert!(!is_structured(&json!(42)));
    }

    #[test]
    fn test_no_json_is_reported_without_repair() {
        let err = parse_json_response("nothing structured here", "generateShopsBatchJSON")
            .unwrap_err();
        match err {
            ParseError::NoJsonFound { caller } => {
                assert_eq!(caller, "generateShopsBatchJSON");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bare_scalar_in_braces_exhausts_repairs() {
        // Extraction finds a span, but nothing ever parses into an object or
        // array, and no emergency profile matches this caller label.
        let err = parse_json_response("{,}", "generateBurgDescriptionJSON").unwrap_err();
        assert!(matches!(err, ParseError::RepairsExhausted { .. }));
    }

    #[test]
    fn test_describe_parse_error_points_at_problem() {
        let text = "{\"a\": 1,\n\"b\": oops}";
        let err = serde_json::from_str::<serde_json::Value>(text).unwrap_err();
        let (position, context) = describe_parse_error(text, &err);
        assert!(position > 8, "position {position} should be on line 2");
        assert!(context.contains("oops") || context.contains("\"b\""));
    }
}
