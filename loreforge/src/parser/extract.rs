//! Locating the most likely JSON substring in a raw response.

use once_cell::sync::Lazy;
use regex::Regex;

/// A candidate substring believed to encode a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The extracted text, trimmed.
    pub text: String,
    /// Name of the pattern that matched, for diagnostics.
    pub pattern: &'static str,
}

/// Extraction patterns in priority order; the first match wins.
///
/// Well-formed responses usually wrap JSON in a labeled fence; unlabeled
/// fences are the next most common; bare objects and arrays are the least
/// constrained to bound, so they come last.
static EXTRACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "fenced-json-object",
            Regex::new(r"(?is)```json\s*(\{.*?\})\s*```").unwrap(),
        ),
        (
            "fenced-object",
            Regex::new(r"(?s)```\s*(\{.*?\})\s*```").unwrap(),
        ),
        ("bare-object", Regex::new(r"(?s)(\{.*\})").unwrap()),
        (
            "fenced-json-array",
            Regex::new(r"(?is)```json\s*(\[.*?\])\s*```").unwrap(),
        ),
        (
            "fenced-array",
            Regex::new(r"(?s)```\s*(\[.*?\])\s*```").unwrap(),
        ),
        ("bare-array", Regex::new(r"(?s)(\[.*\])").unwrap()),
    ]
});

/// Finds the most likely JSON substring in `raw`.
///
/// Tries each extraction pattern in priority order; if none matches, falls
/// back to the widest span from the first `{` or `[` to the last `}` or `]`.
/// Returns `None` when the text contains no JSON-shaped span at all.
pub fn extract_json_candidate(raw: &str) -> Option<Candidate> {
    for &(name, ref pattern) in EXTRACTION_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(raw) {
            if let Some(matched) = captures.get(1) {
                let text = matched.as_str().trim();
                if !text.is_empty() {
                    return Some(Candidate {
                        text: text.to_string(),
                        pattern: name,
                    });
                }
            }
        }
    }

    widest_span(raw)
}

/// Last-resort scan: everything from the first opening brace/bracket to the
/// last closing one.
fn widest_span(raw: &str) -> Option<Candidate> {
    let start = raw.find(['{', '['])?;
    let end = raw.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    let text = raw[start..=end].trim();
    if text.is_empty() {
        return None;
    }
    Some(Candidate {
        text: text.to_string(),
        pattern: "brace-span",
    })
}
