//! Repair passes applied to candidate JSON text.
//!
//! Each pass is a pure text transform targeting one class of LLM output
//! malformation. The pipeline applies every pass to the *original* extracted
//! candidate (passes are never composed) in a fixed order from cheapest and
//! safest to most destructive, and accepts the first result that parses into
//! a non-null object or array. Order matters: the late passes strip
//! characters wholesale and can destroy legitimate content, so the targeted
//! repairs must get their chance first.

/// A single repair pass over candidate JSON text.
pub trait RepairPass: Send + Sync + std::fmt::Debug {
    /// Returns the name of this pass for diagnostics.
    fn name(&self) -> &'static str;

    /// Applies the transform. Must be pure and must leave text that already
    /// satisfies the pass's target condition unchanged.
    fn apply(&self, input: &str) -> String;
}

/// Returns the repair passes in their fixed priority order.
pub fn repair_passes() -> Vec<Box<dyn RepairPass>> {
    vec![
        Box::new(Unmodified),
        Box::new(EscapeStrayQuotes),
        Box::new(InsertMissingCommas),
        Box::new(EscapeNewlines),
        Box::new(NormalizeTypography),
        Box::new(StripControlChars),
        Box::new(StripControlCharsAggressive),
        Box::new(StripNonPrintable),
    ]
}

/// Pass 1: parse the text as-is.
#[derive(Debug, Clone, Default)]
pub struct Unmodified;

impl RepairPass for Unmodified {
    fn name(&self) -> &'static str {
        "none"
    }

    fn apply(&self, input: &str) -> String {
        input.to_string()
    }
}

/// Pass 2: escape quote characters embedded inside string values.
///
/// The common failure mode is a quoted phrase inside a description:
/// `"description": "The sign reads "Welcome" here"`. A quote inside a string
/// only terminates it when the next non-whitespace character is structural
/// (`,` `}` `]` `:`); every other in-string quote gets escaped.
#[derive(Debug, Clone, Default)]
pub struct EscapeStrayQuotes;

impl RepairPass for EscapeStrayQuotes {
    fn name(&self) -> &'static str {
        "escape-stray-quotes"
    }

    fn apply(&self, input: &str) -> String {
        escape_stray_quotes(input)
    }
}

/// Pass 3: insert a comma between adjacent structural tokens where a
/// sequence boundary was likely dropped (`}\n{`, `"` `"` and so on).
#[derive(Debug, Clone, Default)]
pub struct InsertMissingCommas;

impl RepairPass for InsertMissingCommas {
    fn name(&self) -> &'static str {
        "insert-missing-commas"
    }

    fn apply(&self, input: &str) -> String {
        insert_missing_commas(input)
    }
}

/// Pass 4: escape literal newlines, carriage returns, and tabs found inside
/// string values. Text outside strings is left untouched.
#[derive(Debug, Clone, Default)]
pub struct EscapeNewlines;

impl RepairPass for EscapeNewlines {
    fn name(&self) -> &'static str {
        "escape-newlines"
    }

    fn apply(&self, input: &str) -> String {
        escape_newlines_in_strings(input)
    }
}

/// Pass 5: replace typographic characters with plain ASCII equivalents.
#[derive(Debug, Clone, Default)]
pub struct NormalizeTypography;

impl RepairPass for NormalizeTypography {
    fn name(&self) -> &'static str {
        "normalize-typography"
    }

    fn apply(&self, input: &str) -> String {
        normalize_typography(input)
    }
}

/// Pass 6: escape in-string newlines, then remove control characters except
/// the whitespace JSON allows between tokens.
#[derive(Debug, Clone, Default)]
pub struct StripControlChars;

impl RepairPass for StripControlChars {
    fn name(&self) -> &'static str {
        "strip-control-chars"
    }

    fn apply(&self, input: &str) -> String {
        let protected = escape_newlines_in_strings(input);
        strip_control_chars(&protected, true)
    }
}

/// Pass 7: remove every control character, including newlines inside string
/// values, without protecting strings first. Data-lossy; a near-last resort
/// for input whose string boundaries can no longer be tracked.
#[derive(Debug, Clone, Default)]
pub struct StripControlCharsAggressive;

impl RepairPass for StripControlCharsAggressive {
    fn name(&self) -> &'static str {
        "strip-control-chars-aggressive"
    }

    fn apply(&self, input: &str) -> String {
        strip_control_chars(input, false)
    }
}

/// Pass 8: keep only printable ASCII plus basic whitespace, collapsing any
/// mangled escape-sequence runs left behind.
#[derive(Debug, Clone, Default)]
pub struct StripNonPrintable;

impl RepairPass for StripNonPrintable {
    fn name(&self) -> &'static str {
        "strip-non-printable"
    }

    fn apply(&self, input: &str) -> String {
        strip_non_printable(input)
    }
}

/// Escapes quote characters embedded inside string values.
pub fn escape_stray_quotes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if in_string && ch == '\\' {
            // Copy the escape sequence verbatim.
            out.push(ch);
            if i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        if ch == '"' {
            if !in_string {
                in_string = true;
                out.push(ch);
            } else {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let terminates =
                    j >= chars.len() || matches!(chars[j], ',' | '}' | ']' | ':');
                if terminates {
                    in_string = false;
                    out.push(ch);
                } else {
                    out.push_str("\\\"");
                }
            }
        } else {
            out.push(ch);
        }
        i += 1;
    }

    out
}

/// Inserts missing commas between adjacent elements.
///
/// After a closing `"`, `}`, or `]` at depth > 0, a following `"`, `{`, or
/// `[` starts a new element, so a comma is inserted between them.
pub fn insert_missing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;
    let mut depth: i32 = 0;

    while let Some(ch) = chars.next() {
        if escape_next {
            escape_next = false;
            out.push(ch);
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape_next = true;
                out.push(ch);
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
                if !in_string && depth > 0 {
                    maybe_insert_comma(&mut out, &mut chars);
                }
            }
            '{' | '[' if !in_string => {
                depth += 1;
                out.push(ch);
            }
            '}' | ']' if !in_string => {
                depth -= 1;
                out.push(ch);
                if depth > 0 {
                    maybe_insert_comma(&mut out, &mut chars);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Looks past whitespace for the start of a new element and inserts a comma
/// ahead of the buffered whitespace when one is due.
fn maybe_insert_comma(
    out: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) {
    let mut whitespace = String::new();
    while let Some(&next) = chars.peek() {
        if next.is_whitespace() {
            whitespace.push(next);
            chars.next();
        } else {
            break;
        }
    }
    if let Some(&next) = chars.peek() {
        if matches!(next, '"' | '{' | '[') {
            out.push(',');
        }
    }
    out.push_str(&whitespace);
}

/// Escapes literal newlines, carriage returns, and tabs inside string
/// values, tracking backslash escapes so already-escaped sequences are left
/// alone. The only string-boundary-aware newline fixer in the crate.
pub fn escape_newlines_in_strings(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut in_string = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            out.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape_next = true;
                out.push(ch);
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            '\t' if in_string => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }

    out
}

/// Replaces smart quotes, dashes, ellipses, and Unicode punctuation spaces
/// with ASCII equivalents, and drops C1 controls. Accented letters are
/// untouched.
pub fn normalize_typography(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2010}'..='\u{2015}' => out.push('-'),
            '\u{201A}' | '\u{201B}' | '\u{201E}' | '\u{201F}' => out.push('\''),
            '\u{2000}'..='\u{206F}' => out.push(' '),
            '\u{0080}'..='\u{009F}' => {}
            _ => out.push(ch),
        }
    }
    out
}

/// Removes control characters. With `keep_json_whitespace`, tab, newline,
/// and carriage return survive (they are legal between JSON tokens);
/// without it every control character goes, including newlines inside
/// string values.
pub fn strip_control_chars(input: &str, keep_json_whitespace: bool) -> String {
    input
        .chars()
        .filter(|&c| {
            if !c.is_control() {
                return true;
            }
            keep_json_whitespace && matches!(c, '\t' | '\n' | '\r')
        })
        .collect()
}

/// Keeps only printable ASCII plus basic whitespace, then collapses runs of
/// backslashes left over from mangled escape sequences.
pub fn strip_non_printable(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_backslash = false;
    for ch in input.chars() {
        if !matches!(ch, ' '..='~' | '\t' | '\n' | '\r') {
            continue;
        }
        if ch == '\\' {
            if prev_backslash {
                continue;
            }
            prev_backslash = true;
        } else {
            prev_backslash = false;
        }
        out.push(ch);
    }
    out
}
