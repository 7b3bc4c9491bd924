//! Last-resort field scraping for responses no repair pass could save.
//!
//! Each generation task has a profile of regexes tuned to the field names its
//! prompt asked for. When the full pipeline fails, the profile rebuilds a
//! minimal structured value straight from the raw text, substituting literal
//! defaults for optional fields it cannot find. Callers must still handle
//! `None`: a profile gives up when even its required field is missing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// The generation task that produced a response.
///
/// Selecting the profile through an explicit tag avoids any ambiguity between
/// similarly named tasks; [`CallerKind::from_label`] exists for callers that
/// only carry a human-readable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    /// Historical event lists (`year` + `description` pairs).
    Events,
    /// Batched tavern generation.
    TavernsBatch,
    /// A single tavern.
    Tavern,
    /// A minor landmark.
    Landmark,
    /// A settlement leader.
    Leader,
    /// Batched shop generation.
    Shop,
}

impl CallerKind {
    /// Matches a caller label against the profile predicates.
    ///
    /// Predicates are checked in a fixed priority order, `tavernsbatch`
    /// before `tavern`, because the batch label contains the singular one.
    /// Matching is case-insensitive; the first hit wins.
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.to_lowercase();
        if lower.contains("events") {
            Some(Self::Events)
        } else if lower.contains("tavernsbatch") {
            Some(Self::TavernsBatch)
        } else if lower.contains("tavern") {
            Some(Self::Tavern)
        } else if lower.contains("landmark") {
            Some(Self::Landmark)
        } else if lower.contains("leader") {
            Some(Self::Leader)
        } else if lower.contains("shop") {
            Some(Self::Shop)
        } else {
            None
        }
    }
}

static EVENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""year":\s*(-?\d+),?\s*"description":\s*"([^"]*(?:[^"\\]|\\.)*)""#).unwrap()
});

static TAVERN_BATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)"type":\s*"([^"]*)".*?"name":\s*"([^"]*)".*?"innkeeper":\s*"([^"]*)".*?"signature":\s*"([^"]*)".*?"description":\s*"([^"]*(?:[^"\\]|\\.)*)""#,
    )
    .unwrap()
});

static SHOP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)"type":\s*"([^"]*)".*?"name":\s*"([^"]*)".*?"owner":\s*"([^"]*)".*?"description":\s*"([^"]*(?:[^"\\]|\\.)*)""#,
    )
    .unwrap()
});

// The single-record field regexes tolerate an unterminated value: no closing
// quote is required, so a response truncated mid-string still yields a name.
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""name":\s*"([^"]*(?:\\.[^"]*)*)"#).unwrap());
static INNKEEPER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""innkeeper":\s*"([^"]*(?:\\.[^"]*)*)"#).unwrap());
static SIGNATURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""signature":\s*"([^"]*(?:\\.[^"]*)*)"#).unwrap());
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""title":\s*"([^"]*(?:\\.[^"]*)*)"#).unwrap());
static DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""description":\s*"([^"]*(?:[^"\\]|\\.)*)(?:"|$)"#).unwrap());

/// Rebuilds a minimal structured value from raw response text.
///
/// Returns `None` when the profile's required field cannot be located; the
/// caller must then fall back to its own default content.
pub fn emergency_extract(raw: &str, kind: CallerKind) -> Option<Value> {
    match kind {
        CallerKind::Events => extract_events(raw),
        CallerKind::TavernsBatch => extract_taverns_batch(raw),
        CallerKind::Tavern => extract_tavern(raw),
        CallerKind::Landmark => extract_landmark(raw),
        CallerKind::Leader => extract_leader(raw),
        CallerKind::Shop => extract_shops(raw),
    }
}

fn extract_events(raw: &str) -> Option<Value> {
    let events: Vec<Value> = EVENT_RE
        .captures_iter(raw)
        .filter_map(|cap| {
            let year: i64 = cap[1].parse().ok()?;
            Some(json!({
                "year": year,
                "description": unescape_quotes(&cap[2]),
            }))
        })
        .collect();

    if events.is_empty() {
        return None;
    }
    Some(json!({ "events": events }))
}

fn extract_taverns_batch(raw: &str) -> Option<Value> {
    let taverns: Vec<Value> = TAVERN_BATCH_RE
        .captures_iter(raw)
        .map(|cap| {
            json!({
                "type": &cap[1],
                "name": &cap[2],
                "innkeeper": &cap[3],
                "signature": &cap[4],
                "description": unescape_quotes(&cap[5]),
            })
        })
        .collect();

    if taverns.is_empty() {
        return None;
    }
    Some(json!({ "taverns": taverns }))
}

fn extract_tavern(raw: &str) -> Option<Value> {
    let name = field(&NAME_RE, raw)?;
    let name = defaulted(&name, "The Local Tavern");
    let innkeeper = field(&INNKEEPER_RE, raw).unwrap_or_else(|| "The Keeper".to_string());
    let signature =
        field(&SIGNATURE_RE, raw).unwrap_or_else(|| "Local ale and hearty meals".to_string());
    let description = scraped_description(raw)
        .unwrap_or_else(|| "A welcoming establishment where locals gather.".to_string());

    Some(json!({
        "tavern": {
            "name": name,
            "innkeeper": innkeeper,
            "signature": signature,
            "description": description,
        }
    }))
}

fn extract_landmark(raw: &str) -> Option<Value> {
    let name = field(&NAME_RE, raw)?;
    let name = defaulted(&name, "Ancient Landmark");
    let description = scraped_description(raw)
        .unwrap_or_else(|| "A notable landmark in the area.".to_string());

    Some(json!({
        "landmark": {
            "name": name,
            "description": description,
        }
    }))
}

fn extract_leader(raw: &str) -> Option<Value> {
    let name = field(&NAME_RE, raw)?;
    let name = defaulted(&name, "Leader");
    let title = field(&TITLE_RE, raw).unwrap_or_else(|| "Leader".to_string());
    let description = scraped_description(raw)
        .unwrap_or_else(|| "A respected leader in the community.".to_string());

    Some(json!({
        "leader": {
            "name": name,
            "title": title,
            "description": description,
        }
    }))
}

fn extract_shops(raw: &str) -> Option<Value> {
    let shops: Vec<Value> = SHOP_RE
        .captures_iter(raw)
        .map(|cap| {
            json!({
                "type": &cap[1],
                "name": &cap[2],
                "owner": &cap[3],
                "description": unescape_quotes(&cap[4]),
            })
        })
        .collect();

    if shops.is_empty() {
        return None;
    }
    Some(json!({ "shops": shops }))
}

fn field(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw).map(|cap| cap[1].to_string())
}

fn scraped_description(raw: &str) -> Option<String> {
    DESCRIPTION_RE
        .captures(raw)
        .map(|cap| unescape_quotes(&cap[1]).trim().to_string())
}

fn defaulted(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Unescapes scraped quote sequences, then downgrades any remaining double
/// quotes to apostrophes so the value can never re-break downstream JSON.
fn unescape_quotes(value: &str) -> String {
    value.replace("\\\"", "\"").replace('"', "'")
}
