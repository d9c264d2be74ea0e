//! QR payload resolution.
//!
//! Turns the text a decoder produced into a redemption token and, when the
//! payload carries one, an event id. Tickets in the wild come in five
//! encodings, tried in a fixed order:
//!
//! ```text
//! 1. Tagged      T:<token>|E:<eventId>|S:<studentId>
//! 2. URL         https://host/path?token=..&eventId=..   (or /events/<id>/ in the path)
//! 3. JSON        {"token": .., "eventId"|"eid": ..}
//! 4. Key/value   token=..;eventId=..   (separators ; , & # whitespace, `:` or `=`)
//! 5. Embedded    free text containing /events/<id> and token=..
//! ```
//!
//! The first detector that matches wins. The tagged format is our own
//! canonical encoding, so it goes first and is never shadowed by a looser
//! detector. When nothing matches, the trimmed payload itself is the token.

use checkin_protocol::{integer_from_str, integer_from_value};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patterns::{
    RE_EMBEDDED_TOKEN, RE_EVENT_PATH_ANYWHERE, RE_EVENT_PATH_SEGMENT, RE_PAIR_SEPARATOR,
};

/// Text exactly as the decoder produced it.
pub type RawPayload = String;

const TOKEN_KEYS: [&str; 2] = ["token", "t"];
const EVENT_KEYS: [&str; 3] = ["eventid", "eid", "event"];
const URL_EVENT_KEYS: [&str; 3] = ["eventId", "eid", "event"];

/// Token and optional event id recovered from a payload.
///
/// `token` is `None` only when the payload was blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTicket {
    pub token: Option<String>,
    pub event_id: Option<i64>,
}

impl ResolvedTicket {
    fn new(token: String, event_id: Option<i64>) -> Self {
        Self {
            token: Some(token),
            event_id,
        }
    }
}

/// Which encoding a payload was read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Tagged,
    Url,
    Json,
    KeyValue,
    Embedded,
    Raw,
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Tagged => write!(f, "tagged"),
            PayloadFormat::Url => write!(f, "url"),
            PayloadFormat::Json => write!(f, "json"),
            PayloadFormat::KeyValue => write!(f, "key_value"),
            PayloadFormat::Embedded => write!(f, "embedded"),
            PayloadFormat::Raw => write!(f, "raw"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub format: PayloadFormat,
    pub ticket: ResolvedTicket,
}

type Detector = fn(&str) -> Option<ResolvedTicket>;

const DETECTORS: [(PayloadFormat, Detector); 5] = [
    (PayloadFormat::Tagged, detect_tagged),
    (PayloadFormat::Url, detect_url),
    (PayloadFormat::Json, detect_json),
    (PayloadFormat::KeyValue, detect_key_value),
    (PayloadFormat::Embedded, detect_embedded),
];

/// Resolves a payload to its ticket. Total: never panics, any input works.
pub fn resolve(raw: &str) -> ResolvedTicket {
    detect(raw).ticket
}

/// Like [`resolve`], but also reports which encoding matched.
pub fn detect(raw: &str) -> Detection {
    let text = raw.trim();
    DETECTORS
        .iter()
        .find_map(|(format, detector)| {
            detector(text).map(|ticket| Detection {
                format: *format,
                ticket,
            })
        })
        .unwrap_or_else(|| Detection {
            format: PayloadFormat::Raw,
            ticket: fallback(text),
        })
}

fn fallback(text: &str) -> ResolvedTicket {
    ResolvedTicket {
        token: non_empty(text),
        event_id: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Detectors
// ─────────────────────────────────────────────────────────────────────────────

fn detect_tagged(text: &str) -> Option<ResolvedTicket> {
    if !text.starts_with("T:") {
        return None;
    }

    let mut token = None;
    let mut event_id = None;
    for segment in text.split('|') {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        match key.trim() {
            "T" if token.is_none() => token = non_empty(value),
            "E" if event_id.is_none() => event_id = integer_from_str(value),
            // S (student id) is part of the format but the backend reads it from the session.
            _ => {}
        }
    }

    token.map(|token| ResolvedTicket::new(token, event_id))
}

fn detect_url(text: &str) -> Option<ResolvedTicket> {
    let url = Url::parse(text).ok()?;
    let query_value = |keys: &[&str]| {
        keys.iter().find_map(|key| {
            url.query_pairs()
                .find(|(name, value)| name == key && !value.trim().is_empty())
                .map(|(_, value)| value.trim().to_string())
        })
    };

    let token = query_value(&TOKEN_KEYS)?;
    let event_id = query_value(&URL_EVENT_KEYS)
        .and_then(|value| integer_from_str(&value))
        .or_else(|| {
            RE_EVENT_PATH_SEGMENT
                .captures(url.path())
                .and_then(|caps| integer_from_str(&caps[1]))
        });

    Some(ResolvedTicket::new(token, event_id))
}

fn detect_json(text: &str) -> Option<ResolvedTicket> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;

    let token = object.get("token").and_then(stringify_token)?;
    let event = ["eventId", "eid"]
        .iter()
        .find_map(|key| object.get(*key).filter(|value| !value.is_null()))?;

    Some(ResolvedTicket::new(token, integer_from_value(event)))
}

fn detect_key_value(text: &str) -> Option<ResolvedTicket> {
    let pairs: Vec<(String, &str)> = RE_PAIR_SEPARATOR
        .split(text)
        .filter_map(split_pair)
        .collect();
    let lookup = |keys: &[&str]| {
        keys.iter().find_map(|key| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| *value)
        })
    };

    let token = lookup(&TOKEN_KEYS)?;
    let event = lookup(&EVENT_KEYS)?;
    Some(ResolvedTicket::new(token.to_string(), integer_from_str(event)))
}

fn detect_embedded(text: &str) -> Option<ResolvedTicket> {
    let event_id = RE_EVENT_PATH_ANYWHERE
        .captures(text)
        .and_then(|caps| integer_from_str(&caps[1]))?;
    let token = RE_EMBEDDED_TOKEN.captures(text)?[1].to_string();
    Some(ResolvedTicket::new(token, Some(event_id)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Splits `key=value` or `key:value` on whichever delimiter comes first.
/// Keys are lowercased; pairs with an empty side are discarded.
fn split_pair(piece: &str) -> Option<(String, &str)> {
    let index = piece.find([':', '='])?;
    let key = piece[..index].trim();
    let value = piece[index + 1..].trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_ascii_lowercase(), value))
}

fn stringify_token(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
