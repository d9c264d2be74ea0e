//! Caller identity from the persisted session store.
//!
//! The auth flow has written credentials in several shapes over time:
//!
//! ```text
//! storefront:auth  → {"accessToken"|"token"|"jwt": .., "role"|"roles": .., "userId"|"uid"|"id": ..}
//! accessToken      → bare token (legacy)
//! token            → bare token (legacy)
//! ```
//!
//! The primary key wins when it holds a usable object. When the stored object
//! lacks a role or user id, they are read from the token's claim set without
//! verifying its signature. Those values are UI hints only; the backend
//! authorizes the token itself.
//!
//! Resolution is total: every decode failure degrades the affected field to
//! `None`.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SessionKeys;
use crate::storage::KeyValueStore;

const TOKEN_FIELDS: [&str; 3] = ["accessToken", "token", "jwt"];
const STORED_USER_FIELDS: [&str; 3] = ["userId", "uid", "id"];
const CLAIM_USER_FIELDS: [&str; 4] = ["userId", "uid", "id", "sub"];
const STORED_ROLE_LISTS: [&str; 1] = ["roles"];
const CLAIM_ROLE_LISTS: [&str; 2] = ["roles", "authorities"];

/// A user id as stored: numeric when it is (or reads as) digits only,
/// otherwise kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Opaque(String),
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Numeric(id) => write!(f, "{}", id),
            UserId::Opaque(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAuth {
    pub token: Option<String>,
    pub role: Option<String>,
    pub user_id: Option<UserId>,
    /// From the unverified `exp` claim; display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// `Authorization` header value, when a token is present.
    pub fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {}", token))
    }

    /// Whether the token's own `exp` claim has passed. Unknown expiry is not expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Resolves the session with the default store keys.
pub fn resolve_session(store: &dyn KeyValueStore) -> SessionAuth {
    resolve_session_with_keys(store, &SessionKeys::default())
}

pub fn resolve_session_with_keys(store: &dyn KeyValueStore, keys: &SessionKeys) -> SessionAuth {
    let stored = read_primary(store, &keys.primary_key).unwrap_or_default();
    let token =
        token_from_object(&stored).or_else(|| read_legacy_token(store, &keys.legacy_keys));

    let claims = token.as_deref().and_then(decode_claims).unwrap_or_default();

    let role = role_from(&stored, &STORED_ROLE_LISTS)
        .or_else(|| role_from(&claims, &CLAIM_ROLE_LISTS));
    let user_id = user_id_from(&stored, &STORED_USER_FIELDS)
        .or_else(|| user_id_from(&claims, &CLAIM_USER_FIELDS));
    let expires_at = claims.get("exp").and_then(expiry_from_value);

    SessionAuth {
        token,
        role,
        user_id,
        expires_at,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store shapes
// ─────────────────────────────────────────────────────────────────────────────

fn read_primary(store: &dyn KeyValueStore, key: &str) -> Option<Map<String, Value>> {
    let raw = store.get(key)?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => {
            tracing::debug!(key = %key, "Primary session entry is not an object");
            None
        }
        Err(err) => {
            tracing::debug!(key = %key, error = %err, "Primary session entry is not JSON");
            None
        }
    }
}

fn read_legacy_token(store: &dyn KeyValueStore, keys: &[String]) -> Option<String> {
    keys.iter()
        .filter_map(|key| store.get(key))
        .find_map(|raw| unquote(&raw))
}

/// Legacy values are usually bare, but some writers JSON-encoded them.
fn unquote(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => inner,
        Ok(Value::Null) => return None,
        _ => trimmed.to_string(),
    };
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn token_from_object(object: &Map<String, Value>) -> Option<String> {
    TOKEN_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

fn role_from(object: &Map<String, Value>, lists: &[&str]) -> Option<String> {
    if let Some(role) = object.get("role").and_then(role_name) {
        return Some(role);
    }
    lists.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_array)
            .and_then(|roles| roles.first())
            .and_then(role_name)
    })
}

/// Accepts `"ADMIN"` or `{"authority": "ROLE_ADMIN"}` / `{"name": "ADMIN"}`.
fn role_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(name) => Some(name.as_str()),
        Value::Object(object) => ["authority", "name"]
            .iter()
            .find_map(|field| object.get(*field).and_then(Value::as_str)),
        _ => None,
    }?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn user_id_from(object: &Map<String, Value>, fields: &[&str]) -> Option<UserId> {
    fields
        .iter()
        .find_map(|field| object.get(*field).and_then(user_id_from_value))
}

fn user_id_from_value(value: &Value) -> Option<UserId> {
    match value {
        Value::Number(number) => Some(
            number
                .as_i64()
                .map(UserId::Numeric)
                .unwrap_or_else(|| UserId::Opaque(number.to_string())),
        ),
        Value::String(text) => Some(coerce_user_id(text)),
        _ => None,
    }
}

fn coerce_user_id(text: &str) -> UserId {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(id) = text.parse::<i64>() {
            return UserId::Numeric(id);
        }
    }
    UserId::Opaque(text.to_string())
}

fn expiry_from_value(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs as i64)
    })?;
    Utc.timestamp_opt(seconds, 0).single()
}

// ─────────────────────────────────────────────────────────────────────────────
// Unverified claims
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the claim set (middle segment) of a `header.claims.signature` token.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    let text = decode_base64_url(segments[1])?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(claims)) => Some(claims),
        _ => None,
    }
}

/// base64url → standard alphabet, padded to a multiple of four, decoded as UTF-8.
fn decode_base64_url(segment: &str) -> Option<String> {
    let mut normalized = segment.replace('-', "+").replace('_', "/");
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }
    let bytes = STANDARD.decode(normalized.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}
