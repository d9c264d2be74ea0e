//! Wire types for the check-in redemption endpoint.
//!
//! Shared by the core library and its clients so the request body and the
//! tolerant response reading cannot drift apart. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const REDEEM_PATH: &str = "/api/qr/redeem";

/// Fields the backend may use to carry a human-readable failure reason,
/// checked in this order.
pub const ERROR_FIELDS: [&str; 3] = ["message", "error", "detail"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl RedeemRequest {
    pub fn new(token: impl Into<String>, event_id: Option<i64>) -> Self {
        Self {
            token: token.into(),
            event_id,
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.token.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "token is required"));
        }
        Ok(())
    }
}

/// Response body as read from the backend.
///
/// Every field is optional: the backend is not trusted to send a stable
/// shape, so the body is read field by field from a loose JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedeemReply {
    pub success: Option<bool>,
    pub event_id: Option<i64>,
    pub student_id: Option<String>,
    pub message: Option<String>,
    pub error_message: Option<String>,
}

impl RedeemReply {
    pub fn from_value(body: &Value) -> Self {
        Self {
            success: body.get("success").and_then(Value::as_bool),
            event_id: body.get("eventId").and_then(integer_from_value),
            student_id: body.get("studentId").and_then(scalar_to_string),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            error_message: first_error_message(body),
        }
    }

    /// True only when the body explicitly reports `success: false`.
    pub fn is_explicit_failure(&self) -> bool {
        self.success == Some(false)
    }
}

fn first_error_message(body: &Value) -> Option<String> {
    ERROR_FIELDS.iter().find_map(|field| {
        body.get(*field)
            .and_then(scalar_to_string)
            .filter(|value| !value.is_empty())
    })
}

/// Reads an integer from a JSON number or numeric string.
///
/// Only finite, integral values inside the `i64` range are accepted; `NaN`,
/// fractions, booleans and empty strings all read as `None`.
pub fn integer_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_f64)),
        Value::String(text) => integer_from_str(text),
        _ => None,
    }
}

pub fn integer_from_str(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(integral_f64))
}

fn integral_f64(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_missing_event_id() {
        let body = serde_json::to_value(RedeemRequest::new("abc", None)).unwrap();
        assert_eq!(body, json!({"token": "abc"}));
    }

    #[test]
    fn request_uses_camel_case_event_id() {
        let body = serde_json::to_value(RedeemRequest::new("abc", Some(9))).unwrap();
        assert_eq!(body, json!({"token": "abc", "eventId": 9}));
    }

    #[test]
    fn rejects_blank_token() {
        assert!(RedeemRequest::new("   ", None).validate().is_err());
    }

    #[test]
    fn accepts_long_token() {
        assert!(RedeemRequest::new("a".repeat(64 * 1024), None).validate().is_ok());
    }

    #[test]
    fn reply_reads_success_fields() {
        let reply = RedeemReply::from_value(&json!({
            "eventId": 9,
            "studentId": 42,
            "message": "Welcome"
        }));
        assert_eq!(reply.event_id, Some(9));
        assert_eq!(reply.student_id.as_deref(), Some("42"));
        assert_eq!(reply.message.as_deref(), Some("Welcome"));
        assert!(!reply.is_explicit_failure());
    }

    #[test]
    fn reply_error_message_prefers_message_over_detail() {
        let reply = RedeemReply::from_value(&json!({
            "success": false,
            "detail": "later",
            "message": "Ticket already used"
        }));
        assert!(reply.is_explicit_failure());
        assert_eq!(reply.error_message.as_deref(), Some("Ticket already used"));
    }

    #[test]
    fn reply_error_message_falls_back_to_detail() {
        let reply = RedeemReply::from_value(&json!({"detail": "Expired"}));
        assert_eq!(reply.error_message.as_deref(), Some("Expired"));
    }

    #[test]
    fn integer_rejects_fractions_and_blanks() {
        assert_eq!(integer_from_value(&json!(9.5)), None);
        assert_eq!(integer_from_value(&json!("")), None);
        assert_eq!(integer_from_value(&json!(true)), None);
        assert_eq!(integer_from_value(&json!(null)), None);
    }

    #[test]
    fn integer_accepts_numeric_strings() {
        assert_eq!(integer_from_value(&json!(" 12 ")), Some(12));
        assert_eq!(integer_from_value(&json!("3.0")), Some(3));
        assert_eq!(integer_from_value(&json!(7.0)), Some(7));
    }

    #[test]
    fn integer_rejects_non_finite_strings() {
        assert_eq!(integer_from_str("NaN"), None);
        assert_eq!(integer_from_str("inf"), None);
        assert_eq!(integer_from_str("abc"), None);
    }
}
