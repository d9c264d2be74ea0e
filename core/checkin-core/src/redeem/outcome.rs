use serde::{Deserialize, Serialize};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Check-in confirmed";
pub const NO_TICKET_MESSAGE: &str = "QR code did not contain a ticket";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No response was received.
    Network,
    /// Non-2xx status, or a body reporting `success: false`.
    ServerRejection,
    /// The payload held nothing worth sending.
    Invalid,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network"),
            FailureKind::ServerRejection => write!(f, "server_rejection"),
            FailureKind::Invalid => write!(f, "invalid"),
        }
    }
}

/// Result of one redemption attempt that actually ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    #[serde(rename_all = "camelCase")]
    Redeemed {
        event_id: Option<i64>,
        student_id: Option<String>,
        message: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

impl RedemptionOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        RedemptionOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RedemptionOutcome::Redeemed { .. })
    }

    /// The one line shown to the user for this attempt.
    pub fn summary(&self) -> String {
        match self {
            RedemptionOutcome::Redeemed {
                event_id,
                student_id,
                message,
            } => {
                let mut details = Vec::new();
                if let Some(event_id) = event_id {
                    details.push(format!("event {}", event_id));
                }
                if let Some(student_id) = student_id {
                    details.push(format!("student {}", student_id));
                }
                if details.is_empty() {
                    message.clone()
                } else {
                    format!("{} ({})", message, details.join(", "))
                }
            }
            RedemptionOutcome::Failed { message, .. } => message.clone(),
        }
    }
}
