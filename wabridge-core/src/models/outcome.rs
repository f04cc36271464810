use serde::{Deserialize, Serialize};

use super::MessageKind;

/// What the gateway returned for an outbound send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Result of processing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing actionable in the event; no external calls were made.
    Idle { reason: String },
    /// Exactly one reply was delivered to the sender.
    Replied {
        sender_id: String,
        kind: MessageKind,
        receipt: SendReceipt,
    },
    /// Recognized but unhandled message type; dropped without a reply.
    Ignored { sender_id: String, kind: String },
}

impl Outcome {
    pub fn idle(reason: impl ToString) -> Self {
        Outcome::Idle {
            reason: reason.to_string(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Outcome::Idle { .. })
    }
}
