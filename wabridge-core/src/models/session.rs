use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation continuity token for one user.
///
/// The `session_id` also keys the conversation context on the agent side, so
/// replacing it starts a fresh conversation there too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: Uuid::new_v4().simple().to_string(),
            created_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    pub fn with_timestamp(&self, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            created_at,
        }
    }
}
