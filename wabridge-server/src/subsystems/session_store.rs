//! Per-user session registry
//!
//! Binds a sender id to the session id used as conversation context on the
//! agent side. Entries are created on first lookup and only ever removed by
//! `sweep`; after removal the next lookup silently starts a new conversation.
//!
//! The map lives behind a single mutex and the check-then-insert in
//! `get_or_create` runs inside one critical section, so two concurrent
//! messages from the same sender always observe the same session id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use wabridge_core::config::SessionConfig;
use wabridge_core::Session;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    refresh_on_access: bool,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            refresh_on_access: config.refresh_on_access,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // Every critical section leaves the map consistent, so a panic in
        // another holder does not invalidate it.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_or_create(&self, user_id: &str) -> String {
        self.get_or_create_at(user_id, Utc::now())
    }

    /// Same as [`get_or_create`](Self::get_or_create) with an explicit clock.
    pub fn get_or_create_at(&self, user_id: &str, now: DateTime<Utc>) -> String {
        let mut sessions = self.lock();

        if let Some(existing) = sessions.get_mut(user_id) {
            if self.refresh_on_access {
                *existing = existing.with_timestamp(now);
            }
            return existing.session_id.clone();
        }

        let session = Session::new(user_id, now);
        let session_id = session.session_id.clone();
        sessions.insert(user_id.to_string(), session);
        tracing::debug!(user_id, session_id = %session_id, "Created session");
        session_id
    }

    pub fn get(&self, user_id: &str) -> Option<Session> {
        self.lock().get(user_id).cloned()
    }

    /// Remove every session at least `max_idle` old. Returns how many were removed.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        self.sweep_at(Utc::now(), max_idle)
    }

    pub fn sweep_at(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.age(now) < max_idle);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
