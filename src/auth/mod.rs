//! Server-side sessions with an explicit expiry timestamp.
//!
//! A session is a real object held in a server-side store and passed around
//! by token, so expiry is enforced where the data lives rather than trusted
//! to the client.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use utoipa::ToSchema;

/// An authenticated session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds until expiry, clamped at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// In-memory session store keyed by opaque token.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Issues a fresh session for the given username.
    pub fn login(&self, username: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            token: generate_token(),
            username: username.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Looks up a session, evicting it when expired.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        let expired = match self.sessions.get(token) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.clone()),
            None => return None,
        };
        if expired {
            self.sessions.remove(token);
        }
        None
    }

    /// Revokes a session. Returns whether a live session was removed.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops every expired session. Called opportunistically from handlers.
    pub fn sweep(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, session| !session.is_expired(now));
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_issues_unique_tokens() {
        let store = SessionStore::new(3600);
        let a = store.login("ana");
        let b = store.login("ana");
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 64);
    }

    #[test]
    fn validate_returns_live_session() {
        let store = SessionStore::new(3600);
        let session = store.login("ana");
        let found = store.validate(&session.token).expect("session is live");
        assert_eq!(found.username, "ana");
        assert!(found.remaining_secs(Utc::now()) > 0);
    }

    #[test]
    fn expired_session_is_evicted_on_validate() {
        let store = SessionStore::new(0);
        let session = store.login("ana");
        assert!(store.validate(&session.token).is_none());
        // Second lookup hits the evicted entry.
        assert!(store.validate(&session.token).is_none());
    }

    #[test]
    fn logout_revokes_the_session() {
        let store = SessionStore::new(3600);
        let session = store.login("ana");
        assert!(store.logout(&session.token));
        assert!(!store.logout(&session.token));
        assert!(store.validate(&session.token).is_none());
    }

    #[test]
    fn sweep_drops_only_expired_sessions() {
        let store = SessionStore::new(0);
        let dead = store.login("old");
        let live_store = SessionStore::new(3600);
        let live = live_store.login("new");

        store.sweep();
        live_store.sweep();

        assert!(store.validate(&dead.token).is_none());
        assert!(live_store.validate(&live.token).is_some());
    }
}
