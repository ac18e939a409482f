use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::jwt::TokenKind;

/// A single "current token" slot. Liveness is tracked beside the value, so a
/// blacklisted slot still remembers what it held.
#[derive(Debug, Default, Clone)]
struct TokenSlot {
    value: Option<String>,
    live: bool,
}

impl TokenSlot {
    fn set(&mut self, token: String) {
        self.value = Some(token);
        self.live = true;
    }

    fn get(&self) -> Option<String> {
        if self.live { self.value.clone() } else { None }
    }

    fn blacklist(&mut self) -> Option<String> {
        let was_live = std::mem::replace(&mut self.live, false);
        if was_live { self.value.clone() } else { None }
    }
}

#[derive(Debug, Default, Clone)]
struct SessionEntry {
    access: TokenSlot,
    secret: TokenSlot,
    expires_at: i64, // the session's secret token `exp`
}

impl SessionEntry {
    fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    fn slot_mut(&mut self, kind: TokenKind) -> &mut TokenSlot {
        match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Secret => &mut self.secret,
        }
    }

    fn slot(&self, kind: TokenKind) -> &TokenSlot {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Secret => &self.secret,
        }
    }
}

/// Process-local record of the current access/secret token per login session,
/// keyed by the `sid` claim both tokens carry.
///
/// Not authoritative: the revocation store is the source of truth across
/// instances and restarts. Every operation takes the lock for an in-memory
/// read or write only; callers never hold it across storage I/O.
///
/// An entry lives until logout clears it or its secret token expires.
/// Expired entries read as empty and are dropped whenever a new session is
/// added.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `token` as current for `(session, kind)`. The previous value
    /// simply stops being current; it is not revoked. `expires_at` is the
    /// session's end in unix seconds.
    pub fn set(&self, session: &str, kind: TokenKind, token: String, expires_at: i64) {
        self.set_at(session, kind, token, expires_at, Utc::now().timestamp());
    }

    fn set_at(&self, session: &str, kind: TokenKind, token: String, expires_at: i64, now: i64) {
        let mut entries = self.lock();
        if !entries.contains_key(session) {
            entries.retain(|_, entry| !entry.is_expired_at(now));
        }

        let entry = entries.entry(session.to_string()).or_default();
        entry.expires_at = entry.expires_at.max(expires_at);
        entry.slot_mut(kind).set(token);
    }

    pub fn get(&self, session: &str, kind: TokenKind) -> Option<String> {
        let now = Utc::now().timestamp();
        self.lock()
            .get(session)
            .filter(|entry| !entry.is_expired_at(now))
            .and_then(|entry| entry.slot(kind).get())
    }

    /// Marks the current token non-live and hands its value back so the caller
    /// can forward it to the revocation store.
    pub fn blacklist(&self, session: &str, kind: TokenKind) -> Option<String> {
        self.lock()
            .get_mut(session)
            .and_then(|entry| entry.slot_mut(kind).blacklist())
    }

    /// Blacklists both slots under one lock and drops the entry.
    pub fn clear(&self, session: &str) -> (Option<String>, Option<String>) {
        match self.lock().remove(session) {
            Some(mut entry) => (entry.access.blacklist(), entry.secret.blacklist()),
            None => (None, None),
        }
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        // Slots are plain values, a panic mid-update cannot leave them torn.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
