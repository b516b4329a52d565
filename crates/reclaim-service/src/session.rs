//! Session token issuance for authenticated principals.
//!
//! The session layer is the boundary the core never sees: credentials are
//! verified once at login, an opaque bearer token is handed out, and every
//! request exchanges that token for the explicit [`Principal`] the core
//! operations take. Tokens live in process memory and die with the service.

use std::collections::HashMap;
use std::sync::Mutex;

use reclaim_core::Principal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Principal>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh opaque token for an authenticated principal.
    pub fn issue(&self, principal: Principal) -> Result<String, SessionError> {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .lock()
            .map_err(|_| SessionError::Poisoned)?
            .insert(token.clone(), principal);
        Ok(token)
    }

    pub fn resolve(&self, token: &str) -> Result<Option<Principal>, SessionError> {
        Ok(self
            .sessions
            .lock()
            .map_err(|_| SessionError::Poisoned)?
            .get(token)
            .cloned())
    }

    /// Drop a token. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> Result<bool, SessionError> {
        Ok(self
            .sessions
            .lock()
            .map_err(|_| SessionError::Poisoned)?
            .remove(token)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_resolve_revoke_round_trip() {
        let store = SessionStore::new();
        let token = store.issue(Principal::user("alice")).unwrap();

        let principal = store.resolve(&token).unwrap().unwrap();
        assert_eq!(principal.username, "alice");
        assert!(!principal.is_admin);

        assert!(store.revoke(&token).unwrap());
        assert!(store.resolve(&token).unwrap().is_none());
        assert!(!store.revoke(&token).unwrap());
    }

    #[test]
    fn tokens_are_unique_per_login() {
        let store = SessionStore::new();
        let first = store.issue(Principal::admin("root")).unwrap();
        let second = store.issue(Principal::admin("root")).unwrap();
        assert_ne!(first, second);
    }
}
