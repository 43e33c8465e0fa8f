use crate::store::{PersistentStore, StoreResult, keys};
use crate::types::SessionIdentity;
use std::sync::Arc;

/// What the chat surface should do at mount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateStatus {
    SignedIn(SessionIdentity),
    /// Show the blocking sign-in prompt. History still loads and renders.
    SignInRequired,
}

impl GateStatus {
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, GateStatus::SignInRequired)
    }
}

/// Reads and writes the identity marker. Presence is the whole check; the
/// client never validates expiry.
#[derive(Clone)]
pub struct SessionGate {
    store: Arc<dyn PersistentStore>,
}

impl SessionGate {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        let username = self.store.get(keys::USERNAME).filter(|u| !u.is_empty())?;
        let user_id = self.store.get(keys::USER_ID).unwrap_or_default();
        Some(SessionIdentity { user_id, username })
    }

    pub fn check(&self) -> GateStatus {
        match self.identity() {
            Some(identity) => GateStatus::SignedIn(identity),
            None => GateStatus::SignInRequired,
        }
    }

    pub fn sign_in(&self, identity: &SessionIdentity) -> StoreResult<()> {
        self.store.set(keys::USER_ID, &identity.user_id)?;
        self.store.set(keys::USERNAME, &identity.username)
    }

    /// Stable key correlating `/upload` and `/ask` for this profile. Created on
    /// first use.
    pub fn session_key(&self) -> String {
        if let Some(existing) = self.store.get(keys::SESSION_ID).filter(|k| !k.is_empty()) {
            return existing;
        }
        let key = uuid::Uuid::new_v4().to_string();
        if let Err(err) = self.store.set(keys::SESSION_ID, &key) {
            tracing::warn!(error = %err, "session key will not survive a reload");
        }
        key
    }
}
