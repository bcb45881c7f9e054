//! # Session State
//!
//! Holds the signed-in [`Principal`] and that player's last-known-good
//! [`ProfileRecord`]. A `SessionState` is created empty by the application
//! root and handed out as a cheap clone; every clone observes the same session.
//!
//! ## Lifecycle
//!
//! 1. **Empty** - process start, or after logout
//! 2. **Active** - populated exactly once per login
//! 3. **Empty** again on logout
//!
//! Anyone may read the session. Writes are crate-private and only
//! [`ProfileSyncService`](crate::sync::ProfileSyncService) performs them, so
//! progression fields have a single writer.
//!
//! Every transition bumps a generation counter. An in-flight sync captures the
//! generation when it starts and only publishes its result if the generation
//! is unchanged, so work finishing after a logout is discarded.
//!
//! The profile handed to a new session is not trusted as a sync base; the
//! first sync of every session reloads from the store.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::identity::Principal;
use crate::progression::{ProfileRecord, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session is already active for user {user_id}")]
    AlreadyActive { user_id: UserId },
}

#[derive(Debug, Clone)]
struct ActiveSession {
    principal: Principal,
    profile: ProfileRecord,
    /// When `profile` was last confirmed against the store; `None` before the
    /// first sync of the session and once invalidated.
    synced_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct SessionInner {
    active: Option<ActiveSession>,
    generation: u64,
}

/// Shared handle to the process's single player session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The active player's profile, if anyone is signed in.
    pub fn current(&self) -> Option<ProfileRecord> {
        self.read().active.as_ref().map(|s| s.profile.clone())
    }

    pub fn principal(&self) -> Option<Principal> {
        self.read().active.as_ref().map(|s| s.principal.clone())
    }

    pub fn is_active(&self) -> bool {
        self.read().active.is_some()
    }

    /// Whether the active session belongs to `user_id`.
    pub fn is_active_for(&self, user_id: &UserId) -> bool {
        self.read()
            .active
            .as_ref()
            .is_some_and(|s| &s.principal.user_id == user_id)
    }

    /// Monotonic counter bumped on every login and logout.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub(crate) fn set_active(
        &self,
        profile: ProfileRecord,
        principal: Principal,
    ) -> Result<u64, SessionError> {
        let mut inner = self.write();
        if let Some(active) = &inner.active {
            return Err(SessionError::AlreadyActive {
                user_id: active.principal.user_id.clone(),
            });
        }
        inner.generation += 1;
        // Unconfirmed until a sync publishes: the profile may have been read
        // before another in-flight update for this user landed.
        inner.active = Some(ActiveSession {
            principal,
            profile,
            synced_at: None,
        });
        Ok(inner.generation)
    }

    /// Drop the active session. Returns the principal that was signed in.
    pub(crate) fn clear(&self) -> Option<Principal> {
        let mut inner = self.write();
        let previous = inner.active.take()?;
        inner.generation += 1;
        Some(previous.principal)
    }

    /// Session copy of `user_id`'s profile if it was synced within `max_age`.
    pub(crate) fn fresh_profile(&self, user_id: &UserId, max_age: Duration) -> Option<ProfileRecord> {
        let inner = self.read();
        let active = inner.active.as_ref()?;
        if &active.principal.user_id != user_id {
            return None;
        }
        let synced_at = active.synced_at?;
        (synced_at.elapsed() <= max_age).then(|| active.profile.clone())
    }

    /// Publish a synced profile if the session is still the one seen at `generation`.
    pub(crate) fn publish(&self, generation: u64, profile: ProfileRecord) -> bool {
        let mut inner = self.write();
        if inner.generation != generation {
            return false;
        }
        match inner.active.as_mut() {
            Some(active) if &active.principal.user_id == profile.user_id() => {
                active.profile = profile;
                active.synced_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// Force the next sync for `user_id` to reload from the store.
    pub(crate) fn invalidate(&self, user_id: &UserId) {
        let mut inner = self.write();
        if let Some(active) = inner.active.as_mut() {
            if &active.principal.user_id == user_id {
                active.synced_at = None;
            }
        }
    }

    pub(crate) fn set_username(&self, user_id: &UserId, username: &str) {
        let mut inner = self.write();
        if let Some(active) = inner.active.as_mut() {
            if &active.principal.user_id == user_id {
                active.profile.username = username.to_string();
            }
        }
    }

    pub(crate) fn update_principal(&self, principal: Principal) {
        let mut inner = self.write();
        if let Some(active) = inner.active.as_mut() {
            if active.principal.user_id == principal.user_id {
                active.principal = principal;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str) -> Principal {
        Principal {
            user_id: UserId::new(id),
            email: format!("{id}@example.com"),
            display_name: None,
        }
    }

    #[test]
    fn starts_empty() {
        let session = SessionState::new();
        assert!(session.current().is_none());
        assert!(session.principal().is_none());
        assert_eq!(session.generation(), 0);
    }

    #[test]
    fn login_then_logout() {
        let session = SessionState::new();
        let uid = UserId::new("p1");
        session
            .set_active(ProfileRecord::new(uid.clone()), principal("p1"))
            .unwrap();
        assert!(session.is_active_for(&uid));
        assert_eq!(session.generation(), 1);

        let gone = session.clear().expect("was active");
        assert_eq!(gone.user_id, uid);
        assert!(session.current().is_none());
        assert_eq!(session.generation(), 2);
        assert!(session.clear().is_none(), "second logout is a no-op");
        assert_eq!(session.generation(), 2);
    }

    #[test]
    fn second_login_is_rejected() {
        let session = SessionState::new();
        session
            .set_active(ProfileRecord::new(UserId::new("p1")), principal("p1"))
            .unwrap();
        let err = session
            .set_active(ProfileRecord::new(UserId::new("p2")), principal("p2"))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::AlreadyActive {
                user_id: UserId::new("p1")
            }
        );
    }

    #[test]
    fn publish_after_logout_is_discarded() {
        let session = SessionState::new();
        let uid = UserId::new("p1");
        let generation = session
            .set_active(ProfileRecord::new(uid.clone()), principal("p1"))
            .unwrap();
        session.clear();
        let mut updated = ProfileRecord::new(uid);
        updated.gold = 10;
        assert!(!session.publish(generation, updated));
        assert!(session.current().is_none());
    }

    #[test]
    fn clones_share_state() {
        let session = SessionState::new();
        let view = session.clone();
        session
            .set_active(ProfileRecord::new(UserId::new("p1")), principal("p1"))
            .unwrap();
        assert!(view.is_active());
    }

    #[test]
    fn invalidated_profile_is_not_fresh() {
        let session = SessionState::new();
        let uid = UserId::new("p1");
        session
            .set_active(ProfileRecord::new(uid.clone()), principal("p1"))
            .unwrap();
        assert!(session.fresh_profile(&uid, Duration::from_secs(60)).is_none());
        assert!(session.publish(1, ProfileRecord::new(uid.clone())));
        assert!(session.fresh_profile(&uid, Duration::from_secs(60)).is_some());
        session.invalidate(&uid);
        assert!(session.fresh_profile(&uid, Duration::from_secs(60)).is_none());
        assert!(session.current().is_some(), "last-known-good value stays readable");
    }
}
