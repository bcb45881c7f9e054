//! # Profile Sync Service
//!
//! Bridges the pure [`ProgressionEngine`] to a [`RemoteProfileStore`]:
//! load, compute, write back, then publish to the [`SessionState`].
//!
//! ## Guarantees
//!
//! - **Field-level writes**: only stat fields whose value changed are written,
//!   one `set_field` each. `username` is never touched by progression updates.
//! - **Per-user serialization**: calls for the same user queue behind each
//!   other, so the second call always starts from the first call's result.
//! - **No automatic retry**: a store failure is returned as
//!   [`SyncError::Store`]. Retrying after an ambiguous failure can double-count
//!   a delta; callers decide.
//! - **Last-known-good session**: on failure the session profile is left as it
//!   was (and marked stale so the next call reloads from the store).
//! - **Completion after cancellation**: `apply_and_persist` runs on its own
//!   task. Dropping the caller's future does not abort the write; the result
//!   still lands in the session unless a logout happened meanwhile.

mod locks;
mod phase;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::errors::SyncError;
use crate::identity::{AuthAction, IdentityProvider, Principal};
use crate::metrics;
use crate::progression::{ProfileField, ProfileRecord, ProgressionDelta, ProgressionEngine, UserId};
use crate::session::SessionState;
use crate::store::{FieldValue, RemoteProfileStore};
use crate::validation::validate_player_name;

use locks::UserLocks;
use phase::PhaseTracker;
pub use phase::SyncPhase;

/// Default window during which the session copy of a profile is used instead
/// of reloading it from the store.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(30);

/// Result of [`ProfileSyncService::rename_user`]. The store write and the
/// identity provider write are independent; the second may fail on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Both the profile record and the identity display name carry the new name.
    Complete,
    /// The profile record was renamed but the identity provider still holds the
    /// old display name.
    IdentityNotUpdated { reason: String },
}

struct SyncInner {
    store: Arc<dyn RemoteProfileStore>,
    identity: Arc<dyn IdentityProvider>,
    session: SessionState,
    engine: ProgressionEngine,
    locks: UserLocks,
    cache_max_age: Duration,
}

/// Builder so callers (and tests) can tune the sync service before sharing it.
pub struct ProfileSyncServiceBuilder {
    store: Arc<dyn RemoteProfileStore>,
    identity: Arc<dyn IdentityProvider>,
    session: SessionState,
    cache_max_age: Duration,
}

impl ProfileSyncServiceBuilder {
    /// How long a session copy stays authoritative. `Duration::ZERO` always reloads.
    pub fn cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    pub fn build(self) -> ProfileSyncService {
        ProfileSyncService {
            inner: Arc::new(SyncInner {
                store: self.store,
                identity: self.identity,
                session: self.session,
                engine: ProgressionEngine::new(),
                locks: UserLocks::default(),
                cache_max_age: self.cache_max_age,
            }),
        }
    }
}

/// Single writer of profile progression, for the store and the session alike.
#[derive(Clone)]
pub struct ProfileSyncService {
    inner: Arc<SyncInner>,
}

impl ProfileSyncService {
    pub fn builder(
        store: Arc<dyn RemoteProfileStore>,
        identity: Arc<dyn IdentityProvider>,
        session: SessionState,
    ) -> ProfileSyncServiceBuilder {
        ProfileSyncServiceBuilder {
            store,
            identity,
            session,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    pub fn new(
        store: Arc<dyn RemoteProfileStore>,
        identity: Arc<dyn IdentityProvider>,
        session: SessionState,
    ) -> Self {
        Self::builder(store, identity, session).build()
    }

    /// Read-only view of the session this service writes to.
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.inner.engine
    }

    /// Fetch `user_id`'s record from the store. `Ok(None)` means the user has
    /// never been bootstrapped.
    pub async fn load_profile(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, SyncError> {
        let _guard = self.inner.locks.acquire(user_id).await;
        let loaded = self.inner.store.get_record(user_id).await.map_err(|e| {
            metrics::inc_sync_failures();
            warn!("loading profile {} failed: {}", user_id, e);
            SyncError::from(e)
        })?;
        metrics::inc_profiles_loaded();
        Ok(loaded)
    }

    /// Load `user_id`'s record, creating and persisting a zero-valued one first
    /// if none exists. `username` is only used when creating.
    pub async fn bootstrap_profile(
        &self,
        user_id: &UserId,
        username: Option<&str>,
    ) -> Result<ProfileRecord, SyncError> {
        let _guard = self.inner.locks.acquire(user_id).await;
        let existing = self.inner.store.get_record(user_id).await.map_err(|e| {
            metrics::inc_sync_failures();
            warn!("loading profile {} failed: {}", user_id, e);
            SyncError::from(e)
        })?;
        if let Some(existing) = existing {
            metrics::inc_profiles_loaded();
            return Ok(existing);
        }

        let mut record = ProfileRecord::new(user_id.clone());
        if let Some(name) = username {
            record.username = name.to_string();
        }
        for field in ProfileField::ALL {
            if let Err(e) = self
                .inner
                .store
                .set_field(user_id, field, record.field_value(field))
                .await
            {
                metrics::inc_sync_failures();
                warn!("bootstrapping profile {} failed at {}: {}", user_id, field, e);
                return Err(e.into());
            }
        }
        metrics::inc_profiles_bootstrapped();
        info!("bootstrapped profile for {}", user_id);
        Ok(record)
    }

    /// Populate the session after a successful sign-in.
    pub fn begin_session(&self, principal: Principal, profile: ProfileRecord) -> Result<(), SyncError> {
        if profile.user_id() != &principal.user_id {
            return Err(SyncError::Validation(
                "profile does not belong to the signed-in user".to_string(),
            ));
        }
        let user_id = principal.user_id.clone();
        let generation = self.inner.session.set_active(profile, principal)?;
        debug!("session {} started for {}", generation, user_id);
        Ok(())
    }

    /// Clear the session on logout. Returns the principal that was active.
    pub fn end_session(&self) -> Option<Principal> {
        let ended = self.inner.session.clear();
        if let Some(principal) = &ended {
            debug!("session ended for {}", principal.user_id);
        }
        ended
    }

    /// Apply `delta` to `user_id`'s profile and persist the changed fields.
    ///
    /// Calls for the same user are serialized. The work runs on a spawned task
    /// so it completes even if the returned future is dropped.
    pub async fn apply_and_persist(
        &self,
        user_id: &UserId,
        delta: ProgressionDelta,
    ) -> Result<ProfileRecord, SyncError> {
        let this = self.clone();
        let user_id = user_id.clone();
        let generation = self.inner.session.generation();
        let watched = self.inner.session.is_active_for(&user_id);
        tokio::spawn(async move {
            this.apply_serialized(user_id, delta, generation, watched)
                .await
        })
            .await
            .map_err(|e| SyncError::Internal(format!("sync task failed: {e}")))?
    }

    async fn apply_serialized(
        &self,
        user_id: UserId,
        delta: ProgressionDelta,
        generation: u64,
        watched: bool,
    ) -> Result<ProfileRecord, SyncError> {
        let started = Instant::now();
        let _guard = self.inner.locks.acquire(&user_id).await;
        let mut tracker = PhaseTracker::new(user_id.as_str());

        let result = self.load_compute_persist(&mut tracker, &user_id, delta).await;
        metrics::observe_sync_latency(started);

        let (before, after) = match result {
            Ok(pair) => pair,
            Err(e) => {
                tracker.advance(SyncPhase::Failed);
                metrics::inc_sync_failures();
                if matches!(e, SyncError::Store { .. }) {
                    self.inner.session.invalidate(&user_id);
                }
                warn!("sync for {} failed: {}", user_id, e);
                return Err(e);
            }
        };
        tracker.advance(SyncPhase::Done);

        metrics::inc_deltas_applied();
        let gained = after.level.saturating_sub(before.level);
        if gained > 0 {
            metrics::add_level_ups(u64::from(gained));
            info!("{} reached level {}", user_id, after.level);
        }

        if !self.inner.session.publish(generation, after.clone()) {
            // a re-login of the same user may hold a copy older than this write
            self.inner.session.invalidate(&user_id);
            if watched {
                metrics::inc_stale_results_discarded();
                debug!("session changed while syncing {}; result not published", user_id);
            }
        }
        Ok(after)
    }

    async fn load_compute_persist(
        &self,
        tracker: &mut PhaseTracker<'_>,
        user_id: &UserId,
        delta: ProgressionDelta,
    ) -> Result<(ProfileRecord, ProfileRecord), SyncError> {
        tracker.advance(SyncPhase::Loading);
        let base = match self
            .inner
            .session
            .fresh_profile(user_id, self.inner.cache_max_age)
        {
            Some(cached) => cached,
            None => self
                .inner
                .store
                .get_record(user_id)
                .await?
                .ok_or_else(|| SyncError::NotBootstrapped(user_id.clone()))?,
        };

        tracker.advance(SyncPhase::Computing);
        let updated = self.inner.engine.apply(&base, delta)?;

        tracker.advance(SyncPhase::Persisting);
        for field in base.changed_stats(&updated) {
            self.inner
                .store
                .set_field(user_id, field, updated.field_value(field))
                .await?;
        }
        Ok((base, updated))
    }

    /// Rename `user_id`: write the `username` field, then ask the identity
    /// provider to update its display name for the signed-in principal.
    pub async fn rename_user(
        &self,
        user_id: &UserId,
        new_username: &str,
    ) -> Result<RenameOutcome, SyncError> {
        let name = validate_player_name(new_username)
            .map_err(|e| SyncError::Validation(e.to_string()))?;

        {
            let _guard = self.inner.locks.acquire(user_id).await;
            self.inner
                .store
                .set_field(user_id, ProfileField::Username, FieldValue::Text(name.clone()))
                .await
                .map_err(|e| {
                    metrics::inc_sync_failures();
                    warn!("renaming {} failed: {}", user_id, e);
                    SyncError::from(e)
                })?;
            self.inner.session.set_username(user_id, &name);
        }
        metrics::inc_renames();
        info!(target: "security", "{} renamed to {}", user_id, name);

        let principal = self
            .inner
            .session
            .principal()
            .filter(|p| &p.user_id == user_id);
        let Some(principal) = principal else {
            return Ok(RenameOutcome::IdentityNotUpdated {
                reason: "not signed in".to_string(),
            });
        };
        match self.inner.identity.set_display_name(&principal, &name).await {
            Ok(updated) => {
                self.inner.session.update_principal(updated);
                Ok(RenameOutcome::Complete)
            }
            Err(e) => {
                warn!("display name update for {} failed: {}", user_id, e);
                Ok(RenameOutcome::IdentityNotUpdated {
                    reason: e.user_message(AuthAction::UpdateProfile).to_string(),
                })
            }
        }
    }
}
