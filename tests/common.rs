//! Test utilities & fixtures shared by the integration tests.

use std::sync::{Arc, Mutex};

use argon2::Params;
use async_trait::async_trait;
use playerstats::app::{GameClient, LogRouter};
use playerstats::config::{ExploreConfig, ExploreSite};
use playerstats::identity::{
    AuthError, AuthErrorKind, IdentityProvider, LocalIdentityProvider, Principal,
};
use playerstats::progression::UserId;
use playerstats::session::SessionState;
use playerstats::store::MemoryProfileStore;
use playerstats::sync::ProfileSyncService;

/// Cheap Argon2 parameters so tests do not spend seconds hashing.
#[allow(dead_code)]
pub fn fast_params() -> Option<Params> {
    Params::new(1024, 1, 1, None).ok()
}

#[allow(dead_code)]
pub fn principal(id: &str) -> Principal {
    Principal {
        user_id: UserId::new(id),
        email: format!("{id}@example.com"),
        display_name: None,
    }
}

/// Identity provider double that records display-name updates and can be told to fail them.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingIdentity {
    pub display_names: Mutex<Vec<(UserId, String)>>,
    pub fail_display_name: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingIdentity {
    pub fn names(&self) -> Vec<(UserId, String)> {
        self.display_names.lock().unwrap().clone()
    }

    pub fn fail_display_name(&self, fail: bool) {
        *self.fail_display_name.lock().unwrap() = fail;
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn sign_in(&self, email: &str, _password: &str) -> Result<Principal, AuthError> {
        let id = email.split('@').next().unwrap_or_default();
        Ok(principal(id))
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<Principal, AuthError> {
        let id = email.split('@').next().unwrap_or_default();
        Ok(principal(id))
    }

    async fn set_display_name(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<Principal, AuthError> {
        if *self.fail_display_name.lock().unwrap() {
            return Err(AuthError::unavailable("display name service down"));
        }
        self.display_names
            .lock()
            .unwrap()
            .push((principal.user_id.clone(), name.to_string()));
        let mut updated = principal.clone();
        updated.display_name = Some(name.to_string());
        Ok(updated)
    }

    async fn sign_out(&self, _principal: &Principal) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Sync service over an in-memory store and a recording identity double.
#[allow(dead_code)]
pub struct SyncFixture {
    pub store: Arc<MemoryProfileStore>,
    pub identity: Arc<RecordingIdentity>,
    pub session: SessionState,
    pub sync: ProfileSyncService,
}

#[allow(dead_code)]
pub fn sync_fixture() -> SyncFixture {
    let store = Arc::new(MemoryProfileStore::new());
    let identity = Arc::new(RecordingIdentity::default());
    let session = SessionState::new();
    let sync = ProfileSyncService::new(store.clone(), identity.clone(), session.clone());
    SyncFixture {
        store,
        identity,
        session,
        sync,
    }
}

#[allow(dead_code)]
pub fn explore_sites() -> ExploreConfig {
    ExploreConfig {
        sites: vec![
            ExploreSite {
                name: "forest".to_string(),
                xp: 15,
                gold: 10,
                diamond: 0,
            },
            ExploreSite {
                name: "cave".to_string(),
                xp: 25,
                gold: 5,
                diamond: 1,
            },
        ],
    }
}

/// Full client over a local identity provider in a temp dir and an in-memory profile store.
#[allow(dead_code)]
pub struct ClientFixture {
    pub _dir: tempfile::TempDir,
    pub store: Arc<MemoryProfileStore>,
    pub identity: Arc<LocalIdentityProvider>,
    pub router: Arc<LogRouter>,
    pub client: GameClient,
}

#[allow(dead_code)]
pub fn client_fixture() -> ClientFixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let identity = Arc::new(
        LocalIdentityProvider::open_with_params(dir.path().join("accounts"), fast_params(), 6)
            .expect("identity"),
    );
    let store = Arc::new(MemoryProfileStore::new());
    let router = Arc::new(LogRouter::new());
    let sync = ProfileSyncService::new(store.clone(), identity.clone(), SessionState::new());
    let client = GameClient::new(identity.clone(), sync, router.clone()).with_explore(explore_sites());
    ClientFixture {
        _dir: dir,
        store,
        identity,
        router,
        client,
    }
}
