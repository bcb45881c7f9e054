//! # Game Client
//!
//! Player-facing flows built on the sync service: login, registration,
//! exploring, renaming and logout. Each flow talks to the
//! [`IdentityProvider`] for authentication, to [`ProfileSyncService`] for
//! everything touching the profile, and to a [`SceneRouter`] for navigation.
//!
//! ```rust,no_run
//! use playerstats::app::GameClient;
//! use playerstats::config::Config;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let client = GameClient::from_config(&Config::default())?;
//! let profile = client.login("ann@example.com", "secret1").await?;
//! println!("{}", client.profile_view().expect("signed in"));
//! # let _ = profile;
//! # Ok(())
//! # }
//! ```

mod scene;
mod view;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use log::{info, warn};
use thiserror::Error;

use crate::config::{Config, ExploreConfig, StorageBackend};
use crate::errors::SyncError;
use crate::identity::{AuthAction, AuthError, IdentityProvider, LocalIdentityProvider, Principal};
use crate::progression::{ProfileRecord, ProgressionDelta};
use crate::session::{SessionError, SessionState};
use crate::store::{MemoryProfileStore, RemoteProfileStore, SledProfileStore};
use crate::sync::{ProfileSyncService, RenameOutcome};
use crate::validation::{mask_email, validate_player_name, UsernameError};

pub use scene::{LogRouter, Scene, SceneRouter};
pub use view::ProfileView;

/// Failure of a client flow, carrying enough context to pick the player-facing text.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{error}")]
    Auth {
        #[source]
        error: AuthError,
        action: AuthAction,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Local form check failed before any collaborator was contacted.
    #[error("{0}")]
    Form(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("unknown explore site '{0}'")]
    UnknownSite(String),
}

impl ClientError {
    fn auth(error: AuthError, action: AuthAction) -> Self {
        ClientError::Auth { error, action }
    }

    pub fn user_message(&self) -> String {
        match self {
            ClientError::Auth { error, action } => error.user_message(*action).to_string(),
            ClientError::Sync(e) => e.user_message(),
            ClientError::Form(msg) => msg.clone(),
            ClientError::NotSignedIn => "Please log in first".to_string(),
            ClientError::UnknownSite(site) => format!("Nothing to explore at {site}"),
        }
    }
}

/// Input of the registration scene.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegistrationForm {
    /// Checks done before the identity provider is contacted. Returns the
    /// normalized username.
    pub fn check(&self) -> Result<String, ClientError> {
        let username = validate_player_name(&self.username).map_err(|e| match e {
            UsernameError::Missing => ClientError::Form("Missing username".to_string()),
            other => ClientError::Form(other.to_string()),
        })?;
        if self.password != self.password_confirm {
            return Err(ClientError::Form("Password doesn't match".to_string()));
        }
        Ok(username)
    }
}

pub struct GameClient {
    identity: Arc<dyn IdentityProvider>,
    sync: ProfileSyncService,
    router: Arc<dyn SceneRouter>,
    explore: ExploreConfig,
    start_scene: Scene,
}

impl GameClient {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sync: ProfileSyncService,
        router: Arc<dyn SceneRouter>,
    ) -> Self {
        Self {
            identity,
            sync,
            router,
            explore: ExploreConfig::default(),
            start_scene: Scene::Home,
        }
    }

    pub fn with_explore(mut self, explore: ExploreConfig) -> Self {
        self.explore = explore;
        self
    }

    pub fn with_start_scene(mut self, scene: Scene) -> Self {
        self.start_scene = scene;
        self
    }

    /// Wire up the configured storage backend, a local identity provider and a [`LogRouter`].
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let params = config
            .security
            .as_ref()
            .and_then(|s| s.argon2.as_ref())
            .map(|a| a.params())
            .transpose()?;
        let min_password_length = config.min_password_length();

        let (store, identity): (Arc<dyn RemoteProfileStore>, Arc<dyn IdentityProvider>) =
            match config.storage.backend {
                StorageBackend::Sled => {
                    let store = SledProfileStore::open(config.storage.profiles_path())
                        .context("opening profile store")?;
                    let identity = LocalIdentityProvider::open_with_params(
                        config.storage.accounts_path(),
                        params,
                        min_password_length,
                    )
                    .map_err(|e| anyhow!("opening account store: {e}"))?;
                    let store: Arc<dyn RemoteProfileStore> = Arc::new(store);
                    let identity: Arc<dyn IdentityProvider> = Arc::new(identity);
                    (store, identity)
                }
                StorageBackend::Memory => {
                    let identity = LocalIdentityProvider::temporary(params, min_password_length)
                        .map_err(|e| anyhow!("opening account store: {e}"))?;
                    let store: Arc<dyn RemoteProfileStore> = Arc::new(MemoryProfileStore::new());
                    let identity: Arc<dyn IdentityProvider> = Arc::new(identity);
                    (store, identity)
                }
            };

        let sync = ProfileSyncService::builder(store, identity.clone(), SessionState::new())
            .cache_max_age(config.sync.cache_max_age())
            .build();
        Ok(Self::new(identity, sync, Arc::new(LogRouter::new()))
            .with_explore(config.explore.clone())
            .with_start_scene(config.game.start_scene))
    }

    pub fn session(&self) -> &SessionState {
        self.sync.session()
    }

    pub fn sync(&self) -> &ProfileSyncService {
        &self.sync
    }

    pub fn profile_view(&self) -> Option<ProfileView> {
        self.session().current().as_ref().map(ProfileView::from)
    }

    fn signed_in(&self) -> Result<Principal, ClientError> {
        self.session().principal().ok_or(ClientError::NotSignedIn)
    }

    /// Sign in, load (or create) the profile, start the session and open the start scene.
    pub async fn login(&self, email: &str, password: &str) -> Result<ProfileRecord, ClientError> {
        if let Some(active) = self.session().principal() {
            return Err(SyncError::from(SessionError::AlreadyActive {
                user_id: active.user_id,
            })
            .into());
        }
        let principal = self
            .identity
            .sign_in(email, password)
            .await
            .map_err(|e| ClientError::auth(e, AuthAction::SignIn))?;

        let profile = match self
            .sync
            .bootstrap_profile(&principal.user_id, principal.display_name.as_deref())
            .await
            .and_then(|profile| {
                self.sync
                    .begin_session(principal.clone(), profile.clone())
                    .map(|_| profile)
            }) {
            Ok(profile) => profile,
            Err(e) => {
                if let Err(sign_out) = self.identity.sign_out(&principal).await {
                    warn!("sign-out after failed login for {} failed: {}", principal.user_id, sign_out);
                }
                return Err(e.into());
            }
        };

        info!("{} logged in", mask_email(&principal.email));
        self.router.navigate_to(self.start_scene);
        Ok(profile)
    }

    /// Create an account and its profile record. Does not sign the player in;
    /// returns the confirmation message shown by the registration scene.
    pub async fn register(&self, form: &RegistrationForm) -> Result<String, ClientError> {
        let username = form.check()?;
        let principal = self
            .identity
            .sign_up(&form.email, &form.password)
            .await
            .map_err(|e| ClientError::auth(e, AuthAction::SignUp))?;

        // No profile is written unless the display name took.
        let created = match self.identity.set_display_name(&principal, &username).await {
            Ok(_) => self
                .sync
                .bootstrap_profile(&principal.user_id, Some(&username))
                .await
                .map(|_| ())
                .map_err(ClientError::from),
            Err(e) => Err(ClientError::auth(e, AuthAction::UpdateProfile)),
        };
        if let Err(e) = self.identity.sign_out(&principal).await {
            warn!("sign-out after registration of {} failed: {}", principal.user_id, e);
        }
        created?;

        Ok(format!(
            "User register successfully: {}, {}",
            username, principal.email
        ))
    }

    /// Grant the reward of the named explore site, then return Home.
    pub async fn explore(&self, site: &str) -> Result<ProfileRecord, ClientError> {
        let reward = self
            .explore
            .site(site)
            .map(|s| s.reward())
            .ok_or_else(|| ClientError::UnknownSite(site.trim().to_string()))?;
        let updated = self.grant(reward).await?;
        self.router.navigate_to(Scene::Home);
        Ok(updated)
    }

    /// Apply an arbitrary progression delta to the signed-in player.
    pub async fn grant(&self, delta: ProgressionDelta) -> Result<ProfileRecord, ClientError> {
        let principal = self.signed_in()?;
        Ok(self
            .sync
            .apply_and_persist(&principal.user_id, delta)
            .await?)
    }

    pub async fn rename(&self, new_username: &str) -> Result<RenameOutcome, ClientError> {
        let principal = self.signed_in()?;
        Ok(self
            .sync
            .rename_user(&principal.user_id, new_username)
            .await?)
    }

    /// Sign out, clear the session and go back to Login. Logging out twice is harmless.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(principal) = self.session().principal() {
            if let Err(e) = self.identity.sign_out(&principal).await {
                warn!("sign-out of {} failed: {}", principal.user_id, e);
            }
            self.sync.end_session();
            info!("{} logged out", mask_email(&principal.email));
        }
        self.router.navigate_to(Scene::Login);
        Ok(())
    }
}
