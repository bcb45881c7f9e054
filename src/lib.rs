//! # Playerstats - Player Progression and Profile Sync
//!
//! Playerstats keeps a game client's player profile (level, xp, gold, diamond
//! and username) consistent between a remote field-addressable profile store
//! and the in-process session.
//!
//! ## Features
//!
//! - **Pure Progression Rules**: [`progression::ProgressionEngine`] applies rewards and level-ups with no I/O.
//! - **Field-Level Sync**: only changed fields are written, so a rename and a reward never clobber each other.
//! - **Per-User Serialization**: concurrent updates for one player queue instead of racing.
//! - **Explicit Session Handle**: [`session::SessionState`] is passed around, never global, with a single writer.
//! - **Local Collaborators**: sled-backed profile store and identity provider with Argon2id password hashes.
//! - **Async Design**: built on Tokio; sync work survives the caller going away.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playerstats::app::GameClient;
//! use playerstats::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let client = GameClient::from_config(&config)?;
//!
//!     client.login("ann@example.com", "secret1").await?;
//!     let profile = client.explore("forest").await?;
//!     println!("level {} xp {}", profile.level, profile.xp);
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`progression`] - profile record, deltas and the level-up rules
//! - [`store`] - remote profile store trait plus sled and in-memory backends
//! - [`identity`] - identity provider trait and the local sled implementation
//! - [`session`] - the signed-in player's session
//! - [`sync`] - load / compute / persist orchestration
//! - [`app`] - login, registration, explore, rename and logout flows
//! - [`config`] - configuration management
//! - [`validation`] - username, email and password checks
//! - [`errors`] - store and sync error types
//! - [`metrics`] - process-wide sync counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   GameClient    │ ← Player flows, scene routing
//! └─────────────────┘
//!          │
//! ┌─────────────────┐      ┌──────────────────┐
//! │ ProfileSync     │ ───→ │ SessionState     │
//! │ Service         │      └──────────────────┘
//! └─────────────────┘
//!          │
//! ┌─────────────────┐      ┌──────────────────┐
//! │ RemoteProfile   │      │ IdentityProvider │
//! │ Store           │      └──────────────────┘
//! └─────────────────┘
//! ```

pub mod app;
pub mod config;
pub mod errors;
pub mod identity;
pub mod metrics;
pub mod progression;
pub mod session;
pub mod store;
pub mod sync;
pub mod validation;
