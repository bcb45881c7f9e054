//! # Identity Provider
//!
//! Authentication is delegated to an [`IdentityProvider`]: it signs players in
//! and up, owns their display-name copy, and signs them out. The rest of the
//! crate only ever sees the resulting [`Principal`].
//!
//! [`LocalIdentityProvider`] is the bundled implementation, keeping accounts in
//! sled with Argon2id password hashes.

pub mod local;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progression::UserId;

pub use local::LocalIdentityProvider;

/// An authenticated player as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Why the identity provider refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthErrorKind {
    MissingEmail,
    MissingPassword,
    WrongPassword,
    InvalidEmail,
    UserNotFound,
    WeakPassword,
    EmailAlreadyInUse,
    /// The provider itself failed (storage, hashing).
    Unavailable,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthErrorKind::MissingEmail => "missing email",
            AuthErrorKind::MissingPassword => "missing password",
            AuthErrorKind::WrongPassword => "wrong password",
            AuthErrorKind::InvalidEmail => "invalid email",
            AuthErrorKind::UserNotFound => "user not found",
            AuthErrorKind::WeakPassword => "weak password",
            AuthErrorKind::EmailAlreadyInUse => "email already in use",
            AuthErrorKind::Unavailable => "identity backend unavailable",
        };
        f.write_str(name)
    }
}

/// The operation an [`AuthError`] came from; picks the wording shown to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
    UpdateProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authentication failed: {kind}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    #[source]
    detail: Option<AuthDetail>,
}

/// Backend detail attached to [`AuthErrorKind::Unavailable`] errors. Logged, never shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AuthDetail(String);

impl AuthError {
    pub fn new(kind: AuthErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: AuthErrorKind::Unavailable,
            detail: Some(AuthDetail(detail.into())),
        }
    }

    /// Short player-facing message for this failure in the context of `action`.
    pub fn user_message(&self, action: AuthAction) -> &'static str {
        match (action, self.kind) {
            (AuthAction::SignIn, AuthErrorKind::MissingEmail) => "Missing email!",
            (AuthAction::SignIn, AuthErrorKind::MissingPassword) => "Missing password!",
            (AuthAction::SignIn, AuthErrorKind::WrongPassword) => "Wrong password!",
            (AuthAction::SignIn, AuthErrorKind::InvalidEmail) => "Invalid email",
            (AuthAction::SignIn, AuthErrorKind::UserNotFound) => "User not found!",
            (AuthAction::SignIn, _) => "Login failed!",
            (AuthAction::SignUp, AuthErrorKind::MissingEmail) => "Missing email",
            (AuthAction::SignUp, AuthErrorKind::MissingPassword) => "Missing password",
            (AuthAction::SignUp, AuthErrorKind::WeakPassword) => "Weak password",
            (AuthAction::SignUp, AuthErrorKind::EmailAlreadyInUse) => "Email already used",
            (AuthAction::SignUp, AuthErrorKind::InvalidEmail) => "Invalid email",
            (AuthAction::SignUp, _) => "Register failed",
            (AuthAction::UpdateProfile, _) => "Username set failed!",
        }
    }
}

impl From<AuthErrorKind> for AuthError {
    fn from(kind: AuthErrorKind) -> Self {
        AuthError::new(kind)
    }
}

/// External service that authenticates players and holds their display name.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Update the provider's own copy of the display name; returns the refreshed principal.
    async fn set_display_name(&self, principal: &Principal, name: &str)
        -> Result<Principal, AuthError>;

    async fn sign_out(&self, principal: &Principal) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_sign_up_wording_differs() {
        let err = AuthError::new(AuthErrorKind::MissingEmail);
        assert_eq!(err.user_message(AuthAction::SignIn), "Missing email!");
        assert_eq!(err.user_message(AuthAction::SignUp), "Missing email");
    }

    #[test]
    fn unmapped_kinds_fall_back_per_action() {
        let err = AuthError::new(AuthErrorKind::WeakPassword);
        assert_eq!(err.user_message(AuthAction::SignIn), "Login failed!");
        let err = AuthError::new(AuthErrorKind::UserNotFound);
        assert_eq!(err.user_message(AuthAction::SignUp), "Register failed");
    }

    #[test]
    fn backend_detail_is_not_in_user_message() {
        let err = AuthError::unavailable("sled: corrupted page 7");
        assert_eq!(err.kind, AuthErrorKind::Unavailable);
        assert!(!err.user_message(AuthAction::SignIn).contains("sled"));
    }
}
