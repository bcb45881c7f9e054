use thiserror::Error;

use crate::progression::{ProfileField, ProgressionError, UserId};
use crate::session::SessionError;

/// Errors raised by a [`RemoteProfileStore`](crate::store::RemoteProfileStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored field holds a value of the wrong shape.
    #[error("corrupt field {field} for user {user_id}")]
    CorruptField { user_id: UserId, field: ProfileField },

    /// The backend could not be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by [`ProfileSyncService`](crate::sync::ProfileSyncService).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport or storage failure while loading or writing. Not retried.
    #[error("profile sync failed: {cause}")]
    Store {
        #[source]
        cause: StoreError,
    },

    /// The progression delta was rejected; nothing was written.
    #[error(transparent)]
    InvalidDelta(#[from] ProgressionError),

    /// Caller input failed validation before any write was issued.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The user has no remote record yet and must be bootstrapped first.
    #[error("no profile stored for user {0}")]
    NotBootstrapped(UserId),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Internal error (task join errors, unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for SyncError {
    fn from(cause: StoreError) -> Self {
        SyncError::Store { cause }
    }
}

impl SyncError {
    /// Short message suitable for showing to the player.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Store { .. } => "Could not reach the profile server. Try again.".to_string(),
            SyncError::InvalidDelta(_) => "That reward could not be applied.".to_string(),
            SyncError::Validation(reason) => reason.clone(),
            SyncError::NotBootstrapped(_) => "Profile not found!".to_string(),
            SyncError::Session(SessionError::AlreadyActive { .. }) => {
                "Already logged in".to_string()
            }
            SyncError::Internal(_) => "Something went wrong.".to_string(),
        }
    }
}
