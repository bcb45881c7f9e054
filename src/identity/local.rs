use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthErrorKind, IdentityProvider, Principal};
use crate::progression::UserId;
use crate::validation::{check_password_strength, mask_email, validate_email, EmailError, PasswordError};

const TREE_ACCOUNTS: &str = "accounts";

/// Default minimum password length for new accounts.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    user_id: UserId,
    email: String,
    password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    created_at: DateTime<Utc>,
    last_sign_in: DateTime<Utc>,
}

impl Account {
    fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Identity provider backed by a local sled database.
///
/// Accounts are keyed by lowercase email and stored as JSON, with Argon2id
/// password hashes. Signed-in principals are tracked in memory only.
pub struct LocalIdentityProvider {
    _db: sled::Db,
    accounts: sled::Tree,
    argon2: Argon2<'static>,
    min_password_length: usize,
    signed_in: Mutex<HashSet<UserId>>,
}

impl LocalIdentityProvider {
    /// Open (or create) the account database at `path` with default Argon2 parameters.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        Self::open_with_params(path, None, DEFAULT_MIN_PASSWORD_LENGTH)
    }

    /// Open with explicit Argon2 parameters and password policy.
    pub fn open_with_params<P: AsRef<Path>>(
        path: P,
        params: Option<Params>,
        min_password_length: usize,
    ) -> Result<Self, AuthError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)
            .map_err(|e| AuthError::unavailable(format!("create {}: {e}", path_ref.display())))?;
        let db = sled::open(path_ref).map_err(|e| AuthError::unavailable(e.to_string()))?;
        Self::from_db(db, params, min_password_length)
    }

    /// Account database that lives only as long as this provider.
    pub fn temporary(params: Option<Params>, min_password_length: usize) -> Result<Self, AuthError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| AuthError::unavailable(e.to_string()))?;
        Self::from_db(db, params, min_password_length)
    }

    fn from_db(
        db: sled::Db,
        params: Option<Params>,
        min_password_length: usize,
    ) -> Result<Self, AuthError> {
        let accounts = db
            .open_tree(TREE_ACCOUNTS)
            .map_err(|e| AuthError::unavailable(e.to_string()))?;
        let argon2 = match params {
            Some(p) => Argon2::new(Algorithm::Argon2id, Version::V0x13, p),
            None => Argon2::default(),
        };
        Ok(Self {
            _db: db,
            accounts,
            argon2,
            min_password_length,
            signed_in: Mutex::new(HashSet::new()),
        })
    }

    /// Whether `user_id` currently holds a live sign-in.
    pub fn is_signed_in(&self, user_id: &UserId) -> bool {
        self.signed_in
            .lock()
            .map(|set| set.contains(user_id))
            .unwrap_or(false)
    }

    fn account_key(email: &str) -> Vec<u8> {
        format!("accounts:{}", email).into_bytes()
    }

    fn load_account(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let Some(bytes) = self
            .accounts
            .get(Self::account_key(email))
            .map_err(|e| AuthError::unavailable(e.to_string()))?
        else {
            return Ok(None);
        };
        let account = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::unavailable(format!("corrupt account record: {e}")))?;
        Ok(Some(account))
    }

    fn store_account(&self, account: &Account) -> Result<(), AuthError> {
        let bytes =
            serde_json::to_vec(account).map_err(|e| AuthError::unavailable(e.to_string()))?;
        self.accounts
            .insert(Self::account_key(&account.email), bytes)
            .map_err(|e| AuthError::unavailable(e.to_string()))?;
        self.accounts
            .flush()
            .map_err(|e| AuthError::unavailable(e.to_string()))?;
        Ok(())
    }

    /// Insert `account` only if its email is still free. `Ok(false)` means
    /// someone else registered it first.
    fn create_account(&self, account: &Account) -> Result<bool, AuthError> {
        let bytes =
            serde_json::to_vec(account).map_err(|e| AuthError::unavailable(e.to_string()))?;
        let swapped = self
            .accounts
            .compare_and_swap(Self::account_key(&account.email), None as Option<&[u8]>, Some(bytes))
            .map_err(|e| AuthError::unavailable(e.to_string()))?;
        if swapped.is_err() {
            return Ok(false);
        }
        self.accounts
            .flush()
            .map_err(|e| AuthError::unavailable(e.to_string()))?;
        Ok(true)
    }

    fn mark_signed_in(&self, user_id: &UserId, signed_in: bool) {
        if let Ok(mut set) = self.signed_in.lock() {
            if signed_in {
                set.insert(user_id.clone());
            } else {
                set.remove(user_id);
            }
        }
    }

    fn normalize_email(email: &str) -> Result<String, AuthError> {
        validate_email(email).map_err(|e| match e {
            EmailError::Missing => AuthError::new(AuthErrorKind::MissingEmail),
            EmailError::Invalid => AuthError::new(AuthErrorKind::InvalidEmail),
        })
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = Self::normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthErrorKind::MissingPassword.into());
        }
        let Some(mut account) = self.load_account(&email)? else {
            warn!(target: "security", "sign-in for unknown account {}", mask_email(&email));
            return Err(AuthErrorKind::UserNotFound.into());
        };
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| AuthError::unavailable(format!("corrupt password hash: {e}")))?;
        if self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            warn!(target: "security", "wrong password for {}", mask_email(&email));
            return Err(AuthErrorKind::WrongPassword.into());
        }
        account.last_sign_in = Utc::now();
        self.store_account(&account)?;
        self.mark_signed_in(&account.user_id, true);
        info!(target: "security", "signed in {} as {}", mask_email(&email), account.user_id);
        Ok(account.principal())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = Self::normalize_email(email)?;
        check_password_strength(password, self.min_password_length).map_err(|e| match e {
            PasswordError::Missing => AuthError::new(AuthErrorKind::MissingPassword),
            PasswordError::TooShort { .. } | PasswordError::TooLong => {
                AuthError::new(AuthErrorKind::WeakPassword)
            }
        })?;
        if self.load_account(&email)?.is_some() {
            return Err(AuthErrorKind::EmailAlreadyInUse.into());
        }
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::unavailable(format!("password hash failure: {e}")))?;
        let now = Utc::now();
        let account = Account {
            user_id: UserId::generate(),
            email: email.clone(),
            password_hash: hash.to_string(),
            display_name: None,
            created_at: now,
            last_sign_in: now,
        };
        if !self.create_account(&account)? {
            warn!(target: "security", "lost registration race for {}", mask_email(&email));
            return Err(AuthErrorKind::EmailAlreadyInUse.into());
        }
        self.mark_signed_in(&account.user_id, true);
        info!(target: "security", "registered {} as {}", mask_email(&email), account.user_id);
        Ok(account.principal())
    }

    async fn set_display_name(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<Principal, AuthError> {
        let Some(mut account) = self.load_account(&principal.email)? else {
            return Err(AuthErrorKind::UserNotFound.into());
        };
        if account.user_id != principal.user_id {
            return Err(AuthErrorKind::UserNotFound.into());
        }
        account.display_name = Some(name.to_string());
        self.store_account(&account)?;
        Ok(account.principal())
    }

    async fn sign_out(&self, principal: &Principal) -> Result<(), AuthError> {
        self.mark_signed_in(&principal.user_id, false);
        info!(target: "security", "signed out {}", principal.user_id);
        Ok(())
    }
}
