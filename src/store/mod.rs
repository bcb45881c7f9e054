//! # Remote Profile Store
//!
//! The profile store is a flat key/value space per user: each
//! [`ProfileField`] is an independent slot, so writing `gold` never touches
//! `username`. The progression core only talks to the [`RemoteProfileStore`]
//! trait; two backends ship with the crate:
//!
//! - [`SledProfileStore`] - durable, one sled key per user field
//! - [`MemoryProfileStore`] - volatile, with failure and latency injection
//!
//! ```text
//! profiles:<user_id>:username -> Text("alice")
//! profiles:<user_id>:level    -> Count(3)
//! profiles:<user_id>:xp       -> Count(12)
//! ```

mod memory;
mod sled_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::progression::{ProfileField, ProfileRecord, UserId};

pub use memory::{FieldWrite, MemoryProfileStore};
pub use sled_store::SledProfileStore;

/// Value held by a single profile field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Count(u64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

/// Keyed-by-user remote storage for profile fields.
#[async_trait]
pub trait RemoteProfileStore: Send + Sync {
    /// Fetch every stored field of `user_id` as a record. `Ok(None)` when the
    /// user has never been written.
    async fn get_record(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, StoreError>;

    async fn get_field(
        &self,
        user_id: &UserId,
        field: ProfileField,
    ) -> Result<Option<FieldValue>, StoreError>;

    /// Overwrite exactly one field, leaving its siblings untouched.
    async fn set_field(
        &self,
        user_id: &UserId,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), StoreError>;
}

impl ProfileRecord {
    /// Current value of `field` in store representation.
    pub fn field_value(&self, field: ProfileField) -> FieldValue {
        match field {
            ProfileField::Username => FieldValue::Text(self.username.clone()),
            ProfileField::Level => FieldValue::Count(u64::from(self.level)),
            ProfileField::Xp => FieldValue::Count(self.xp),
            ProfileField::Diamond => FieldValue::Count(self.diamond),
            ProfileField::Gold => FieldValue::Count(self.gold),
        }
    }
}

/// Build a record out of individually stored fields. Absent fields keep their
/// zero / unset defaults; an empty field set means the user does not exist.
pub(crate) fn assemble_record<I>(user_id: &UserId, fields: I) -> Result<Option<ProfileRecord>, StoreError>
where
    I: IntoIterator<Item = (ProfileField, FieldValue)>,
{
    let mut record = ProfileRecord::new(user_id.clone());
    let mut seen = false;
    for (field, value) in fields {
        seen = true;
        let corrupt = || StoreError::CorruptField {
            user_id: user_id.clone(),
            field,
        };
        match field {
            ProfileField::Username => {
                record.username = value.as_text().ok_or_else(corrupt)?.to_string();
            }
            ProfileField::Level => {
                let raw = value.as_count().ok_or_else(corrupt)?;
                record.level = u32::try_from(raw).map_err(|_| corrupt())?;
            }
            ProfileField::Xp => record.xp = value.as_count().ok_or_else(corrupt)?,
            ProfileField::Diamond => record.diamond = value.as_count().ok_or_else(corrupt)?,
            ProfileField::Gold => record.gold = value.as_count().ok_or_else(corrupt)?,
        }
    }
    Ok(seen.then_some(record))
}

/// Reject values whose shape does not match the field before they reach a backend.
pub(crate) fn check_shape(
    user_id: &UserId,
    field: ProfileField,
    value: &FieldValue,
) -> Result<(), StoreError> {
    let ok = match field {
        ProfileField::Username => value.as_text().is_some(),
        ProfileField::Level => value
            .as_count()
            .is_some_and(|n| u32::try_from(n).is_ok()),
        _ => value.as_count().is_some(),
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::CorruptField {
            user_id: user_id.clone(),
            field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_empty_is_none() {
        let uid = UserId::new("ghost");
        let record = assemble_record(&uid, Vec::new()).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn assemble_partial_fields_keeps_defaults() {
        let uid = UserId::new("partial");
        let record = assemble_record(
            &uid,
            vec![(ProfileField::Gold, FieldValue::Count(9))],
        )
        .unwrap()
        .expect("record");
        assert_eq!(record.gold, 9);
        assert_eq!(record.level, 0);
        assert!(!record.has_username());
    }

    #[test]
    fn assemble_rejects_wrong_shape() {
        let uid = UserId::new("bad");
        let err = assemble_record(
            &uid,
            vec![(ProfileField::Level, FieldValue::Text("three".into()))],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StoreError::CorruptField {
                field: ProfileField::Level,
                ..
            }
        ));
    }

    #[test]
    fn level_shape_must_fit_u32() {
        let uid = UserId::new("big");
        assert!(check_shape(&uid, ProfileField::Level, &FieldValue::Count(u64::MAX)).is_err());
        assert!(check_shape(&uid, ProfileField::Xp, &FieldValue::Count(u64::MAX)).is_ok());
        assert!(check_shape(&uid, ProfileField::Username, &FieldValue::Count(1)).is_err());
    }
}
