use std::path::Path;

use async_trait::async_trait;
use log::debug;
use sled::IVec;

use super::{assemble_record, check_shape, FieldValue, RemoteProfileStore};
use crate::errors::StoreError;
use crate::progression::{ProfileField, ProfileRecord, UserId};

const TREE_PROFILES: &str = "profiles";

/// Sled-backed profile store. Each user field lives under its own key so
/// writes to one field can never clobber another.
pub struct SledProfileStore {
    _db: sled::Db,
    profiles: sled::Tree,
}

impl SledProfileStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let profiles = db.open_tree(TREE_PROFILES)?;
        Ok(Self { _db: db, profiles })
    }

    fn user_prefix(user_id: &UserId) -> Vec<u8> {
        format!("profiles:{}:", user_id).into_bytes()
    }

    fn field_key(user_id: &UserId, field: ProfileField) -> Vec<u8> {
        format!("profiles:{}:{}", user_id, field.as_str()).into_bytes()
    }

    fn serialize(value: &FieldValue) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize(bytes: IVec) -> Result<FieldValue, StoreError> {
        Ok(bincode::deserialize::<FieldValue>(&bytes)?)
    }
}

#[async_trait]
impl RemoteProfileStore for SledProfileStore {
    async fn get_record(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, StoreError> {
        let prefix = Self::user_prefix(user_id);
        let mut fields = Vec::new();
        for entry in self.profiles.scan_prefix(&prefix) {
            let (key, value) = entry?;
            let name = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            // Keys for user ids that merely share this prefix have a further ':'.
            let Some(field) = ProfileField::parse(&name) else {
                continue;
            };
            fields.push((field, Self::deserialize(value)?));
        }
        assemble_record(user_id, fields)
    }

    async fn get_field(
        &self,
        user_id: &UserId,
        field: ProfileField,
    ) -> Result<Option<FieldValue>, StoreError> {
        let key = Self::field_key(user_id, field);
        match self.profiles.get(key)? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_field(
        &self,
        user_id: &UserId,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        check_shape(user_id, field, &value)?;
        let key = Self::field_key(user_id, field);
        let bytes = Self::serialize(&value)?;
        self.profiles.insert(key, bytes)?;
        self.profiles.flush()?;
        debug!("profile field {} written for {}", field, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn store_round_trip_fields() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledProfileStore::open(dir.path()).expect("store");
        let uid = UserId::new("alice-id");
        store
            .set_field(&uid, ProfileField::Username, FieldValue::Text("alice".into()))
            .await
            .expect("username");
        store
            .set_field(&uid, ProfileField::Gold, FieldValue::Count(42))
            .await
            .expect("gold");
        let record = store.get_record(&uid).await.expect("get").expect("present");
        assert_eq!(record.username, "alice");
        assert_eq!(record.gold, 42);
        assert_eq!(record.xp, 0);
    }

    #[tokio::test]
    async fn prefix_sharing_users_do_not_mix() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledProfileStore::open(dir.path()).expect("store");
        let short = UserId::new("bob");
        let long = UserId::new("bob:x");
        store
            .set_field(&long, ProfileField::Gold, FieldValue::Count(7))
            .await
            .unwrap();
        assert!(store.get_record(&short).await.unwrap().is_none());
        store
            .set_field(&short, ProfileField::Xp, FieldValue::Count(3))
            .await
            .unwrap();
        let record = store.get_record(&short).await.unwrap().unwrap();
        assert_eq!(record.gold, 0);
        assert_eq!(record.xp, 3);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let uid = UserId::new("carol");
        {
            let store = SledProfileStore::open(dir.path()).expect("store");
            store
                .set_field(&uid, ProfileField::Level, FieldValue::Count(4))
                .await
                .unwrap();
        }
        let store = SledProfileStore::open(dir.path()).expect("reopen");
        let level = store.get_field(&uid, ProfileField::Level).await.unwrap();
        assert_eq!(level, Some(FieldValue::Count(4)));
    }
}
