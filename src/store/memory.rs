use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{assemble_record, check_shape, FieldValue, RemoteProfileStore};
use crate::errors::StoreError;
use crate::progression::{ProfileField, ProfileRecord, UserId};

/// One accepted `set_field` call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub user_id: UserId,
    pub field: ProfileField,
    pub value: FieldValue,
}

/// Volatile profile store kept in process memory.
///
/// Besides serving the `memory` storage backend it can simulate a flaky
/// remote: queued read/write failures and a per-request latency.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    records: Mutex<HashMap<UserId, HashMap<ProfileField, FieldValue>>>,
    writes: Mutex<Vec<FieldWrite>>,
    failing_reads: AtomicUsize,
    failing_writes: AtomicUsize,
    latency_ms: AtomicU64,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` reads fail with [`StoreError::Unavailable`].
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` writes fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Delay every request by `latency` before it touches the data.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Accepted writes so far.
    pub async fn writes(&self) -> Vec<FieldWrite> {
        self.writes.lock().await.clone()
    }

    pub async fn clear_writes(&self) {
        self.writes.lock().await.clear();
    }

    async fn round_trip(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteProfileStore for MemoryProfileStore {
    async fn get_record(&self, user_id: &UserId) -> Result<Option<ProfileRecord>, StoreError> {
        self.round_trip().await;
        if Self::take_failure(&self.failing_reads) {
            return Err(StoreError::Unavailable("simulated read failure".into()));
        }
        let records = self.records.lock().await;
        match records.get(user_id) {
            Some(fields) => assemble_record(
                user_id,
                fields.iter().map(|(field, value)| (*field, value.clone())),
            ),
            None => Ok(None),
        }
    }

    async fn get_field(
        &self,
        user_id: &UserId,
        field: ProfileField,
    ) -> Result<Option<FieldValue>, StoreError> {
        self.round_trip().await;
        if Self::take_failure(&self.failing_reads) {
            return Err(StoreError::Unavailable("simulated read failure".into()));
        }
        let records = self.records.lock().await;
        Ok(records
            .get(user_id)
            .and_then(|fields| fields.get(&field))
            .cloned())
    }

    async fn set_field(
        &self,
        user_id: &UserId,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        check_shape(user_id, field, &value)?;
        self.round_trip().await;
        if Self::take_failure(&self.failing_writes) {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        self.records
            .lock()
            .await
            .entry(user_id.clone())
            .or_default()
            .insert(field, value.clone());
        self.writes.lock().await.push(FieldWrite {
            user_id: user_id.clone(),
            field,
            value,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let store = MemoryProfileStore::new();
        let uid = UserId::new("u");
        store.fail_next_writes(1);
        assert!(store
            .set_field(&uid, ProfileField::Xp, FieldValue::Count(1))
            .await
            .is_err());
        store
            .set_field(&uid, ProfileField::Xp, FieldValue::Count(2))
            .await
            .expect("second write succeeds");
        let writes = store.writes().await;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, FieldValue::Count(2));
    }

    #[tokio::test]
    async fn unknown_user_reads_as_none() {
        let store = MemoryProfileStore::new();
        let uid = UserId::new("nobody");
        assert!(store.get_record(&uid).await.unwrap().is_none());
        assert!(store
            .get_field(&uid, ProfileField::Gold)
            .await
            .unwrap()
            .is_none());
    }
}
