use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::progression::UserId;

/// One async mutex per user id. Holding the guard gives exclusive access to
/// that user's remote record for the duration of a load/mutate/save cycle;
/// waiters are served in FIFO order by tokio's mutex.
#[derive(Debug, Default)]
pub(crate) struct UserLocks {
    slots: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub(crate) async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Forget slots nobody is holding or waiting on.
            slots.retain(|id, slot| id == user_id || Arc::strong_count(slot) > 1);
            slots.entry(user_id.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_user_waits() {
        let locks = Arc::new(UserLocks::default());
        let uid = UserId::new("u1");
        let guard = locks.acquire(&uid).await;

        let waiter = {
            let locks = locks.clone();
            let uid = uid.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&uid).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second acquire must queue");
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finishes")
            .expect("join");
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = UserLocks::default();
        let _a = locks.acquire(&UserId::new("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire(&UserId::new("b"))).await;
        assert!(b.is_ok());
    }

    #[test]
    fn queued_acquire_wakes_on_release() {
        let locks = UserLocks::default();
        let uid = UserId::new("q");
        let first = tokio_test::block_on(locks.acquire(&uid));
        let mut second = tokio_test::task::spawn(locks.acquire(&uid));
        tokio_test::assert_pending!(second.poll());
        drop(first);
        assert!(second.is_woken());
        let _guard = tokio_test::assert_ready!(second.poll());
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = UserLocks::default();
        drop(locks.acquire(&UserId::new("a")).await);
        drop(locks.acquire(&UserId::new("b")).await);
        drop(locks.acquire(&UserId::new("c")).await);
        assert_eq!(locks.tracked(), 1);
    }
}
