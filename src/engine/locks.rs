use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Key = (u64, NaiveDate);

/// Dead entries are swept once the map grows past this many keys.
const SWEEP_AT: usize = 4096;

/// In-process mutual exclusion per (employee, date).
///
/// Correction materialization, clock events and resync items for the same
/// employee-date queue behind one mutex. The map only holds weak handles, so
/// an entry disappears once no holder or waiter is left and never while one
/// is. The store's version check still guards against writers in other
/// processes.
pub struct RecordLocks {
    locks: StdMutex<HashMap<Key, Weak<Mutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, employee_id: u64, date: NaiveDate) -> OwnedMutexGuard<()> {
        let mutex = self.handle((employee_id, date));
        mutex.lock_owned().await
    }

    fn handle(&self, key: Key) -> Arc<Mutex<()>> {
        // a poisoned map is still a valid map of weak handles
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(live) = locks.get(&key).and_then(Weak::upgrade) {
            return live;
        }
        if locks.len() >= SWEEP_AT {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }
        let mutex = Arc::new(Mutex::new(()));
        locks.insert(key, Arc::downgrade(&mutex));
        mutex
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RecordLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[tokio::test]
    async fn same_key_is_exclusive_and_other_keys_are_not() {
        let locks = RecordLocks::new();

        let held = locks.lock(1, day()).await;
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock(1, day())).await;
        assert!(same.is_err());

        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(2, day())).await;
        assert!(other.is_ok());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock(1, day())).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn held_lock_survives_a_sweep() {
        let locks = RecordLocks::new();
        let held = locks.lock(1, day()).await;

        // churn enough other keys to trigger sweeping several times
        for id in 2..(SWEEP_AT as u64 * 3) {
            drop(locks.lock(id, day()).await);
        }
        assert!(locks.len() <= SWEEP_AT + 1);

        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock(1, day())).await;
        assert!(same.is_err());
        drop(held);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), locks.lock(1, day()))
                .await
                .is_ok()
        );
    }
}
