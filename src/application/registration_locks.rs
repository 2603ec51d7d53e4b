//! Per-registration async locks.
//!
//! Serializes the transitions of one registration inside this process. Each
//! id gets its own mutex; unrelated registrations never wait on each other.
//! Across processes the repository's version check is the backstop.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::RegistrationId;

/// Entries are pruned once the map grows past this many ids.
const PRUNE_THRESHOLD: usize = 1024;

/// Lock table keyed by registration id.
#[derive(Default)]
pub struct RegistrationLocks {
    locks: Mutex<HashMap<RegistrationId, Weak<Mutex<()>>>>,
}

impl RegistrationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`. Released when the guard drops.
    pub async fn acquire(&self, id: RegistrationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            match locks.get(&id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    if locks.len() >= PRUNE_THRESHOLD {
                        locks.retain(|_, weak| weak.strong_count() > 0);
                    }
                    let lock = Arc::new(Mutex::new(()));
                    locks.insert(id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Ids with a live lock.
    pub async fn live_count(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
