//! Per-session mutual exclusion
//!
//! Sessions never contend with each other; only work on the same session id
//! is serialized. Entries are dropped once nobody holds or awaits them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-session async locks
#[derive(Clone, Default)]
pub struct SessionLocks {
    map: Arc<Mutex<LockMap>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(map: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
        match map.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Wait for exclusive access to `session_id`
    pub async fn acquire(&self, session_id: &str) -> SessionLockGuard {
        let lock = {
            let mut map = Self::map(&self.map);
            Arc::clone(
                map.entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = Arc::clone(&lock).lock_owned().await;

        SessionLockGuard {
            session_id: session_id.to_string(),
            lock,
            guard: Some(guard),
            map: Arc::clone(&self.map),
        }
    }

    /// Sessions with a live lock entry
    pub fn len(&self) -> usize {
        Self::map(&self.map).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held while a session is being mutated
pub struct SessionLockGuard {
    session_id: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    map: Arc<Mutex<LockMap>>,
}

impl SessionLockGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        let mut map = SessionLocks::map(&self.map);
        self.guard.take();
        // The map and `self.lock` are the only references left: no waiters
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.session_id);
        }
    }
}
