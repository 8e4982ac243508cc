// Single-process name lock
//
// Locks ids or filenames so that two threads never run the same critical section for the
// same name. Not re-entrant and not persistent; multiple processes need a different locker.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set-backed mutual exclusion keyed by name.
#[derive(Debug, Default)]
pub struct NameLock {
    pool: Mutex<HashSet<String>>,
}

impl NameLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `name` without waiting.
    ///
    /// Returns false if the name is already held, including by the calling thread.
    pub fn try_lock(&self, name: &str) -> bool {
        self.pool.lock().insert(name.to_string())
    }

    /// Unlock `name`. No-op if it is not held.
    ///
    /// Any thread may unlock any name; callers must only unlock names they locked.
    pub fn unlock(&self, name: &str) {
        self.pool.lock().remove(name);
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.pool.lock().contains(name)
    }

    /// Lock `name` and return a guard that unlocks it on drop.
    pub fn guard(self: &Arc<Self>, name: &str) -> Option<NameGuard> {
        self.try_lock(name).then(|| NameGuard {
            locks: Arc::clone(self),
            name: name.to_string(),
        })
    }
}

/// Holds one name of a [`NameLock`] until dropped.
#[derive(Debug)]
pub struct NameGuard {
    locks: Arc<NameLock>,
    name: String,
}

impl NameGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        self.locks.unlock(&self.name);
    }
}
