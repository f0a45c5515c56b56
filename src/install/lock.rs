//! Single-flight guard keyed by artifact
//!
//! A key is held from `try_acquire` until its guard is dropped. A second acquire of a held
//! key is rejected rather than queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` busy, or returns None if another holder has it
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());

        if !keys.insert(key.to_string()) {
            debug!("{} is already in flight", key);
            return None;
        }

        Some(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.to_string(),
        })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key on drop, including on early returns and panics
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.remove(&self.key);
    }
}
