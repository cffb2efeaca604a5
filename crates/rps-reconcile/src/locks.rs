//! Per-root-policy mutual exclusion.
//!
//! Every writer of a root policy's status (this controller and anything else
//! sharing the registry) must hold the key's lock across its whole
//! read-modify-write sequence. The registry is injected as an
//! `Arc<RootPolicyLocks>`; it is never process-global state.
//!
//! # Invariants
//!
//! - **One primitive per key**: concurrent first use of a key from any
//!   number of tasks yields the same mutex (get-or-create happens under the
//!   map lock).
//! - **Entries are never removed**: memory grows with the number of distinct
//!   root policies seen, and a waiter can never be left holding a mutex that
//!   was swapped out from under it.
//! - **No fairness**: a waiter may be overtaken by a later arrival.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rps_schemas::ObjectKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed lock registry. See the [module documentation][self].
#[derive(Debug, Default)]
pub struct RootPolicyLocks {
    locks: Mutex<HashMap<ObjectKey, Arc<AsyncMutex<()>>>>,
}

/// Proof of exclusive access to one root policy. Released on drop.
#[derive(Debug)]
pub struct RootPolicyGuard {
    key: ObjectKey,
    _held: OwnedMutexGuard<()>,
}

impl RootPolicyGuard {
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }
}

impl RootPolicyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &ObjectKey) -> Arc<AsyncMutex<()>> {
        // The map lock is only held for the lookup; poisoning cannot leave the
        // map half-updated, so recover the inner value.
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(key.clone()).or_default())
    }

    /// Wait until `key` is free, then hold it until the guard is dropped.
    pub async fn acquire(&self, key: &ObjectKey) -> RootPolicyGuard {
        let held = self.lock_for(key).lock_owned().await;
        RootPolicyGuard {
            key: key.clone(),
            _held: held,
        }
    }

    /// Non-blocking variant of [`acquire`][Self::acquire].
    pub fn try_acquire(&self, key: &ObjectKey) -> Option<RootPolicyGuard> {
        let held = self.lock_for(key).try_lock_owned().ok()?;
        Some(RootPolicyGuard {
            key: key.clone(),
            _held: held,
        })
    }

    /// Explicit release; equivalent to dropping the guard.
    pub fn release(guard: RootPolicyGuard) {
        drop(guard);
    }

    /// Number of distinct keys ever locked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
