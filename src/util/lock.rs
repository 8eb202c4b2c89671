//! Lock acquisition that survives poisoning.
//!
//! Handlers run on producer threads; a panic in one of them must not wedge
//! every later subscription or recorded call behind a poisoned lock.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Names the state a lock protects, for the recovery warning.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Guarded {
    pub owner: &'static str,
    pub state: &'static str,
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    guarded: &Guarded,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| recover(poisoned, guarded, op, "read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    guarded: &Guarded,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| recover(poisoned, guarded, op, "write"))
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    guarded: &Guarded,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| recover(poisoned, guarded, op, "lock"))
}

fn recover<G>(
    poisoned: PoisonError<G>,
    guarded: &Guarded,
    op: &'static str,
    access: &'static str,
) -> G {
    warn!(
        owner = guarded.owner,
        state = guarded.state,
        op,
        access,
        "A handler panicked while holding the lock; continuing with its last state"
    );
    poisoned.into_inner()
}
