//! Signal registry: at most one unresolved signal per owner
//!
//! Same acquire/release shape as a NX lock, keyed per owner and held in
//! process memory only. Nothing survives a restart, so the registry always
//! starts empty.

use crate::transport::OwnerId;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SignalRegistry {
    active: Mutex<HashSet<OwnerId>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the owner as having an active signal.
    /// Returns false (and changes nothing) if one is already active.
    pub fn try_acquire(&self, owner: OwnerId) -> bool {
        let acquired = self.active.lock().insert(owner);
        debug!(%owner, acquired, "registry acquire");
        acquired
    }

    /// Clear the owner's entry. Idempotent.
    pub fn release(&self, owner: OwnerId) {
        let removed = self.active.lock().remove(&owner);
        debug!(%owner, removed, "registry release");
    }

    pub fn is_active(&self, owner: OwnerId) -> bool {
        self.active.lock().contains(&owner)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}
