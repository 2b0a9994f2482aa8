//! Per-owner win/loss counters, drained by the daily digest

use crate::transport::OwnerId;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub wins: u64,
    pub losses: u64,
}

impl UserStats {
    pub fn total(&self) -> u64 {
        self.wins + self.losses
    }
}

#[derive(Debug, Default)]
pub struct StatsStore {
    counters: Mutex<HashMap<OwnerId, UserStats>>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one resolved signal for the owner
    pub fn record(&self, owner: OwnerId, is_win: bool) -> UserStats {
        let mut counters = self.counters.lock();
        let stats = counters.entry(owner).or_default();
        if is_win {
            stats.wins += 1;
        } else {
            stats.losses += 1;
        }
        *stats
    }

    pub fn get(&self, owner: OwnerId) -> Option<UserStats> {
        self.counters.lock().get(&owner).copied()
    }

    /// Copy of the current counters, store untouched
    pub fn snapshot(&self) -> HashMap<OwnerId, UserStats> {
        self.counters.lock().clone()
    }

    /// Take every counter and leave the store empty, in one step.
    pub fn drain(&self) -> HashMap<OwnerId, UserStats> {
        std::mem::take(&mut *self.counters.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
    }
}
