//! Run statistics.
//!
//! The reaper reports an invocation count plus one named value per index
//! table (`deleteCntEndpoint`, `deleteCntTagEndpoint`,
//! `deleteCntEndpointCounter`). [`ProcStats`] keeps them in memory for
//! inspection and forwards every update to the metrics recorder.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{models::IndexTable, observability::metrics};

/// Statistics sink for index expiry runs.
pub trait IndexStats: Send + Sync {
    /// Count one invocation of the reaper.
    fn incr_runs(&self);

    /// Set a named value, replacing the previous one.
    fn put_other(&self, name: &str, value: u64);

    /// Zero every per-table delete count.
    fn reset_delete_counts(&self) {
        for table in IndexTable::ALL {
            self.put_other(table.stat_name(), 0);
        }
    }

    /// Record rows deleted from one table.
    fn put_deleted(&self, table: IndexTable, count: u64) {
        self.put_other(table.stat_name(), count);
    }
}

/// Point-in-time copy of [`ProcStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub runs: u64,
    pub others: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    pub fn other(&self, name: &str) -> Option<u64> {
        self.others.get(name).copied()
    }
}

/// In-process statistics.
#[derive(Debug, Default)]
pub struct ProcStats {
    runs: AtomicU64,
    others: RwLock<BTreeMap<String, u64>>,
}

impl ProcStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            others: self.others.read().clone(),
        }
    }
}

impl IndexStats for ProcStats {
    fn incr_runs(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        metrics::record_index_delete_run();
    }

    fn put_other(&self, name: &str, value: u64) {
        self.others.write().insert(name.to_string(), value);
        metrics::set_index_delete_stat(name, value);
    }
}
