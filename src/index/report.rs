use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::rrd::RrdRemovalErrors;
use crate::models::IndexTable;

/// Row counts for the three index tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub endpoint: u64,
    pub tag_endpoint: u64,
    pub endpoint_counter: u64,
}

impl TableCounts {
    pub fn get(&self, table: IndexTable) -> u64 {
        match table {
            IndexTable::Endpoint => self.endpoint,
            IndexTable::TagEndpoint => self.tag_endpoint,
            IndexTable::EndpointCounter => self.endpoint_counter,
        }
    }

    pub fn set(&mut self, table: IndexTable, count: u64) {
        match table {
            IndexTable::Endpoint => self.endpoint = count,
            IndexTable::TagEndpoint => self.tag_endpoint = count,
            IndexTable::EndpointCounter => self.endpoint_counter = count,
        }
    }

    pub fn total(&self) -> u64 {
        self.endpoint + self.tag_endpoint + self.endpoint_counter
    }
}

/// What happened to the RRD files of expired counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RrdCounts {
    pub removed: u64,
    pub not_found: u64,
    pub failed: u64,
}

/// Results from a single index expiry run.
#[derive(Debug, Default, Serialize)]
pub struct IndexDeleteReport {
    pub run_id: Uuid,
    /// Rows with `ts` strictly below this unix timestamp were expired.
    pub cutoff: i64,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Rows seen by the selector.
    pub selected: TableCounts,
    /// Rows removed by the bulk deletes. Always zero on a dry run.
    pub deleted: TableCounts,
    pub rrd: RrdCounts,
    /// Counters whose tag string was malformed.
    pub tag_parse_warnings: u64,
    /// Counters whose key had no `/`; their path was computed with an empty
    /// metric.
    pub metricless_counters: u64,
    pub rrd_errors: RrdRemovalErrors,
}

impl IndexDeleteReport {
    /// Check if any rows or files were deleted.
    pub fn has_deletions(&self) -> bool {
        self.deleted.total() > 0 || self.rrd.removed > 0
    }

    /// True when every file removal succeeded or found nothing to remove.
    pub fn is_clean(&self) -> bool {
        self.rrd_errors.is_empty()
    }
}
