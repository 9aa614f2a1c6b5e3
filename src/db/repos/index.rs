use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Endpoint, EndpointCounter, IndexTable, TagEndpoint},
};

/// Connection provider for the graph index tables.
///
/// The reaper checks out one connection per run and keeps it until the run
/// ends; dropping the returned [`IndexConnection`] hands it back to the pool.
#[async_trait]
pub trait IndexRepo: Send + Sync {
    /// Check out a dedicated connection.
    async fn acquire(&self) -> DbResult<Box<dyn IndexConnection>>;
}

/// Statements the reaper runs against the index, all on a single connection.
///
/// `cutoff` is a unix timestamp in seconds; rows qualify when `ts < cutoff`.
#[async_trait]
pub trait IndexConnection: Send {
    /// Endpoints whose last report is older than the cutoff.
    async fn select_expired_endpoints(&mut self, cutoff: i64) -> DbResult<Vec<Endpoint>>;

    /// Tag links whose own timestamp is older than the cutoff.
    async fn select_expired_tag_endpoints(&mut self, cutoff: i64) -> DbResult<Vec<TagEndpoint>>;

    /// Counters whose own timestamp is older than the cutoff.
    async fn select_expired_counters(&mut self, cutoff: i64) -> DbResult<Vec<EndpointCounter>>;

    /// Name of the endpoint with the given id, if it still exists.
    async fn get_endpoint_name(&mut self, endpoint_id: i64) -> DbResult<Option<String>>;

    // ==================== Retention Operations ====================

    /// Delete every row of `table` with `ts < cutoff` in one statement.
    ///
    /// The predicate is re-evaluated by the database, so the deleted set can
    /// differ from what an earlier select returned. Returns rows affected.
    async fn delete_expired(&mut self, table: IndexTable, cutoff: i64) -> DbResult<u64>;
}
