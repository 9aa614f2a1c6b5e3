//! Shared tests for IndexRepo implementations
//!
//! Tests are written as async functions that take a test context holding the
//! repo under test and a backend-specific seeder for the index tables.

use async_trait::async_trait;

use crate::{db::repos::IndexRepo, models::IndexTable};

const NOW: i64 = 1_700_000_000;
const DAY: i64 = 24 * 3600;
const CUTOFF: i64 = NOW - 7 * DAY;

/// Inserts rows the reaper never writes itself.
#[async_trait]
pub trait IndexSeed: Sync {
    async fn endpoint(&self, name: &str, ts: i64) -> i64;
    async fn tag_endpoint(&self, tag: &str, endpoint_id: i64, ts: i64);
    async fn counter(&self, endpoint_id: i64, counter: &str, step: i64, counter_type: &str, ts: i64);
    async fn count(&self, table: IndexTable) -> i64;
}

/// Test context containing the repo and a seeder sharing its pool
pub struct IndexTestContext<'a> {
    pub repo: &'a dyn IndexRepo,
    pub seed: &'a dyn IndexSeed,
}

// ============================================================================
// Select Tests
// ============================================================================

pub async fn test_select_expired_endpoints(ctx: &IndexTestContext<'_>) {
    ctx.seed.endpoint("host1", NOW - 8 * DAY).await;
    ctx.seed.endpoint("host2", NOW - DAY).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    let expired = conn
        .select_expired_endpoints(CUTOFF)
        .await
        .expect("Failed to select");

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].endpoint, "host1");
    assert_eq!(expired[0].ts, NOW - 8 * DAY);
}

pub async fn test_select_uses_strict_cutoff(ctx: &IndexTestContext<'_>) {
    ctx.seed.endpoint("at-cutoff", CUTOFF).await;
    ctx.seed.endpoint("just-before", CUTOFF - 1).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    let expired = conn
        .select_expired_endpoints(CUTOFF)
        .await
        .expect("Failed to select");

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].endpoint, "just-before");
}

pub async fn test_select_expired_tag_endpoints(ctx: &IndexTestContext<'_>) {
    let id = ctx.seed.endpoint("host1", NOW).await;
    ctx.seed.tag_endpoint("env=prod", id, NOW - 8 * DAY).await;
    ctx.seed.tag_endpoint("region=us", id, NOW).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    let expired = conn
        .select_expired_tag_endpoints(CUTOFF)
        .await
        .expect("Failed to select");

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].tag, "env=prod");
    assert_eq!(expired[0].endpoint_id, id);
}

pub async fn test_select_expired_counters(ctx: &IndexTestContext<'_>) {
    let id = ctx.seed.endpoint("host1", NOW).await;
    ctx.seed
        .counter(id, "cpu.idle/region=us,env=prod", 60, "GAUGE", NOW - 8 * DAY)
        .await;
    ctx.seed
        .counter(id, "mem.used", 60, "GAUGE", NOW - DAY)
        .await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    let expired = conn
        .select_expired_counters(CUTOFF)
        .await
        .expect("Failed to select");

    assert_eq!(expired.len(), 1);
    let counter = &expired[0];
    assert_eq!(counter.endpoint_id, id);
    assert_eq!(counter.counter, "cpu.idle/region=us,env=prod");
    assert_eq!(counter.step, 60);
    assert_eq!(counter.counter_type, "GAUGE");
}

pub async fn test_get_endpoint_name(ctx: &IndexTestContext<'_>) {
    let id = ctx.seed.endpoint("host1", NOW).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    let name = conn.get_endpoint_name(id).await.expect("Failed to lookup");
    assert_eq!(name.as_deref(), Some("host1"));

    let missing = conn
        .get_endpoint_name(id + 1000)
        .await
        .expect("Failed to lookup");
    assert!(missing.is_none());
}

// ============================================================================
// Delete Tests
// ============================================================================

pub async fn test_delete_expired_per_table(ctx: &IndexTestContext<'_>) {
    let old = ctx.seed.endpoint("host1", NOW - 8 * DAY).await;
    let fresh = ctx.seed.endpoint("host2", NOW - DAY).await;
    ctx.seed.tag_endpoint("env=prod", old, NOW - 8 * DAY).await;
    ctx.seed.tag_endpoint("env=prod", fresh, NOW - DAY).await;
    ctx.seed.counter(old, "cpu.idle", 60, "GAUGE", NOW - 9 * DAY).await;
    ctx.seed.counter(old, "cpu.busy", 60, "GAUGE", NOW - 8 * DAY).await;
    ctx.seed.counter(fresh, "cpu.idle", 60, "GAUGE", NOW).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");

    let endpoints = conn
        .delete_expired(IndexTable::Endpoint, CUTOFF)
        .await
        .expect("Failed to delete");
    let tags = conn
        .delete_expired(IndexTable::TagEndpoint, CUTOFF)
        .await
        .expect("Failed to delete");
    let counters = conn
        .delete_expired(IndexTable::EndpointCounter, CUTOFF)
        .await
        .expect("Failed to delete");
    drop(conn);

    assert_eq!(endpoints, 1);
    assert_eq!(tags, 1);
    assert_eq!(counters, 2);

    assert_eq!(ctx.seed.count(IndexTable::Endpoint).await, 1);
    assert_eq!(ctx.seed.count(IndexTable::TagEndpoint).await, 1);
    assert_eq!(ctx.seed.count(IndexTable::EndpointCounter).await, 1);
}

pub async fn test_delete_keeps_rows_at_cutoff(ctx: &IndexTestContext<'_>) {
    let boundary = ctx.seed.endpoint("at-cutoff", CUTOFF).await;
    let older = ctx.seed.endpoint("just-older", CUTOFF - 1).await;
    ctx.seed.tag_endpoint("env=prod", boundary, CUTOFF).await;
    ctx.seed.tag_endpoint("env=prod", older, CUTOFF - 1).await;
    ctx.seed.counter(boundary, "cpu.idle", 60, "GAUGE", CUTOFF).await;
    ctx.seed.counter(older, "cpu.idle", 60, "GAUGE", CUTOFF - 1).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    for table in IndexTable::ALL {
        let deleted = conn
            .delete_expired(table, CUTOFF)
            .await
            .expect("Failed to delete");
        assert_eq!(deleted, 1, "{table} should only lose the row below the cutoff");
    }

    let remaining = conn
        .get_endpoint_name(boundary)
        .await
        .expect("Failed to lookup");
    assert_eq!(remaining.as_deref(), Some("at-cutoff"));
    drop(conn);

    for table in IndexTable::ALL {
        assert_eq!(ctx.seed.count(table).await, 1);
    }
}

pub async fn test_delete_does_not_cascade(ctx: &IndexTestContext<'_>) {
    // Endpoint is stale but its tag and counter were refreshed recently.
    let id = ctx.seed.endpoint("host1", NOW - 8 * DAY).await;
    ctx.seed.tag_endpoint("env=prod", id, NOW).await;
    ctx.seed.counter(id, "cpu.idle", 60, "GAUGE", NOW).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    for table in IndexTable::ALL {
        conn.delete_expired(table, CUTOFF)
            .await
            .expect("Failed to delete");
    }
    drop(conn);

    assert_eq!(ctx.seed.count(IndexTable::Endpoint).await, 0);
    assert_eq!(ctx.seed.count(IndexTable::TagEndpoint).await, 1);
    assert_eq!(ctx.seed.count(IndexTable::EndpointCounter).await, 1);
}

pub async fn test_delete_nothing_expired(ctx: &IndexTestContext<'_>) {
    ctx.seed.endpoint("host1", NOW).await;

    let mut conn = ctx.repo.acquire().await.expect("Failed to acquire");
    let deleted = conn
        .delete_expired(IndexTable::Endpoint, CUTOFF)
        .await
        .expect("Failed to delete");

    assert_eq!(deleted, 0);
}

// ============================================================================
// SQLite Tests
// ============================================================================

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use sqlx::SqlitePool;

    use super::*;
    use crate::db::{
        sqlite::SqliteIndexRepo,
        tests::harness::{create_sqlite_pool, run_sqlite_migrations, sqlite_seed},
    };

    struct SqliteSeed(SqlitePool);

    #[async_trait]
    impl IndexSeed for SqliteSeed {
        async fn endpoint(&self, name: &str, ts: i64) -> i64 {
            sqlite_seed::insert_endpoint(&self.0, name, ts).await
        }

        async fn tag_endpoint(&self, tag: &str, endpoint_id: i64, ts: i64) {
            sqlite_seed::insert_tag_endpoint(&self.0, tag, endpoint_id, ts).await
        }

        async fn counter(
            &self,
            endpoint_id: i64,
            counter: &str,
            step: i64,
            counter_type: &str,
            ts: i64,
        ) {
            sqlite_seed::insert_counter(&self.0, endpoint_id, counter, step, counter_type, ts).await
        }

        async fn count(&self, table: IndexTable) -> i64 {
            sqlite_seed::count_rows(&self.0, table.table_name()).await
        }
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let pool = create_sqlite_pool().await;
                run_sqlite_migrations(&pool).await;
                let repo = SqliteIndexRepo::new(pool.clone());
                let seed = SqliteSeed(pool);
                let ctx = IndexTestContext {
                    repo: &repo,
                    seed: &seed,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_select_expired_endpoints);
    sqlite_test!(test_select_uses_strict_cutoff);
    sqlite_test!(test_select_expired_tag_endpoints);
    sqlite_test!(test_select_expired_counters);
    sqlite_test!(test_get_endpoint_name);
    sqlite_test!(test_delete_expired_per_table);
    sqlite_test!(test_delete_keeps_rows_at_cutoff);
    sqlite_test!(test_delete_does_not_cascade);
    sqlite_test!(test_delete_nothing_expired);
}

// ============================================================================
// PostgreSQL Tests
// ============================================================================

#[cfg(feature = "database-postgres")]
mod postgres_tests {
    use sqlx::PgPool;

    use super::*;
    use crate::db::{
        postgres::PostgresIndexRepo,
        tests::harness::postgres::{self as pg, create_isolated_postgres_pool, run_postgres_migrations},
    };

    struct PostgresSeed(PgPool);

    #[async_trait]
    impl IndexSeed for PostgresSeed {
        async fn endpoint(&self, name: &str, ts: i64) -> i64 {
            pg::insert_endpoint(&self.0, name, ts).await
        }

        async fn tag_endpoint(&self, tag: &str, endpoint_id: i64, ts: i64) {
            pg::insert_tag_endpoint(&self.0, tag, endpoint_id, ts).await
        }

        async fn counter(
            &self,
            endpoint_id: i64,
            counter: &str,
            step: i64,
            counter_type: &str,
            ts: i64,
        ) {
            pg::insert_counter(&self.0, endpoint_id, counter, step, counter_type, ts).await
        }

        async fn count(&self, table: IndexTable) -> i64 {
            pg::count_rows(&self.0, table.table_name()).await
        }
    }

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let repo = PostgresIndexRepo::new(pool.clone());
                let seed = PostgresSeed(pool);
                let ctx = IndexTestContext {
                    repo: &repo,
                    seed: &seed,
                };
                super::$name(&ctx).await;
            }
        };
    }

    postgres_test!(test_select_expired_endpoints);
    postgres_test!(test_select_uses_strict_cutoff);
    postgres_test!(test_select_expired_tag_endpoints);
    postgres_test!(test_select_expired_counters);
    postgres_test!(test_get_endpoint_name);
    postgres_test!(test_delete_expired_per_table);
    postgres_test!(test_delete_keeps_rows_at_cutoff);
    postgres_test!(test_delete_does_not_cascade);
    postgres_test!(test_delete_nothing_expired);
}
