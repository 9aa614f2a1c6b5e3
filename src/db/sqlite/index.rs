use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, pool::PoolConnection};

use crate::{
    db::{
        error::DbResult,
        repos::{IndexConnection, IndexRepo},
    },
    models::{Endpoint, EndpointCounter, IndexTable, TagEndpoint},
};

pub struct SqliteIndexRepo {
    pool: SqlitePool,
}

impl SqliteIndexRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndexRepo for SqliteIndexRepo {
    async fn acquire(&self) -> DbResult<Box<dyn IndexConnection>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqliteIndexConnection { conn }))
    }
}

struct SqliteIndexConnection {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl IndexConnection for SqliteIndexConnection {
    async fn select_expired_endpoints(&mut self, cutoff: i64) -> DbResult<Vec<Endpoint>> {
        let rows = sqlx::query(
            r#"
            SELECT id, endpoint_name, ts
            FROM endpoint
            WHERE ts < ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Endpoint {
                id: row.get("id"),
                endpoint: row.get("endpoint_name"),
                ts: row.get("ts"),
            })
            .collect())
    }

    async fn select_expired_tag_endpoints(&mut self, cutoff: i64) -> DbResult<Vec<TagEndpoint>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tag, endpoint_id, ts
            FROM tag_endpoint
            WHERE ts < ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TagEndpoint {
                id: row.get("id"),
                tag: row.get("tag"),
                endpoint_id: row.get("endpoint_id"),
                ts: row.get("ts"),
            })
            .collect())
    }

    async fn select_expired_counters(&mut self, cutoff: i64) -> DbResult<Vec<EndpointCounter>> {
        let rows = sqlx::query(
            r#"
            SELECT id, endpoint_id, counter, step, type, ts
            FROM endpoint_counter
            WHERE ts < ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EndpointCounter {
                id: row.get("id"),
                endpoint_id: row.get("endpoint_id"),
                counter: row.get("counter"),
                step: row.get("step"),
                counter_type: row.get("type"),
                ts: row.get("ts"),
            })
            .collect())
    }

    async fn get_endpoint_name(&mut self, endpoint_id: i64) -> DbResult<Option<String>> {
        let row = sqlx::query("SELECT endpoint_name FROM endpoint WHERE id = ?")
            .bind(endpoint_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(row.map(|row| row.get("endpoint_name")))
    }

    async fn delete_expired(&mut self, table: IndexTable, cutoff: i64) -> DbResult<u64> {
        let sql = match table {
            IndexTable::Endpoint => "DELETE FROM endpoint WHERE ts < ?",
            IndexTable::TagEndpoint => "DELETE FROM tag_endpoint WHERE ts < ?",
            IndexTable::EndpointCounter => "DELETE FROM endpoint_counter WHERE ts < ?",
        };

        let result = sqlx::query(sql)
            .bind(cutoff)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
