//! Scheduled driver for [`IndexDeleteTask`].

use std::sync::Arc;

use chrono::Utc;

use super::{IndexDeleteTask, WeeklySchedule};
use crate::config::IndexDeleteConfig;

/// Starts the index delete worker.
///
/// Sleeps until the next weekly tick, runs the task, and repeats. A run is
/// always awaited before the next tick is computed, so runs never overlap.
/// It will run indefinitely until the task is cancelled.
pub async fn start_index_delete_worker(task: Arc<IndexDeleteTask>, config: IndexDeleteConfig) {
    if !config.enabled {
        tracing::info!("Index delete worker disabled by configuration");
        return;
    }

    let schedule = match WeeklySchedule::from_config(&config.schedule) {
        Ok(schedule) => schedule,
        Err(e) => {
            tracing::error!(error = %e, "Invalid index delete schedule, worker not started");
            return;
        }
    };

    let dry_run_msg = if task.dry_run() { " (DRY RUN)" } else { "" };

    tracing::info!(
        weekday = %schedule.weekday(),
        time = %schedule.time(),
        retention_secs = task.retention().num_seconds(),
        rrd_base = %task.resolver().base().display(),
        run_on_start = config.run_on_start,
        dry_run = task.dry_run(),
        "Starting index delete worker{}",
        dry_run_msg
    );

    if config.run_on_start {
        run_once(&task).await;
    }

    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();

        tracing::debug!(next_run = %next, "Waiting for next index delete run");
        tokio::time::sleep(wait).await;

        run_once(&task).await;
    }
}

async fn run_once(task: &IndexDeleteTask) {
    match task.run().await {
        Ok(report) => {
            if !report.is_clean() {
                tracing::warn!(
                    failed = report.rrd_errors.len(),
                    errors = %report.rrd_errors,
                    "Index delete run left RRD files behind"
                );
            }
        }
        Err(e) => {
            let table = e.table().map(|t| t.table_name());
            tracing::error!(error = %e, phase = e.phase(), table, "Error running index delete");
        }
    }
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use super::*;
    use crate::{
        db::{
            sqlite::SqliteIndexRepo,
            tests::harness::{create_sqlite_pool, run_sqlite_migrations},
        },
        index::ProcStats,
    };

    #[tokio::test]
    async fn test_disabled_worker_returns() {
        let pool = create_sqlite_pool().await;
        let stats = Arc::new(ProcStats::new());
        let task = Arc::new(IndexDeleteTask::new(
            Arc::new(SqliteIndexRepo::new(pool)),
            stats.clone(),
            chrono::Duration::days(7),
            "/nonexistent",
        ));
        let config = IndexDeleteConfig {
            enabled: false,
            ..Default::default()
        };

        start_index_delete_worker(task, config).await;
        assert_eq!(stats.snapshot().runs, 0);
    }

    #[tokio::test]
    async fn test_invalid_schedule_returns() {
        let pool = create_sqlite_pool().await;
        let stats = Arc::new(ProcStats::new());
        let task = Arc::new(IndexDeleteTask::new(
            Arc::new(SqliteIndexRepo::new(pool)),
            stats.clone(),
            chrono::Duration::days(7),
            "/nonexistent",
        ));
        let mut config = IndexDeleteConfig::default();
        config.schedule.weekday = "never".to_string();

        start_index_delete_worker(task, config).await;
        assert_eq!(stats.snapshot().runs, 0);
    }

    #[tokio::test]
    async fn test_run_on_start_runs_immediately() {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        let stats = Arc::new(ProcStats::new());
        let dir = tempfile::tempdir().unwrap();
        let task = Arc::new(IndexDeleteTask::new(
            Arc::new(SqliteIndexRepo::new(pool)),
            stats.clone(),
            chrono::Duration::days(7),
            dir.path(),
        ));
        let config = IndexDeleteConfig {
            run_on_start: true,
            ..Default::default()
        };

        let handle = tokio::spawn(start_index_delete_worker(task, config));
        for _ in 0..100 {
            if stats.snapshot().runs > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        handle.abort();

        assert_eq!(stats.snapshot().runs, 1);
    }
}
