//! The index expiry run.
//!
//! One run selects expired rows from `endpoint`, `tag_endpoint` and
//! `endpoint_counter`, bulk-deletes each table by the same `ts < cutoff`
//! predicate, then removes the RRD file of every selected counter.
//!
//! The deletes are not restricted to the selected ids and no transaction
//! spans the run: a row refreshed between select and delete survives, a row
//! that ages in between is deleted without its file being reaped. The next
//! run picks up whatever this one missed.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::{
    Clock, IndexDeleteError, IndexDeleteReport, IndexStats, RrdPathResolver, RrdRemoval,
    RrdRemovalError, SystemClock, remove_rrd, rrd::ResolvedRrd,
};
use crate::{
    config::{IndexDeleteConfig, RrdStorageConfig},
    counter::{SeriesChecksum, TagParser},
    db::{DbError, IndexConnection, IndexRepo},
    models::{ExpiredCounter, ExpiredIndex, IndexTable},
    observability::metrics,
};

/// Expires stale graph index rows and reaps their RRD files.
pub struct IndexDeleteTask {
    repo: Arc<dyn IndexRepo>,
    stats: Arc<dyn IndexStats>,
    clock: Arc<dyn Clock>,
    resolver: RrdPathResolver,
    retention: chrono::Duration,
    dry_run: bool,
}

impl IndexDeleteTask {
    /// Task with the platform tag parser, MD5 checksum and wall clock.
    pub fn new(
        repo: Arc<dyn IndexRepo>,
        stats: Arc<dyn IndexStats>,
        retention: chrono::Duration,
        rrd_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            stats,
            clock: Arc::new(SystemClock),
            resolver: RrdPathResolver::new(rrd_base),
            retention,
            dry_run: false,
        }
    }

    pub fn from_config(
        repo: Arc<dyn IndexRepo>,
        stats: Arc<dyn IndexStats>,
        config: &IndexDeleteConfig,
        storage: &RrdStorageConfig,
    ) -> Self {
        Self::new(repo, stats, config.retention(), storage.path.clone())
            .with_dry_run(config.dry_run)
    }

    pub fn with_checksum(mut self, checksum: Arc<dyn SeriesChecksum>) -> Self {
        self.resolver = self.resolver.with_checksum(checksum);
        self
    }

    pub fn with_tag_parser(mut self, tags: Arc<dyn TagParser>) -> Self {
        self.resolver = self.resolver.with_tag_parser(tags);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn retention(&self) -> chrono::Duration {
        self.retention
    }

    pub fn resolver(&self) -> &RrdPathResolver {
        &self.resolver
    }

    /// Execute one run.
    ///
    /// Database failures abort the run and are returned. Tag-parse and file
    /// removal problems are logged and recorded on the report.
    pub async fn run(&self) -> Result<IndexDeleteReport, IndexDeleteError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("index_delete", %run_id, dry_run = self.dry_run);

        let result = self.run_inner(run_id).instrument(span).await;
        if let Err(e) = &result {
            metrics::record_index_delete_error(e.phase());
        }
        result
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<IndexDeleteReport, IndexDeleteError> {
        let start = Instant::now();
        let started_at = self.clock.now();
        // A window reaching past chrono's range expires nothing.
        let cutoff = started_at
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .timestamp();

        self.stats.incr_runs();
        self.stats.reset_delete_counts();

        let mut report = IndexDeleteReport {
            run_id,
            cutoff,
            dry_run: self.dry_run,
            started_at,
            ..Default::default()
        };

        info!(cutoff, "Index delete run started");

        let mut conn = self
            .repo
            .acquire()
            .await
            .map_err(IndexDeleteError::Acquire)?;

        let expired = select_expired(conn.as_mut(), cutoff).await?;
        report.selected.set(IndexTable::Endpoint, expired.endpoints.len() as u64);
        report
            .selected
            .set(IndexTable::TagEndpoint, expired.tag_endpoints.len() as u64);
        report
            .selected
            .set(IndexTable::EndpointCounter, expired.counters.len() as u64);

        if expired.is_empty() {
            info!("No expired index rows selected");
        } else {
            info!(
                endpoints = report.selected.endpoint,
                tag_endpoints = report.selected.tag_endpoint,
                counters = report.selected.endpoint_counter,
                "Selected expired index rows"
            );
        }

        if self.dry_run {
            info!(cutoff, "DRY RUN: Would delete index rows older than the cutoff");
        } else {
            for table in IndexTable::ALL {
                let deleted = conn
                    .delete_expired(table, cutoff)
                    .await
                    .map_err(|source| IndexDeleteError::Delete { table, source })?;

                self.stats.put_deleted(table, deleted);
                metrics::record_index_deletion(table.table_name(), deleted);
                report.deleted.set(table, deleted);

                debug!(table = %table, deleted, "Deleted expired index rows");
            }
        }

        for expired_counter in &expired.counters {
            self.reap_counter(expired_counter, &mut report).await;
        }

        report.finished_at = self.clock.now();
        report.duration_ms = start.elapsed().as_millis() as u64;

        let dry_run_msg = if self.dry_run { " (DRY RUN)" } else { "" };
        info!(
            endpoints = report.deleted.endpoint,
            tag_endpoints = report.deleted.tag_endpoint,
            counters = report.deleted.endpoint_counter,
            rrd_removed = report.rrd.removed,
            rrd_not_found = report.rrd.not_found,
            rrd_failed = report.rrd.failed,
            tag_parse_warnings = report.tag_parse_warnings,
            metricless_counters = report.metricless_counters,
            duration_ms = report.duration_ms,
            "Index delete run complete{}",
            dry_run_msg
        );

        Ok(report)
    }

    async fn reap_counter(&self, expired: &ExpiredCounter, report: &mut IndexDeleteReport) {
        let counter = &expired.counter;
        let ResolvedRrd {
            path,
            metric,
            tag_error,
            ..
        } = self.resolver.resolve(
            &expired.endpoint,
            &counter.counter,
            &counter.counter_type,
            counter.step,
        );

        if metric.is_empty() {
            report.metricless_counters += 1;
            warn!(
                endpoint = %expired.endpoint,
                counter = %counter.counter,
                path = %path.display(),
                "Counter key has no metric separator, RRD path uses an empty metric"
            );
        }

        if let Some(e) = tag_error {
            report.tag_parse_warnings += 1;
            warn!(
                endpoint = %expired.endpoint,
                counter = %counter.counter,
                error = %e,
                "Malformed counter tags, using partial tag set"
            );
        }

        if self.dry_run {
            info!(
                endpoint = %expired.endpoint,
                counter = %counter.counter,
                path = %path.display(),
                "DRY RUN: Would remove RRD file"
            );
            return;
        }

        let outcome = remove_rrd(&path).await;
        metrics::record_rrd_removal(outcome.outcome());

        match outcome {
            RrdRemoval::Removed => {
                report.rrd.removed += 1;
                info!(
                    endpoint = %expired.endpoint,
                    counter = %counter.counter,
                    path = %path.display(),
                    "Removed RRD file"
                );
            }
            RrdRemoval::NotFound => {
                report.rrd.not_found += 1;
                debug!(path = %path.display(), "RRD file not found");
            }
            RrdRemoval::Failed(source) => {
                report.rrd.failed += 1;
                report.rrd_errors.push(RrdRemovalError { path, source });
            }
        }
    }
}

/// Select everything expired at `cutoff`, attaching endpoint names to counters.
///
/// Endpoint names are looked up once per distinct endpoint id. A counter
/// whose endpoint row is missing fails the selection.
async fn select_expired(
    conn: &mut dyn IndexConnection,
    cutoff: i64,
) -> Result<ExpiredIndex, IndexDeleteError> {
    let endpoints = conn
        .select_expired_endpoints(cutoff)
        .await
        .map_err(|source| IndexDeleteError::Select {
            table: IndexTable::Endpoint,
            source,
        })?;
    for endpoint in &endpoints {
        debug!(id = endpoint.id, endpoint = %endpoint.endpoint, ts = endpoint.ts, "Expired endpoint");
    }

    let tag_endpoints = conn
        .select_expired_tag_endpoints(cutoff)
        .await
        .map_err(|source| IndexDeleteError::Select {
            table: IndexTable::TagEndpoint,
            source,
        })?;
    for tag in &tag_endpoints {
        debug!(id = tag.id, tag = %tag.tag, endpoint_id = tag.endpoint_id, ts = tag.ts, "Expired tag endpoint");
    }

    let rows = conn
        .select_expired_counters(cutoff)
        .await
        .map_err(|source| IndexDeleteError::Select {
            table: IndexTable::EndpointCounter,
            source,
        })?;

    let mut names: HashMap<i64, String> = HashMap::new();
    let mut counters = Vec::with_capacity(rows.len());
    for counter in rows {
        let endpoint = match names.get(&counter.endpoint_id) {
            Some(name) => name.clone(),
            None => {
                let enrich_err = |source: DbError| IndexDeleteError::Enrich {
                    endpoint_id: counter.endpoint_id,
                    counter_id: counter.id,
                    source,
                };
                let name = conn
                    .get_endpoint_name(counter.endpoint_id)
                    .await
                    .map_err(enrich_err)?
                    .ok_or_else(|| {
                        enrich_err(DbError::NotFound(format!(
                            "endpoint {}",
                            counter.endpoint_id
                        )))
                    })?;
                names.insert(counter.endpoint_id, name.clone());
                name
            }
        };

        debug!(
            id = counter.id,
            endpoint = %endpoint,
            counter = %counter.counter,
            step = counter.step,
            counter_type = %counter.counter_type,
            ts = counter.ts,
            "Expired endpoint counter"
        );
        counters.push(ExpiredCounter { endpoint, counter });
    }

    Ok(ExpiredIndex {
        endpoints,
        tag_endpoints,
        counters,
    })
}
