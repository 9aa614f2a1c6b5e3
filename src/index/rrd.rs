//! RRD artifact paths and removal.
//!
//! Each `endpoint_counter` row owns one RRD file at
//! `<base>/<digest[0..2]>/<digest>_<type>_<step>.rrd`, where the digest comes
//! from the series checksum over (endpoint name, metric, tags).

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Serialize, Serializer};
use tracing::{debug, instrument, warn};

use crate::counter::{
    FalconTagParser, Md5Checksum, SeriesChecksum, TagParseError, TagParser, Tags,
};

/// Split a counter key on its first `/` into `(metric, raw_tags)`.
///
/// A key without `/` is treated as a bare tag string with an empty metric.
pub fn split_counter(counter_key: &str) -> (&str, &str) {
    match counter_key.split_once('/') {
        Some((metric, tags)) => (metric, tags),
        None => ("", counter_key),
    }
}

/// Path of the RRD file for an already computed digest.
pub fn rrd_file_path(base: &Path, digest: &str, counter_type: &str, step: i64) -> PathBuf {
    let shard = digest.get(..2).unwrap_or(digest);
    base.join(shard)
        .join(format!("{digest}_{counter_type}_{step}.rrd"))
}

/// Outcome of resolving one counter to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRrd {
    pub path: PathBuf,
    pub metric: String,
    /// Tags that went into the checksum. Partial if parsing failed.
    pub tags: Tags,
    /// Set when the tag string was malformed.
    pub tag_error: Option<TagParseError>,
}

/// Maps counters to RRD files under one storage root.
#[derive(Clone)]
pub struct RrdPathResolver {
    base: PathBuf,
    tags: Arc<dyn TagParser>,
    checksum: Arc<dyn SeriesChecksum>,
}

impl fmt::Debug for RrdPathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RrdPathResolver")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl RrdPathResolver {
    /// Resolver using the platform tag format and MD5 checksum.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            tags: Arc::new(FalconTagParser),
            checksum: Arc::new(Md5Checksum),
        }
    }

    pub fn with_tag_parser(mut self, tags: Arc<dyn TagParser>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_checksum(mut self, checksum: Arc<dyn SeriesChecksum>) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Compute the file path for a counter. Pure: touches no filesystem.
    ///
    /// A malformed tag string does not fail resolution; the partial tag set
    /// is used and the parse error is returned alongside the path.
    pub fn resolve(
        &self,
        endpoint: &str,
        counter_key: &str,
        counter_type: &str,
        step: i64,
    ) -> ResolvedRrd {
        let (metric, raw_tags) = split_counter(counter_key);

        let (tags, tag_error) = match self.tags.parse(raw_tags) {
            Ok(tags) => (tags, None),
            Err(e) => (e.partial().clone(), Some(e)),
        };

        let digest = self.checksum.checksum(endpoint, metric, &tags);

        ResolvedRrd {
            path: rrd_file_path(&self.base, &digest, counter_type, step),
            metric: metric.to_string(),
            tags,
            tag_error,
        }
    }
}

/// Result of trying to delete one RRD file.
#[derive(Debug)]
pub enum RrdRemoval {
    Removed,
    NotFound,
    Failed(std::io::Error),
}

impl RrdRemoval {
    /// Label used in metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            RrdRemoval::Removed => "removed",
            RrdRemoval::NotFound => "not_found",
            RrdRemoval::Failed(_) => "failed",
        }
    }
}

/// Delete an RRD file. Never fails the caller; the outcome says what happened.
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn remove_rrd(path: &Path) -> RrdRemoval {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("RRD file removed");
            RrdRemoval::Removed
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("RRD file already gone");
            RrdRemoval::NotFound
        }
        Err(e) => {
            warn!(error = %e, "Failed to remove RRD file");
            RrdRemoval::Failed(e)
        }
    }
}

/// A file that could not be removed.
#[derive(Debug, thiserror::Error, Serialize)]
#[error("failed to remove {}: {source}", .path.display())]
pub struct RrdRemovalError {
    pub path: PathBuf,
    #[source]
    #[serde(rename = "error", serialize_with = "serialize_display")]
    pub source: std::io::Error,
}

fn serialize_display<S: Serializer>(e: &std::io::Error, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(e)
}

/// Every removal failure of one run.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RrdRemovalErrors(Vec<RrdRemovalError>);

impl RrdRemovalErrors {
    pub fn push(&mut self, error: RrdRemovalError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RrdRemovalError> {
        self.0.iter()
    }
}

impl fmt::Display for RrdRemovalErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} RRD file(s) could not be removed", self.0.len())?;
        for e in &self.0 {
            write!(f, "; {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RrdRemovalErrors {}
