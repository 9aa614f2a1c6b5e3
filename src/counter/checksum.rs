//! Series checksums.
//!
//! Every component that reads or writes RRD files derives the file name from
//! the same digest, so the primary-key layout and hash here must stay
//! byte-for-byte compatible with the rest of the platform.

use md5::{Digest, Md5};

use super::tags::Tags;

/// Computes the digest that names a series on disk.
pub trait SeriesChecksum: Send + Sync {
    /// Lowercase hex digest of (endpoint, metric, tags).
    fn checksum(&self, endpoint: &str, metric: &str, tags: &Tags) -> String;
}

/// `md5_hex(primary_key)`, the platform's series checksum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Checksum;

impl SeriesChecksum for Md5Checksum {
    fn checksum(&self, endpoint: &str, metric: &str, tags: &Tags) -> String {
        md5_hex(&primary_key(endpoint, metric, tags))
    }
}

/// `k=v` pairs ordered by key and joined with `,`.
pub fn sorted_tags(tags: &Tags) -> String {
    tags.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// `endpoint/metric` or `endpoint/metric/sorted_tags` when tags are present.
pub fn primary_key(endpoint: &str, metric: &str, tags: &Tags) -> String {
    if tags.is_empty() {
        format!("{endpoint}/{metric}")
    } else {
        format!("{endpoint}/{metric}/{}", sorted_tags(tags))
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
