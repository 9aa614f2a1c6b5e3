//! Tag-string parsing for counter keys.
//!
//! A counter key carries its tag set as `k1=v1,k2=v2` after the metric name.
//! Writers are not always careful about whitespace or well-formed pairs, so
//! the parser is lenient about spaces and reports malformed entries together
//! with whatever it managed to parse before them.

use std::collections::BTreeMap;

/// A parsed tag set. Ordered by key, which is also the canonical order used
/// when the tag set is folded into a checksum.
pub type Tags = BTreeMap<String, String>;

/// Error from parsing a tag string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagParseError {
    /// An entry had no `=`. Parsing stopped there; `partial` holds the pairs
    /// read before it.
    #[error("bad tag {tag}")]
    BadTag { tag: String, partial: Tags },
}

impl TagParseError {
    /// The tag set parsed before the failure.
    pub fn partial(&self) -> &Tags {
        match self {
            TagParseError::BadTag { partial, .. } => partial,
        }
    }
}

/// Parses the raw tag part of a counter key.
pub trait TagParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Tags, TagParseError>;
}

/// The platform's tag format: spaces are insignificant, pairs are separated
/// by `,` and split on the first `=`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FalconTagParser;

impl TagParser for FalconTagParser {
    fn parse(&self, raw: &str) -> Result<Tags, TagParseError> {
        split_tags_string(raw)
    }
}

/// Parse `k1=v1,k2=v2` into a tag map.
///
/// Later duplicates of a key overwrite earlier ones.
pub fn split_tags_string(raw: &str) -> Result<Tags, TagParseError> {
    let compact: String = raw.chars().filter(|c| *c != ' ').collect();
    let mut tags = Tags::new();

    if compact.is_empty() {
        return Ok(tags);
    }

    for entry in compact.split(',') {
        match entry.split_once('=') {
            Some((key, value)) => {
                tags.insert(key.to_string(), value.to_string());
            }
            None => {
                return Err(TagParseError::BadTag {
                    tag: entry.to_string(),
                    partial: tags,
                });
            }
        }
    }

    Ok(tags)
}
