//! Expires stale graph index rows (`endpoint`, `tag_endpoint`,
//! `endpoint_counter`) and removes the RRD files of expired counters.

pub mod config;
pub mod counter;
pub mod db;
pub mod index;
pub mod models;
pub mod observability;
