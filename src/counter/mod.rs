//! Counter keys: tag parsing and the series checksum used to name RRD files.

mod checksum;
mod tags;

pub use checksum::*;
pub use tags::*;
