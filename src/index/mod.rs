//! Index expiry: selects stale graph index rows, deletes them, and reaps the
//! RRD files of expired counters.
//!
//! [`IndexDeleteTask`] is the service; [`start_index_delete_worker`] drives it
//! on a [`WeeklySchedule`].

mod clock;
mod error;
mod report;
mod rrd;
mod schedule;
mod stats;
mod task;
mod worker;


pub use clock::*;
pub use error::*;
pub use report::*;
pub use rrd::*;
pub use schedule::*;
pub use stats::*;
pub use task::*;
pub use worker::*;
