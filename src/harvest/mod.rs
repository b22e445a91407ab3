//! Harvest module - bounded-wait snapshot acquisition.
//!
//! - **Consumer**: drains the line source and latches records
//! - **Watchdog**: races the consumer against the deadline
//! - **Pipeline**: the [`Harvester`] that wires both to a child process

pub mod consumer;
pub mod pipeline;
pub mod watchdog;

pub use consumer::{ConsumerExit, LineCounts};
pub use pipeline::{
    default_command, harvest, HarvestError, HarvestOutcome, HarvestStats, Harvester,
    DEFAULT_GRACE_PERIOD, DEFAULT_TIMEOUT,
};
pub use watchdog::{Watchdog, WatchdogState};
