//! Snapshot history module.
//!
//! Provides the date-deduplicated snapshot store, named timeframe windows,
//! and the capture scheduler.

mod scheduler;
mod store;
mod timeframe;

pub use scheduler::{next_daily_check, CaptureTrigger, SnapshotScheduler};
pub use store::SnapshotStore;
pub use timeframe::{Timeframe, MS_PER_DAY};
