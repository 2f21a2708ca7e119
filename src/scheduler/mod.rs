//! Probe scheduling and result aggregation.
//!
//! The [`SchedulerController`] groups targets by poll interval and runs one
//! [`IntervalGroupRunner`] per group. Every tick fans out [`Prober`] calls
//! whose outcomes land in the shared [`ResultBuffer`], which the [`Flusher`]
//! periodically drains into the statistics store.

pub mod buffer;
pub mod controller;
pub mod flusher;
pub mod group_runner;
pub mod prober;

use std::time::Duration;

pub use buffer::{DEFAULT_BUFFER_CAPACITY, ResultBuffer};
pub use controller::{
    ChangeEventSender, RefreshOutcome, SchedulerController, SchedulerError, change_event_channel,
};
pub use flusher::{DEFAULT_FLUSH_INTERVAL, FlushReport, Flusher, FlusherHandle};
pub use group_runner::{GroupHandle, IntervalGroupRunner, RunnerState};
pub use prober::{NO_RESPONSE_STATUS, ProbeError, Prober};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TARGET_PAGE_SIZE: u64 = 100;
pub const DEFAULT_CHANGE_EVENT_CAPACITY: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Used for groups whose interval key does not parse.
    pub default_poll_interval: Duration,
    pub flush_interval: Duration,
    /// Cadence of the cheap count-based change check.
    pub refresh_check_interval: Duration,
    pub target_page_size: u64,
    pub buffer_capacity: usize,
    pub change_event_capacity: usize,
    /// Upper bound on probes in flight across all groups; unbounded when `None`.
    pub max_concurrent_probes: Option<usize>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_poll_interval: DEFAULT_POLL_INTERVAL,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            refresh_check_interval: DEFAULT_REFRESH_CHECK_INTERVAL,
            target_page_size: DEFAULT_TARGET_PAGE_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            change_event_capacity: DEFAULT_CHANGE_EVENT_CAPACITY,
            max_concurrent_probes: None,
        }
    }
}
