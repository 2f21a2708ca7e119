use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::{DEFAULT_REFRESH_CHECK_INTERVAL, SchedulerSettings};
use super::buffer::ResultBuffer;
use super::flusher::{FlushReport, FlusherHandle};
use super::group_runner::{GroupHandle, IntervalGroupRunner};
use super::prober::Prober;
use crate::model::{ChangeEvent, TargetGroups};
use crate::store::{StoreError, TargetStore};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Failed to count targets: {0}")]
    TargetCount(#[source] StoreError),
    #[error("Failed to load targets: {0}")]
    TargetLoad(#[source] StoreError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The event does not affect the schedule.
    Ignored,
    /// Target count unchanged; nothing was reloaded.
    Unchanged,
    Regrouped { groups: usize, targets: usize },
}

/// Non-blocking producer side of the change-event channel.
#[derive(Clone, Debug)]
pub struct ChangeEventSender {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChangeEventSender {
    /// Hands the event to the scheduler without waiting. Returns false when
    /// the event was dropped because the queue is full or closed.
    pub fn notify(&self, event: ChangeEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(command = %event.command, "Change event queue full, dropping event.");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(command = %event.command, "Scheduler no longer listens for change events.");
                false
            }
        }
    }
}

pub fn change_event_channel(capacity: usize) -> (ChangeEventSender, mpsc::Receiver<ChangeEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChangeEventSender { tx }, rx)
}

/// Owns the live schedule: one running group per poll interval.
pub struct SchedulerController {
    target_store: Arc<dyn TargetStore>,
    prober: Arc<Prober>,
    buffer: Arc<ResultBuffer>,
    settings: SchedulerSettings,
    limiter: Option<Arc<Semaphore>>,
    groups: HashMap<String, GroupHandle>,
    known_target_count: u64,
}

impl SchedulerController {
    pub fn new(
        target_store: Arc<dyn TargetStore>,
        prober: Arc<Prober>,
        buffer: Arc<ResultBuffer>,
        settings: SchedulerSettings,
    ) -> Self {
        let limiter = settings
            .max_concurrent_probes
            .map(|permits| Arc::new(Semaphore::new(permits.max(1))));
        Self {
            target_store,
            prober,
            buffer,
            settings,
            limiter,
            groups: HashMap::new(),
            known_target_count: 0,
        }
    }

    pub fn buffer(&self) -> &Arc<ResultBuffer> {
        &self.buffer
    }

    pub fn known_target_count(&self) -> u64 {
        self.known_target_count
    }

    /// Interval keys with a running group, sorted.
    pub fn active_groups(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn group(&self, key: &str) -> Option<&GroupHandle> {
        self.groups.get(key)
    }

    /// Loads every target and starts one group per interval key.
    /// Returns the number of groups started.
    pub async fn start(&mut self) -> Result<usize, SchedulerError> {
        match self.target_store.count_targets().await {
            Ok(count) => self.known_target_count = count,
            // The next refresh will see a changed count and regroup.
            Err(e) => warn!(error = %e, "Failed to count targets at startup."),
        }

        let groups = self.load_groups().await?;
        let started = groups.len();
        info!(
            groups = started,
            targets = groups.target_count(),
            "Starting probe scheduler."
        );
        self.start_groups(groups);
        Ok(started)
    }

    /// Mute toggles keep the target count, so a matching event always
    /// reloads instead of going through the count check.
    pub async fn handle_change_event(
        &mut self,
        event: &ChangeEvent,
    ) -> Result<RefreshOutcome, SchedulerError> {
        if !event.requires_refresh() {
            return Ok(RefreshOutcome::Ignored);
        }
        debug!(command = %event.command, phase = ?event.phase, "Change event requires refresh.");
        self.refresh(true).await
    }

    /// Rebuilds the schedule when the target count changed, or always when
    /// `force` is set. On a load failure the current schedule keeps running.
    pub async fn refresh(&mut self, force: bool) -> Result<RefreshOutcome, SchedulerError> {
        let count = self
            .target_store
            .count_targets()
            .await
            .map_err(SchedulerError::TargetCount)?;

        debug!(old_count = self.known_target_count, new_count = count, force, "Checking target count.");
        if count == self.known_target_count && !force {
            return Ok(RefreshOutcome::Unchanged);
        }

        let groups = self.load_groups().await?;
        self.stop_all().await;

        self.known_target_count = count;
        let outcome = RefreshOutcome::Regrouped {
            groups: groups.len(),
            targets: groups.target_count(),
        };
        info!(?outcome, "Rebuilt probe schedule.");
        self.start_groups(groups);
        Ok(outcome)
    }

    /// Stops every running group and waits until each has acknowledged.
    pub async fn stop_all(&mut self) {
        if self.groups.is_empty() {
            return;
        }
        let handles: Vec<GroupHandle> = self.groups.drain().map(|(_, handle)| handle).collect();
        let stopped = handles.len();
        join_all(handles.into_iter().map(GroupHandle::stop)).await;
        debug!(groups = stopped, "All interval groups stopped.");
    }

    /// Event loop: reacts to change events, periodically checks the target
    /// count, and on `shutdown` stops all groups and performs the final flush.
    pub async fn run<F>(
        mut self,
        mut events: mpsc::Receiver<ChangeEvent>,
        flusher: FlusherHandle,
        shutdown: F,
    ) -> FlushReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let period = if self.settings.refresh_check_interval.is_zero() {
            DEFAULT_REFRESH_CHECK_INTERVAL
        } else {
            self.settings.refresh_check_interval
        };
        let mut refresh_ticker = interval_at(Instant::now() + period, period);
        refresh_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested.");
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_change_event(&event).await {
                            error!(command = %event.command, error = %e, "Refresh after change event failed.");
                        }
                    }
                    None => {
                        info!("Change event channel closed, relying on periodic refresh.");
                        events_open = false;
                    }
                },
                _ = refresh_ticker.tick() => {
                    if let Err(e) = self.refresh(false).await {
                        error!(error = %e, "Periodic refresh failed.");
                    }
                }
            }
        }

        self.shutdown(flusher).await
    }

    pub async fn shutdown(mut self, flusher: FlusherHandle) -> FlushReport {
        self.stop_all().await;
        let report = flusher.shutdown().await;
        info!(?report, "Probe scheduler stopped.");
        report
    }

    async fn load_groups(&self) -> Result<TargetGroups, SchedulerError> {
        let page_size = self.settings.target_page_size.max(1);
        let mut groups = TargetGroups::new();
        let mut offset = 0;
        loop {
            let page = self
                .target_store
                .list_targets(page_size, offset)
                .await
                .map_err(SchedulerError::TargetLoad)?;
            let fetched = page.target_count() as u64;
            groups.merge(page);
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        Ok(groups)
    }

    fn start_groups(&mut self, groups: TargetGroups) {
        if groups.is_empty() {
            info!("No targets to probe, waiting for changes.");
            return;
        }
        for (key, targets) in groups {
            let handle = IntervalGroupRunner::new(
                key.clone(),
                targets,
                self.settings.default_poll_interval,
                self.prober.clone(),
                self.buffer.clone(),
            )
            .with_limiter(self.limiter.clone())
            .spawn();
            self.groups.insert(key, handle);
        }
    }
}
