use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, info, info_span, warn};

use super::buffer::ResultBuffer;
use super::prober::Prober;
use crate::duration::parse_duration;
use crate::model::MonitoredTarget;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Stopped,
}

/// Resolves an interval key to a tick period, falling back to `default`
/// when the key is malformed or zero.
pub fn resolve_period(key: &str, default: Duration) -> Duration {
    match parse_duration(key) {
        Ok(period) if !period.is_zero() => period,
        Ok(_) => {
            warn!(interval = %key, default_secs = default.as_secs(), "Zero poll interval, using default.");
            default
        }
        Err(e) => {
            warn!(interval = %key, error = %e, default_secs = default.as_secs(), "Unparseable poll interval, using default.");
            default
        }
    }
}

/// Drives the probes of every target sharing one poll interval.
pub struct IntervalGroupRunner {
    key: String,
    targets: Arc<[MonitoredTarget]>,
    default_period: Duration,
    prober: Arc<Prober>,
    buffer: Arc<ResultBuffer>,
    limiter: Option<Arc<Semaphore>>,
}

impl IntervalGroupRunner {
    pub fn new(
        key: impl Into<String>,
        targets: Vec<MonitoredTarget>,
        default_period: Duration,
        prober: Arc<Prober>,
        buffer: Arc<ResultBuffer>,
    ) -> Self {
        Self {
            key: key.into(),
            targets: targets.into(),
            default_period,
            prober,
            buffer,
            limiter: None,
        }
    }

    /// Caps concurrent probes with a semaphore shared across groups.
    pub fn with_limiter(mut self, limiter: Option<Arc<Semaphore>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn spawn(self) -> GroupHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(RunnerState::Idle);
        let key = self.key.clone();
        let span = info_span!("interval_group", interval = %key);
        let handle = tokio::spawn(self.run(stop_rx, state_tx).instrument(span));

        GroupHandle {
            key,
            stop_tx,
            state_rx,
            handle,
        }
    }

    async fn run(self, mut stop_rx: oneshot::Receiver<()>, state_tx: watch::Sender<RunnerState>) {
        let period = resolve_period(&self.key, self.default_period);
        state_tx.send_replace(RunnerState::Running);
        info!(
            targets = self.targets.len(),
            period_ms = period.as_millis() as u64,
            "Interval group started."
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                // A dropped sender counts as a stop request.
                _ = &mut stop_rx => break,
                _ = ticker.tick() => self.dispatch_tick(),
            }
        }

        state_tx.send_replace(RunnerState::Stopped);
        info!("Interval group stopped.");
    }

    fn dispatch_tick(&self) {
        debug!(targets = self.targets.len(), "Dispatching probes.");
        for target in self.targets.iter() {
            let target = target.clone();
            let prober = self.prober.clone();
            let buffer = self.buffer.clone();
            let limiter = self.limiter.clone();
            tokio::spawn(
                async move {
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };
                    let outcome = prober.probe(&target).await;
                    buffer.append(outcome);
                }
                .in_current_span(),
            );
        }
    }
}

/// Controller-side handle to a running group.
pub struct GroupHandle {
    key: String,
    stop_tx: oneshot::Sender<()>,
    state_rx: watch::Receiver<RunnerState>,
    handle: JoinHandle<()>,
}

impl GroupHandle {
    pub fn state(&self) -> RunnerState {
        *self.state_rx.borrow()
    }

    /// Stops future ticks and waits for the runner task to exit. Probes
    /// already dispatched keep running and still reach the buffer.
    pub async fn stop(self) -> RunnerState {
        // The runner may already be gone; the join below still acknowledges.
        let _ = self.stop_tx.send(());
        if let Err(e) = self.handle.await {
            warn!(interval = %self.key, error = %e, "Interval group task ended abnormally.");
        }
        *self.state_rx.borrow()
    }
}
