use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::buffer::ResultBuffer;
use crate::store::StatisticsStore;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushReport {
    Empty,
    Written(usize),
    /// The batch could not be written and was discarded.
    Dropped(usize),
}

/// Moves buffered outcomes into the statistics store.
pub struct Flusher {
    buffer: Arc<ResultBuffer>,
    store: Arc<dyn StatisticsStore>,
    interval: Duration,
}

impl Flusher {
    pub fn new(buffer: Arc<ResultBuffer>, store: Arc<dyn StatisticsStore>, interval: Duration) -> Self {
        Self {
            buffer,
            store,
            interval,
        }
    }

    /// Drains the buffer and writes the batch. Failed batches are not retried.
    pub async fn flush_once(&self) -> FlushReport {
        let batch = self.buffer.drain_and_reset();
        if batch.is_empty() {
            debug!("No outcomes to flush.");
            return FlushReport::Empty;
        }

        let rows = batch.len();
        match self.store.insert_batch(&batch).await {
            Ok(()) => {
                info!(rows, "Flushed probe outcomes to statistics store.");
                FlushReport::Written(rows)
            }
            Err(e) => {
                error!(rows, error = %e, "Failed to write probe outcomes; batch discarded.");
                FlushReport::Dropped(rows)
            }
        }
    }

    pub fn spawn(self) -> FlusherHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(shutdown_rx).instrument(info_span!("flusher")));
        FlusherHandle {
            shutdown_tx,
            handle,
        }
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> FlushReport {
        let period = if self.interval.is_zero() {
            DEFAULT_FLUSH_INTERVAL
        } else {
            self.interval
        };
        info!(period_secs = period.as_secs(), "Flusher started.");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
            }
        }

        info!("Flusher shutting down, writing remaining outcomes.");
        self.flush_once().await
    }
}

pub struct FlusherHandle {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<FlushReport>,
}

impl FlusherHandle {
    /// Signals shutdown and waits for the final drain-and-write.
    pub async fn shutdown(self) -> FlushReport {
        let _ = self.shutdown_tx.send(());
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Flusher task ended abnormally.");
                FlushReport::Empty
            }
        }
    }
}
