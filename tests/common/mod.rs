#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use pingwatch::model::{MonitoredTarget, ProbeOutcome, TargetGroups};
use pingwatch::notifications::{FailureNotifier, SenderError};
use pingwatch::scheduler::ProbeError;
use pingwatch::store::{StatisticsStore, StoreError, TargetStore};

pub fn target(owner_id: i64, url: &str, interval: &str) -> MonitoredTarget {
    MonitoredTarget {
        owner_id,
        url: url.to_string(),
        connection_timeout: "1s".to_string(),
        poll_interval: interval.to_string(),
        notify_on_failure: false,
    }
}

pub fn outcome(owner_id: i64) -> ProbeOutcome {
    ProbeOutcome {
        target: target(owner_id, &format!("http://host-{owner_id}"), "30s"),
        error: None,
        http_status: 200,
        elapsed_seconds: 0.05,
        cancelled: false,
        recorded_at: Utc::now(),
    }
}

/// Polls `condition` until it holds or `limit` elapses.
pub async fn wait_until<F: Fn() -> bool>(limit: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[derive(Default)]
pub struct MemoryTargetStore {
    targets: Mutex<Vec<MonitoredTarget>>,
    list_calls: AtomicUsize,
    count_calls: AtomicUsize,
    fail_listing: AtomicBool,
}

impl MemoryTargetStore {
    pub fn new(targets: Vec<MonitoredTarget>) -> Self {
        Self {
            targets: Mutex::new(targets),
            ..Default::default()
        }
    }

    pub fn set_targets(&self, targets: Vec<MonitoredTarget>) {
        *self.targets.lock().unwrap() = targets;
    }

    pub fn push(&self, target: MonitoredTarget) {
        self.targets.lock().unwrap().push(target);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn list_targets(&self, limit: u64, offset: u64) -> Result<TargetGroups, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("listing disabled".to_string()));
        }
        let targets = self.targets.lock().unwrap();
        Ok(targets
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_targets(&self) -> Result<u64, StoreError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.targets.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryStatisticsStore {
    batches: Mutex<Vec<Vec<ProbeOutcome>>>,
    fail_writes: AtomicBool,
}

impl MemoryStatisticsStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn total_rows(&self) -> usize {
        self.batch_sizes().iter().sum()
    }
}

#[async_trait]
impl StatisticsStore for MemoryStatisticsStore {
    async fn insert_batch(&self, batch: &[ProbeOutcome]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("statistics store down".to_string()));
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(i64, String, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(i64, String, String)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl FailureNotifier for RecordingNotifier {
    async fn send_failure_notice(
        &self,
        owner_id: i64,
        url: &str,
        error: &ProbeError,
    ) -> Result<(), SenderError> {
        self.notices
            .lock()
            .unwrap()
            .push((owner_id, url.to_string(), error.to_string()));
        Ok(())
    }
}
