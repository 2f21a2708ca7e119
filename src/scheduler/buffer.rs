use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::ProbeOutcome;

pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Accumulates completed probe outcomes until the flusher drains them.
///
/// The capacity only pre-sizes each fresh vector; appends are never rejected.
#[derive(Debug)]
pub struct ResultBuffer {
    capacity: usize,
    outcomes: Mutex<Vec<ProbeOutcome>>,
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl ResultBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outcomes: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    // Critical sections are a single push or swap; a poisoned guard still holds a valid Vec.
    fn lock(&self) -> MutexGuard<'_, Vec<ProbeOutcome>> {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, outcome: ProbeOutcome) {
        self.lock().push(outcome);
    }

    /// Swaps in an empty vector and returns everything appended so far.
    pub fn drain_and_reset(&self) -> Vec<ProbeOutcome> {
        let fresh = Vec::with_capacity(self.capacity);
        std::mem::replace(&mut *self.lock(), fresh)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonitoredTarget;
    use chrono::Utc;
    use std::sync::Arc;

    fn outcome(owner_id: i64) -> ProbeOutcome {
        ProbeOutcome {
            target: MonitoredTarget {
                owner_id,
                url: format!("http://host-{owner_id}"),
                connection_timeout: "1s".to_string(),
                poll_interval: "30s".to_string(),
                notify_on_failure: false,
            },
            error: None,
            http_status: 200,
            elapsed_seconds: 0.01,
            cancelled: false,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_then_drain_returns_once() {
        let buffer = ResultBuffer::new(4);
        buffer.append(outcome(1));

        let first = buffer.drain_and_reset();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].target.owner_id, 1);

        assert!(buffer.drain_and_reset().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capacity_is_not_a_limit() {
        let buffer = ResultBuffer::new(2);
        for i in 0..10 {
            buffer.append(outcome(i));
        }
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.drain_and_reset().len(), 10);
    }

    #[test]
    fn test_drains_do_not_overlap() {
        let buffer = ResultBuffer::default();
        buffer.append(outcome(1));
        buffer.append(outcome(2));
        let first = buffer.drain_and_reset();
        buffer.append(outcome(3));
        let second = buffer.drain_and_reset();

        let first_ids: Vec<i64> = first.iter().map(|o| o.target.owner_id).collect();
        let second_ids: Vec<i64> = second.iter().map(|o| o.target.owner_id).collect();
        assert_eq!(first_ids, vec![1, 2]);
        assert_eq!(second_ids, vec![3]);
    }

    async fn concurrent_appends(tasks: i64) {
        let buffer = Arc::new(ResultBuffer::new(8));
        let mut handles = Vec::new();
        for i in 0..tasks {
            let buffer = buffer.clone();
            handles.push(tokio::spawn(async move {
                buffer.append(outcome(i));
            }));
        }

        // Drain while producers are still running; the union must be complete.
        let mut collected = buffer.drain_and_reset();
        for handle in handles {
            handle.await.unwrap();
        }
        collected.extend(buffer.drain_and_reset());

        let mut ids: Vec<i64> = collected.iter().map(|o| o.target.owner_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..tasks).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_are_not_lost() {
        for tasks in [1, 10, 100] {
            concurrent_appends(tasks).await;
        }
    }
}
