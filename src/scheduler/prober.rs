use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::duration::{DurationParseError, parse_duration};
use crate::model::{MonitoredTarget, ProbeOutcome};
use crate::notifications::FailureNotifier;

/// Status recorded when no HTTP response was received.
pub const NO_RESPONSE_STATUS: u16 = 504;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("invalid connection timeout {value:?}: {source}")]
    InvalidTimeout {
        value: String,
        source: DurationParseError,
    },
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl ProbeError {
    /// True for failures of the network round trip itself, as opposed to
    /// a target whose stored settings are unusable.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ProbeError::InvalidTimeout { .. })
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout
        } else if e.is_connect() {
            ProbeError::Connect(e.to_string())
        } else {
            ProbeError::Request(e.to_string())
        }
    }
}

/// Executes single timed GET requests against targets.
#[derive(Clone)]
pub struct Prober {
    client: Client,
    notifier: Option<Arc<dyn FailureNotifier>>,
}

impl Prober {
    pub fn new(notifier: Option<Arc<dyn FailureNotifier>>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("pingwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, notifier))
    }

    pub fn with_client(client: Client, notifier: Option<Arc<dyn FailureNotifier>>) -> Self {
        Self { client, notifier }
    }

    pub async fn probe(&self, target: &MonitoredTarget) -> ProbeOutcome {
        let timeout = match parse_duration(&target.connection_timeout) {
            Ok(timeout) => timeout,
            Err(source) => {
                warn!(
                    owner_id = target.owner_id,
                    url = %target.url,
                    value = %target.connection_timeout,
                    error = %source,
                    "Skipping probe: stored connection timeout is not a valid duration."
                );
                let error = ProbeError::InvalidTimeout {
                    value: target.connection_timeout.clone(),
                    source,
                };
                return build_outcome(target, Some(error), NO_RESPONSE_STATUS, 0.0);
            }
        };

        let started = Instant::now();
        let mut request = self.client.get(&target.url);
        // A zero timeout means no deadline.
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                drop(response);
                let elapsed = started.elapsed().as_secs_f64();
                debug!(url = %target.url, status, elapsed, "Probe completed.");
                build_outcome(target, None, status, elapsed)
            }
            Err(e) => {
                let elapsed = started.elapsed().as_secs_f64();
                let error = ProbeError::from(e);
                debug!(url = %target.url, error = %error, elapsed, "Probe failed.");
                self.notify_failure(target, &error);
                build_outcome(target, Some(error), NO_RESPONSE_STATUS, elapsed)
            }
        }
    }

    fn notify_failure(&self, target: &MonitoredTarget, error: &ProbeError) {
        if !target.notify_on_failure {
            return;
        }
        let Some(notifier) = self.notifier.clone() else {
            return;
        };

        let owner_id = target.owner_id;
        let url = target.url.clone();
        let error = error.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_failure_notice(owner_id, &url, &error).await {
                error!(owner_id, url = %url, error = %e, "Failed to deliver failure notice.");
            }
        });
    }
}

fn build_outcome(
    target: &MonitoredTarget,
    error: Option<ProbeError>,
    http_status: u16,
    elapsed_seconds: f64,
) -> ProbeOutcome {
    ProbeOutcome {
        target: target.clone(),
        error,
        http_status,
        elapsed_seconds,
        cancelled: false,
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_timeout_is_not_transport() {
        let err = ProbeError::InvalidTimeout {
            value: "soon".to_string(),
            source: DurationParseError::Invalid("soon".to_string()),
        };
        assert!(!err.is_transport());
        assert!(ProbeError::Timeout.is_transport());
        assert!(ProbeError::Connect("refused".to_string()).is_transport());
    }

    #[tokio::test]
    async fn test_probe_with_bad_timeout_fails_fast() {
        let prober = Prober::new(None).unwrap();
        let target = MonitoredTarget {
            owner_id: 7,
            url: "http://127.0.0.1:9".to_string(),
            connection_timeout: "five seconds".to_string(),
            poll_interval: "30s".to_string(),
            notify_on_failure: true,
        };

        let outcome = prober.probe(&target).await;
        assert_eq!(outcome.http_status, NO_RESPONSE_STATUS);
        assert_eq!(outcome.elapsed_seconds, 0.0);
        assert!(!outcome.cancelled);
        assert!(matches!(
            outcome.error,
            Some(ProbeError::InvalidTimeout { .. })
        ));
    }
}
