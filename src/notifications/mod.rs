use async_trait::async_trait;
use thiserror::Error;

use crate::scheduler::prober::ProbeError;

pub mod telegram;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers user-facing notices about failing targets.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    /// Tells the owner of `url` that its latest probe failed with `error`.
    async fn send_failure_notice(
        &self,
        owner_id: i64,
        url: &str,
        error: &ProbeError,
    ) -> Result<(), SenderError>;
}
