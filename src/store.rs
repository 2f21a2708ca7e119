//! Storage seams used by the scheduler. The sea-orm backed implementations
//! live in [`crate::db::services`].

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ProbeOutcome, TargetGroups};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the persisted target definitions.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Returns one page of targets, already grouped by poll interval.
    async fn list_targets(&self, limit: u64, offset: u64) -> Result<TargetGroups, StoreError>;

    async fn count_targets(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Writes one batch of outcomes; all or nothing.
    async fn insert_batch(&self, batch: &[ProbeOutcome]) -> Result<(), StoreError>;
}
