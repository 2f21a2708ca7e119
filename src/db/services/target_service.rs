//! Reads ping targets, joined with their owners, for the scheduler.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};

use crate::db::entities::{ping_target, prelude::*, user};
use crate::model::{MonitoredTarget, TargetGroups};
use crate::store::{StoreError, TargetStore};

#[derive(Clone, Debug)]
pub struct SeaOrmTargetStore {
    db: DatabaseConnection,
}

impl SeaOrmTargetStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Owners that muted notifications still get probed, just not notified.
fn to_monitored_target(target: ping_target::Model, owner: Option<user::Model>) -> MonitoredTarget {
    MonitoredTarget {
        owner_id: target.user_id,
        url: target.url,
        connection_timeout: target.connection_time,
        poll_interval: target.ping_time,
        notify_on_failure: owner.map(|u| !u.mute).unwrap_or(true),
    }
}

#[async_trait]
impl TargetStore for SeaOrmTargetStore {
    async fn list_targets(&self, limit: u64, offset: u64) -> Result<TargetGroups, StoreError> {
        let rows = PingTarget::find()
            .find_also_related(User)
            .order_by_asc(ping_target::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(target, owner)| to_monitored_target(target, owner))
            .collect())
    }

    async fn count_targets(&self) -> Result<u64, StoreError> {
        Ok(PingTarget::find().count(&self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(mute: Option<bool>) -> (ping_target::Model, Option<user::Model>) {
        let target = ping_target::Model {
            id: 1,
            user_id: 42,
            url: "https://example.com".to_string(),
            connection_time: "5s".to_string(),
            ping_time: "1m".to_string(),
        };
        let owner = mute.map(|mute| user::Model {
            id: 42,
            login: "alice".to_string(),
            mute,
        });
        (target, owner)
    }

    #[test]
    fn test_muted_owner_disables_notifications() {
        let (target, owner) = row(Some(true));
        let monitored = to_monitored_target(target, owner);
        assert!(!monitored.notify_on_failure);
        assert_eq!(monitored.owner_id, 42);
        assert_eq!(monitored.poll_interval, "1m");
        assert_eq!(monitored.connection_timeout, "5s");
    }

    #[test]
    fn test_unmuted_or_missing_owner_notifies() {
        let (target, owner) = row(Some(false));
        assert!(to_monitored_target(target, owner).notify_on_failure);
        let (target, owner) = row(None);
        assert!(to_monitored_target(target, owner).notify_on_failure);
    }
}
