//! Writes probe outcomes to `url_status` and answers aggregate queries over it.

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait, FromQueryResult, Set,
    Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::entities::{prelude::*, url_status};
use crate::model::ProbeOutcome;
use crate::store::{StatisticsStore, StoreError};

/// Rows per INSERT statement, well below the Postgres bind-parameter limit.
const INSERT_CHUNK_SIZE: usize = 1000;

const CREATE_URL_STATUS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS url_status (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    url TEXT NOT NULL,
    status_code BIGINT NOT NULL,
    error TEXT NOT NULL DEFAULT '',
    ping_time DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    is_cancel BOOLEAN NOT NULL DEFAULT false
);
CREATE INDEX IF NOT EXISTS idx_url_status_user_url ON url_status (user_id, url, status_code);
"#;

const URL_STATISTIC_SELECT: &str = r#"
SELECT
    url,
    COUNT(*) AS count_ping,
    COUNT(*) FILTER (WHERE NOT is_cancel) AS correct_count,
    COUNT(*) FILTER (WHERE is_cancel) AS cancel_count,
    MAX(ping_time) FILTER (WHERE NOT is_cancel) AS max_connection_time,
    MIN(ping_time) FILTER (WHERE NOT is_cancel) AS min_connection_time,
    AVG(ping_time) FILTER (WHERE NOT is_cancel) AS avg_connection_time
FROM url_status
"#;

/// Aggregated probe history of one URL.
#[derive(FromQueryResult, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlStatistic {
    pub url: String,
    pub count_ping: i64,
    pub correct_count: i64,
    pub cancel_count: i64,
    pub max_connection_time: Option<f64>,
    pub min_connection_time: Option<f64>,
    pub avg_connection_time: Option<f64>,
}

#[derive(FromQueryResult, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub text: String,
    pub count: i64,
}

pub async fn ensure_statistics_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(CREATE_URL_STATUS_TABLE).await?;
    Ok(())
}

fn to_active_model(outcome: &ProbeOutcome) -> url_status::ActiveModel {
    url_status::ActiveModel {
        user_id: Set(outcome.target.owner_id),
        url: Set(outcome.target.url.clone()),
        status_code: Set(i64::from(outcome.http_status)),
        error: Set(outcome
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()),
        ping_time: Set(outcome.elapsed_seconds),
        created_at: Set(outcome.recorded_at),
        is_cancel: Set(outcome.cancelled),
        ..Default::default()
    }
}

#[derive(Clone, Debug)]
pub struct SeaOrmStatisticsStore {
    db: DatabaseConnection,
}

impl SeaOrmStatisticsStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Per-URL summary for every URL of one owner, slowest first.
    pub async fn statistics_by_owner(&self, owner_id: i64) -> Result<Vec<UrlStatistic>, DbErr> {
        UrlStatistic::find_by_statement(owner_statistics_statement(owner_id))
            .all(&self.db)
            .await
    }

    pub async fn statistics_by_url(
        &self,
        owner_id: i64,
        url: &str,
    ) -> Result<Option<UrlStatistic>, DbErr> {
        UrlStatistic::find_by_statement(url_statistics_statement(owner_id, url))
            .one(&self.db)
            .await
    }

    /// Distinct error texts recorded for a URL, most frequent first.
    pub async fn error_breakdown(&self, owner_id: i64, url: &str) -> Result<Vec<ErrorCount>, DbErr> {
        ErrorCount::find_by_statement(error_breakdown_statement(owner_id, url))
            .all(&self.db)
            .await
    }
}

fn owner_statistics_statement(owner_id: i64) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        format!(
            "{URL_STATISTIC_SELECT} WHERE user_id = $1 GROUP BY url ORDER BY avg_connection_time DESC NULLS LAST"
        ),
        [owner_id.into()],
    )
}

fn url_statistics_statement(owner_id: i64, url: &str) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        format!("{URL_STATISTIC_SELECT} WHERE user_id = $1 AND url = $2 GROUP BY url"),
        [owner_id.into(), url.into()],
    )
}

fn error_breakdown_statement(owner_id: i64, url: &str) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT error AS text, COUNT(*) AS count FROM url_status \
         WHERE user_id = $1 AND url = $2 AND error <> '' \
         GROUP BY error ORDER BY count DESC",
        [owner_id.into(), url.into()],
    )
}

#[async_trait]
impl StatisticsStore for SeaOrmStatisticsStore {
    async fn insert_batch(&self, batch: &[ProbeOutcome]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin().await?;
        for chunk in batch.chunks(INSERT_CHUNK_SIZE) {
            UrlStatus::insert_many(chunk.iter().map(to_active_model))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        debug!(rows = batch.len(), "Inserted probe outcomes.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonitoredTarget;
    use crate::scheduler::prober::ProbeError;
    use chrono::Utc;
    use sea_orm::{ActiveValue, Value};

    #[test]
    fn test_failed_outcome_maps_to_row() {
        let recorded_at = Utc::now();
        let outcome = ProbeOutcome {
            target: MonitoredTarget {
                owner_id: 9,
                url: "http://down.example".to_string(),
                connection_timeout: "2s".to_string(),
                poll_interval: "30s".to_string(),
                notify_on_failure: true,
            },
            error: Some(ProbeError::Timeout),
            http_status: 504,
            elapsed_seconds: 2.0,
            cancelled: false,
            recorded_at,
        };

        let row = to_active_model(&outcome);
        assert_eq!(row.user_id, ActiveValue::Set(9));
        assert_eq!(row.status_code, ActiveValue::Set(504));
        assert_eq!(row.error, ActiveValue::Set("request timed out".to_string()));
        assert_eq!(row.ping_time, ActiveValue::Set(2.0));
        assert_eq!(row.created_at, ActiveValue::Set(recorded_at));
        assert_eq!(row.is_cancel, ActiveValue::Set(false));
        assert!(row.id.is_not_set());
    }

    fn bound_values(statement: &Statement) -> Vec<Value> {
        statement
            .values
            .as_ref()
            .map(|values| values.0.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_owner_statistics_query() {
        let statement = owner_statistics_statement(42);
        assert_eq!(statement.db_backend, DbBackend::Postgres);
        assert!(statement.sql.contains("FROM url_status"));
        assert!(statement.sql.contains("COUNT(*) FILTER (WHERE is_cancel) AS cancel_count"));
        assert!(statement.sql.contains("WHERE user_id = $1 GROUP BY url"));
        assert!(statement.sql.ends_with("ORDER BY avg_connection_time DESC NULLS LAST"));
        assert_eq!(bound_values(&statement), vec![Value::from(42i64)]);
    }

    #[test]
    fn test_url_statistics_query_binds_owner_and_url() {
        let statement = url_statistics_statement(7, "http://a.example");
        assert!(statement.sql.contains("AVG(ping_time) FILTER (WHERE NOT is_cancel) AS avg_connection_time"));
        assert!(statement.sql.contains("WHERE user_id = $1 AND url = $2 GROUP BY url"));
        assert_eq!(
            bound_values(&statement),
            vec![Value::from(7i64), Value::from("http://a.example")]
        );
    }

    #[test]
    fn test_error_breakdown_skips_successful_probes() {
        let statement = error_breakdown_statement(7, "http://a.example");
        assert!(statement.sql.starts_with("SELECT error AS text, COUNT(*) AS count FROM url_status"));
        assert!(statement.sql.contains("AND error <> ''"));
        assert!(statement.sql.ends_with("ORDER BY count DESC"));
        assert_eq!(
            bound_values(&statement),
            vec![Value::from(7i64), Value::from("http://a.example")]
        );
    }
}
