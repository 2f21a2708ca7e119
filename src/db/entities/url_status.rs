use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One recorded probe outcome.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "url_status")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub status_code: i64,
    /// Empty when the probe got a response.
    pub error: String,
    /// Elapsed seconds of the probe.
    pub ping_time: f64,
    pub created_at: ChronoDateTimeUtc,
    pub is_cancel: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
