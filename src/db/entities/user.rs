use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registered chat user; `id` doubles as the Telegram chat id.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub login: String,
    pub mute: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ping_target::Entity")]
    PingTargets,
}

impl Related<super::ping_target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PingTargets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
