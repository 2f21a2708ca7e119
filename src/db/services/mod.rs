pub mod statistics_service;
pub mod target_service;

pub use statistics_service::{ErrorCount, SeaOrmStatisticsStore, UrlStatistic, ensure_statistics_schema};
pub use target_service::SeaOrmTargetStore;
