pub mod config;
pub mod db;
pub mod duration;
pub mod model;
pub mod notifications;
pub mod scheduler;
pub mod store;
