//! SeaORM entities for the tables the scheduler reads and writes.

pub mod ping_target;
pub mod url_status;
pub mod user;

pub mod prelude {
    pub use super::ping_target::Entity as PingTarget;
    pub use super::url_status::Entity as UrlStatus;
    pub use super::user::Entity as User;
}
