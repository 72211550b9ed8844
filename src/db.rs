pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{FIXTURE_TOKEN, FIXTURE_USERID, IdentityRecord};
pub use self::provision::Provisioner;
pub use self::stores::IdentityStore;

pub mod error;
pub mod manager;
pub mod models;
pub mod pool;
pub mod provision;
pub mod schema;
pub mod stores;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub mod mysql;
