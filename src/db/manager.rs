use crate::config::{ConfigError, DatabaseConfig, DbType};
use crate::db::pool::PoolSettings;
use crate::db::{DatabaseError, IdentityStore};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "mysql")]
use crate::db::mysql::MysqlIdentityStore;
#[cfg(feature = "postgres")]
use crate::db::postgres::PostgresIdentityStore;
#[cfg(feature = "sqlite")]
use crate::db::sqlite::SqliteIdentityStore;

#[derive(Clone)]
pub struct DatabaseManager {
    store: Arc<dyn IdentityStore>,
    db_type: DbType,
}

impl DatabaseManager {
    /// Connects the driver selected by `config`. Fails when the backend is not
    /// compiled in or cannot be reached within the lookup timeout.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        config.validate()?;
        let db_type = config.db_type();
        let target = config.connection_url()?;
        let settings = PoolSettings {
            max_size: config.max_connections,
            min_idle: config.min_connections(),
            timeout: config.lookup_timeout(),
        };

        info!(
            backend = %db_type,
            pool_size = settings.max_size,
            timeout_ms = settings.timeout.as_millis() as u64,
            "registering identity store"
        );

        // Pool construction blocks while the first connections are opened.
        let store = tokio::task::spawn_blocking(move || {
            Self::open_store(db_type, target.expose_secret(), settings)
        })
        .await
        .map_err(|e| DatabaseError::Connection(format!("connect task failed: {e}")))??;

        Ok(Self { store, db_type })
    }

    pub fn from_store(store: Arc<dyn IdentityStore>, db_type: DbType) -> Self {
        Self { store, db_type }
    }

    fn open_store(
        db_type: DbType,
        target: &str,
        settings: PoolSettings,
    ) -> Result<Arc<dyn IdentityStore>, DatabaseError> {
        match db_type {
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => Ok(Arc::new(SqliteIdentityStore::new(target, settings)?)),
            #[cfg(feature = "postgres")]
            DbType::Postgres => Ok(Arc::new(PostgresIdentityStore::new(target, settings)?)),
            #[cfg(feature = "mysql")]
            DbType::Mysql => Ok(Arc::new(MysqlIdentityStore::new(target, settings)?)),
            #[allow(unreachable_patterns)]
            other => {
                let _ = (target, settings);
                Err(ConfigError::InvalidConfig(format!(
                    "{other} support is not compiled into this build"
                ))
                .into())
            }
        }
    }

    pub fn store(&self) -> Arc<dyn IdentityStore> {
        self.store.clone()
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }
}
