use std::time::Duration;

use diesel::r2d2::{self, ConnectionManager, R2D2Connection};
use tracing::debug;

use super::DatabaseError;

pub type Pool<C> = r2d2::Pool<ConnectionManager<C>>;

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: u32,
    pub timeout: Duration,
}

/// Builds a pool and waits for `min_idle` connections, so an unreachable
/// server fails startup instead of the first request.
pub fn build_pool<C>(
    url: &str,
    settings: PoolSettings,
    customizer: Option<Box<dyn r2d2::CustomizeConnection<C, r2d2::Error>>>,
) -> Result<Pool<C>, DatabaseError>
where
    C: R2D2Connection + 'static,
{
    let mut builder = r2d2::Pool::builder()
        .max_size(settings.max_size)
        .min_idle(Some(settings.min_idle))
        .connection_timeout(settings.timeout)
        .test_on_check_out(true);

    if let Some(customizer) = customizer {
        builder = builder.connection_customizer(customizer);
    }

    builder
        .build(ConnectionManager::<C>::new(url))
        .map_err(DatabaseError::from)
}

/// Runs `operation` on a pooled connection on the blocking thread pool.
///
/// The whole call, checkout included, is bounded by `timeout`. The pooled
/// connection is dropped, and so returned to the pool, when the blocking
/// closure ends, even if the caller already gave up on it.
pub async fn with_connection<C, T, F>(
    pool: &Pool<C>,
    timeout: Duration,
    operation: F,
) -> Result<T, DatabaseError>
where
    C: R2D2Connection + 'static,
    T: Send + 'static,
    F: FnOnce(&mut C) -> Result<T, DatabaseError> + Send + 'static,
{
    let pool = pool.clone();
    let task = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        operation(&mut *conn)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            joined.map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
        }
        Err(_) => {
            debug!(?timeout, "database lookup abandoned");
            Err(DatabaseError::Timeout(timeout))
        }
    }
}
