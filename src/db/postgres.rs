use std::time::Duration;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, CustomizeConnection};

use crate::db::models::IdentityRecord;
use crate::db::pool::{Pool, PoolSettings, build_pool, with_connection};
use crate::db::schema::identities;

use super::{DatabaseError, stores::single_identity};

/// Caps every statement at the lookup timeout on the server side, so a lookup
/// abandoned by the caller still frees its pooled connection, and keeps the
/// session read-only.
#[derive(Debug)]
struct ReadOnlySession {
    statement_timeout: Duration,
}

impl ReadOnlySession {
    fn setup_sql(&self) -> String {
        format!(
            "SET statement_timeout = {}; SET default_transaction_read_only = on;",
            self.statement_timeout.as_millis().max(1)
        )
    }
}

impl CustomizeConnection<PgConnection, r2d2::Error> for ReadOnlySession {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&self.setup_sql())
            .map_err(r2d2::Error::QueryError)
    }
}

pub struct PostgresIdentityStore {
    pool: Pool<PgConnection>,
    timeout: Duration,
}

impl PostgresIdentityStore {
    pub fn new(url: &str, settings: PoolSettings) -> Result<Self, DatabaseError> {
        let customizer = Box::new(ReadOnlySession {
            statement_timeout: settings.timeout,
        });
        let pool = build_pool::<PgConnection>(url, settings, Some(customizer))?;
        Ok(Self::with_pool(pool, settings.timeout))
    }

    pub fn with_pool(pool: Pool<PgConnection>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl super::IdentityStore for PostgresIdentityStore {
    async fn lookup(&self, token: &str) -> Result<Option<String>, DatabaseError> {
        let presented = token.to_string();
        with_connection(&self.pool, self.timeout, move |conn| {
            let candidates = identities::table
                .filter(identities::token.eq(&presented))
                .select(IdentityRecord::as_select())
                .load::<IdentityRecord>(conn)?;
            single_identity(&presented, candidates)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use diesel::pg::PgConnection;
    use diesel::r2d2::{self, ConnectionManager};

    use super::{PostgresIdentityStore, ReadOnlySession};
    use crate::db::pool::PoolSettings;
    use crate::db::{DatabaseError, IdentityStore};

    #[test]
    fn sessions_carry_the_lookup_timeout() {
        let session = ReadOnlySession {
            statement_timeout: Duration::from_millis(2000),
        };
        let sql = session.setup_sql();
        assert!(sql.contains("SET statement_timeout = 2000;"));
        assert!(sql.contains("default_transaction_read_only = on"));

        let tiny = ReadOnlySession {
            statement_timeout: Duration::from_micros(10),
        };
        assert!(tiny.setup_sql().contains("statement_timeout = 1;"));
    }

    #[tokio::test]
    async fn unreachable_server_fails_startup() {
        let settings = PoolSettings {
            max_size: 2,
            min_idle: 1,
            timeout: Duration::from_millis(300),
        };
        let result = PostgresIdentityStore::new(
            "postgres://identity@127.0.0.1:1/identity?connect_timeout=1",
            settings,
        );
        assert!(matches!(result, Err(DatabaseError::Connection(_))));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transient_lookup_error() {
        let timeout = Duration::from_millis(300);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .connection_timeout(timeout)
            .build_unchecked(ConnectionManager::<PgConnection>::new(
                "postgres://identity@127.0.0.1:1/identity?connect_timeout=1",
            ));
        let store = PostgresIdentityStore::with_pool(pool, timeout);

        let started = Instant::now();
        let err = store
            .lookup("any-token")
            .await
            .expect_err("no server is listening");

        assert!(err.is_transient());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
