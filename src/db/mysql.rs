use std::time::Duration;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::mysql::MysqlConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, CustomizeConnection};

use crate::db::models::IdentityRecord;
use crate::db::pool::{Pool, PoolSettings, build_pool, with_connection};
use crate::db::schema::identities;

use super::{DatabaseError, stores::single_identity};

/// Read-only session whose statements the server abandons after the lookup
/// timeout, so a lookup the caller gave up on still frees its connection.
#[derive(Debug)]
struct ReadOnlySession {
    statement_timeout: Duration,
}

impl ReadOnlySession {
    fn millis(&self) -> u128 {
        self.statement_timeout.as_millis().max(1)
    }

    fn setup_sql(&self) -> String {
        format!(
            "SET SESSION max_execution_time = {}; SET SESSION TRANSACTION READ ONLY;",
            self.millis()
        )
    }

    /// MariaDB names the same limit `max_statement_time`, in seconds.
    fn mariadb_setup_sql(&self) -> String {
        format!(
            "SET SESSION max_statement_time = {:.3}; SET SESSION TRANSACTION READ ONLY;",
            self.millis() as f64 / 1000.0
        )
    }
}

impl CustomizeConnection<MysqlConnection, r2d2::Error> for ReadOnlySession {
    fn on_acquire(&self, conn: &mut MysqlConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&self.setup_sql())
            .or_else(|_| conn.batch_execute(&self.mariadb_setup_sql()))
            .map_err(r2d2::Error::QueryError)
    }
}

pub struct MysqlIdentityStore {
    pool: Pool<MysqlConnection>,
    timeout: Duration,
}

impl MysqlIdentityStore {
    pub fn new(url: &str, settings: PoolSettings) -> Result<Self, DatabaseError> {
        let customizer = Box::new(ReadOnlySession {
            statement_timeout: settings.timeout,
        });
        let pool = build_pool::<MysqlConnection>(url, settings, Some(customizer))?;
        Ok(Self::with_pool(pool, settings.timeout))
    }

    pub fn with_pool(pool: Pool<MysqlConnection>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl super::IdentityStore for MysqlIdentityStore {
    async fn lookup(&self, token: &str) -> Result<Option<String>, DatabaseError> {
        let presented = token.to_string();
        with_connection(&self.pool, self.timeout, move |conn| {
            // The column collation decides what `=` matches here;
            // single_identity narrows the candidates to exact matches.
            let candidates = identities::table
                .filter(identities::token.eq(&presented))
                .select(IdentityRecord::as_select())
                .load::<IdentityRecord>(conn)?;
            single_identity(&presented, candidates)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "mysql"
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use diesel::mysql::MysqlConnection;
    use diesel::r2d2::{self, ConnectionManager};

    use super::{MysqlIdentityStore, ReadOnlySession};
    use crate::db::pool::PoolSettings;
    use crate::db::stores::single_identity;
    use crate::db::{DatabaseError, IdentityRecord, IdentityStore};

    const UNREACHABLE: &str = "mysql://identity@127.0.0.1:1/identity";

    #[test]
    fn sessions_carry_the_lookup_timeout() {
        let session = ReadOnlySession {
            statement_timeout: Duration::from_millis(2000),
        };
        assert!(session.setup_sql().contains("max_execution_time = 2000;"));
        assert!(session.setup_sql().contains("TRANSACTION READ ONLY"));
        assert!(
            session
                .mariadb_setup_sql()
                .contains("max_statement_time = 2.000;")
        );
    }

    #[test]
    fn collation_matches_never_resolve() {
        // What a case-insensitive, pad-space collation hands back for "tok".
        let candidates = vec![
            IdentityRecord::new("TOK", "mallory"),
            IdentityRecord::new("tok  ", "eve"),
        ];
        assert_eq!(single_identity("tok", candidates).expect("lookup"), None);

        let candidates = vec![
            IdentityRecord::new("TOK", "mallory"),
            IdentityRecord::new("tok", "alice"),
        ];
        assert_eq!(
            single_identity("tok", candidates).expect("lookup"),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn unreachable_server_fails_startup() {
        let settings = PoolSettings {
            max_size: 2,
            min_idle: 1,
            timeout: Duration::from_millis(300),
        };
        let result = MysqlIdentityStore::new(UNREACHABLE, settings);
        assert!(matches!(result, Err(DatabaseError::Connection(_))));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transient_lookup_error() {
        let timeout = Duration::from_millis(300);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .connection_timeout(timeout)
            .build_unchecked(ConnectionManager::<MysqlConnection>::new(UNREACHABLE));
        let store = MysqlIdentityStore::with_pool(pool, timeout);

        let started = Instant::now();
        let err = store
            .lookup("any-token")
            .await
            .expect_err("no server is listening");

        assert!(err.is_transient());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
