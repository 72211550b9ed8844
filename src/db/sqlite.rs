use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, CustomizeConnection};
use diesel::sqlite::SqliteConnection;

use crate::db::models::IdentityRecord;
use crate::db::pool::{Pool, PoolSettings, build_pool, with_connection};
use crate::db::schema::identities;

use super::{DatabaseError, stores::single_identity};

/// Opens every pooled connection read-only and lets readers wait out an
/// external writer instead of failing with `SQLITE_BUSY`.
#[derive(Debug)]
struct ReadOnlyReader {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ReadOnlyReader {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA query_only = ON;",
            self.busy_timeout.as_millis()
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

pub struct SqliteIdentityStore {
    pool: Pool<SqliteConnection>,
    timeout: Duration,
}

impl SqliteIdentityStore {
    pub fn new(path: &str, settings: PoolSettings) -> Result<Self, DatabaseError> {
        // Opening a missing file would silently create an empty database.
        if path != ":memory:" && !Path::new(path).exists() {
            return Err(DatabaseError::Connection(format!(
                "sqlite database file '{path}' does not exist"
            )));
        }

        let customizer = Box::new(ReadOnlyReader {
            busy_timeout: settings.timeout,
        });
        let pool = build_pool::<SqliteConnection>(path, settings, Some(customizer))?;

        Ok(Self {
            pool,
            timeout: settings.timeout,
        })
    }
}

#[async_trait]
impl super::IdentityStore for SqliteIdentityStore {
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
        "sqlite"
    }
}
