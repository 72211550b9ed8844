//! Fixture provisioning for the `identities` table.
//!
//! Resolution only ever reads. Creating the table, loading rows and dropping
//! it again go through a short-lived connection of their own.

use diesel::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::{DatabaseConfig, DbType};
use crate::db::models::{IdentityRecord, NewIdentity};
use crate::db::schema::identities;

use super::DatabaseError;

#[cfg(feature = "sqlite")]
const SQLITE_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS identities (token TEXT PRIMARY KEY, userid TEXT NOT NULL)";

#[cfg(feature = "postgres")]
const POSTGRES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS identities (token TEXT PRIMARY KEY, userid TEXT NOT NULL)";

// A TEXT key cannot be indexed without a prefix length on MySQL.
#[cfg(feature = "mysql")]
const MYSQL_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS identities (\
    token CHAR(32) NOT NULL PRIMARY KEY, \
    userid TEXT NOT NULL\
    ) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin";

const DROP_SCHEMA: &str = "DROP TABLE IF EXISTS identities";

#[cfg(feature = "mysql")]
const MYSQL_TOKEN_WIDTH: usize = 32;

#[derive(Debug, Clone)]
enum Operation {
    CreateSchema,
    Seed(Vec<IdentityRecord>),
    DropSchema,
}

pub struct Provisioner {
    db_type: DbType,
    target: SecretString,
}

impl Provisioner {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        config.validate()?;
        let target = config.connection_url()?;
        Ok(Self {
            db_type: config.db_type(),
            target,
        })
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    /// Creates the `identities` table when it does not exist yet. On SQLite
    /// this also creates the database file.
    pub async fn create_schema(&self) -> Result<(), DatabaseError> {
        self.run(Operation::CreateSchema).await?;
        info!(backend = %self.db_type, "identities table ready");
        Ok(())
    }

    /// Inserts the records, skipping tokens that are already present.
    /// Returns how many rows were added.
    pub async fn seed(&self, records: Vec<IdentityRecord>) -> Result<usize, DatabaseError> {
        for record in &records {
            if record.userid.is_empty() {
                return Err(DatabaseError::Migration(
                    "refusing to seed a token with an empty userid".to_string(),
                ));
            }
            #[cfg(feature = "mysql")]
            if self.db_type == DbType::Mysql && record.token.len() > MYSQL_TOKEN_WIDTH {
                return Err(DatabaseError::Migration(format!(
                    "token is {} bytes, the MySQL column holds {MYSQL_TOKEN_WIDTH}",
                    record.token.len()
                )));
            }
        }

        let requested = records.len();
        let inserted = self.run(Operation::Seed(records)).await?;
        info!(
            backend = %self.db_type,
            requested,
            inserted,
            "seeded identities"
        );
        Ok(inserted)
    }

    pub async fn drop_schema(&self) -> Result<(), DatabaseError> {
        self.run(Operation::DropSchema).await?;
        info!(backend = %self.db_type, "identities table dropped");
        Ok(())
    }

    async fn run(&self, operation: Operation) -> Result<usize, DatabaseError> {
        let db_type = self.db_type;
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || apply_to(db_type, target.expose_secret(), operation))
            .await
            .map_err(|e| DatabaseError::Migration(format!("provisioning task failed: {e}")))?
    }
}

fn apply_to(db_type: DbType, target: &str, operation: Operation) -> Result<usize, DatabaseError> {
    match db_type {
        #[cfg(feature = "sqlite")]
        DbType::Sqlite => {
            let mut conn = diesel::sqlite::SqliteConnection::establish(target)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            apply(&mut conn, SQLITE_SCHEMA, operation, |conn, row| {
                diesel::insert_or_ignore_into(identities::table)
                    .values(row)
                    .execute(conn)
            })
        }
        #[cfg(feature = "postgres")]
        DbType::Postgres => {
            let mut conn = diesel::pg::PgConnection::establish(target)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            apply(&mut conn, POSTGRES_SCHEMA, operation, |conn, row| {
                diesel::insert_into(identities::table)
                    .values(row)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
        }
        #[cfg(feature = "mysql")]
        DbType::Mysql => {
            let mut conn = diesel::mysql::MysqlConnection::establish(target)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            apply(&mut conn, MYSQL_SCHEMA, operation, |conn, row| {
                diesel::insert_or_ignore_into(identities::table)
                    .values(row)
                    .execute(conn)
            })
        }
        #[allow(unreachable_patterns)]
        other => {
            let _ = (target, operation);
            Err(DatabaseError::Migration(format!(
                "{other} support is not compiled into this build"
            )))
        }
    }
}

fn apply<C, F>(
    conn: &mut C,
    schema: &str,
    operation: Operation,
    insert: F,
) -> Result<usize, DatabaseError>
where
    C: Connection,
    F: Fn(&mut C, NewIdentity<'_>) -> QueryResult<usize>,
{
    match operation {
        Operation::CreateSchema => {
            conn.batch_execute(schema)
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            Ok(0)
        }
        Operation::DropSchema => {
            conn.batch_execute(DROP_SCHEMA)
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            Ok(0)
        }
        Operation::Seed(records) => conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                records
                    .iter()
                    .map(|record| insert(conn, NewIdentity::from(record)))
                    .sum()
            })
            .map_err(|e| DatabaseError::Migration(e.to_string())),
    }
}
