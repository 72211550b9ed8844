use std::time::Duration;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("identity table inconsistency: {0}")]
    SchemaViolation(String),

    #[error("database provisioning failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DatabaseError {
    /// Faults that may clear on their own and are worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Connection(_) | DatabaseError::Timeout(_))
    }
}

impl From<DieselError> for DatabaseError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                DatabaseError::Connection(info.message().to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for DatabaseError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        DatabaseError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    use super::DatabaseError;
    use crate::config::ConfigError;

    #[test]
    fn connection_and_timeout_are_transient() {
        assert!(DatabaseError::Connection("reset".to_string()).is_transient());
        assert!(DatabaseError::Timeout(Duration::from_millis(5)).is_transient());
    }

    #[test]
    fn query_and_schema_faults_are_not_transient() {
        assert!(!DatabaseError::Query("syntax error".to_string()).is_transient());
        assert!(!DatabaseError::SchemaViolation("2 rows".to_string()).is_transient());
        assert!(!DatabaseError::Migration("no table".to_string()).is_transient());
        assert!(
            !DatabaseError::Config(ConfigError::InvalidConfig("no host".to_string())).is_transient()
        );
    }

    #[test]
    fn closed_connection_maps_to_connection_error() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("server closed the connection unexpectedly".to_string()),
        );
        assert!(matches!(
            DatabaseError::from(err),
            DatabaseError::Connection(message) if message.contains("closed")
        ));
    }

    #[test]
    fn other_diesel_errors_map_to_query_error() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Query(_)));
        assert!(matches!(
            DatabaseError::from(DieselError::NotFound),
            DatabaseError::Query(_)
        ));
    }
}
