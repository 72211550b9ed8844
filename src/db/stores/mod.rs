use async_trait::async_trait;

use super::DatabaseError;
use super::models::IdentityRecord;

/// Read-only token lookup over one SQL engine.
///
/// Implementations own their connection handling; callers only ever see the
/// outcome of a single lookup.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the user bound to `token`, `None` when no row matches.
    async fn lookup(&self, token: &str) -> Result<Option<String>, DatabaseError>;

    /// Engine name used in log lines.
    fn backend_name(&self) -> &'static str;
}

/// Reduces the candidate rows of a lookup to a single identity.
///
/// Candidates are compared byte for byte with the presented token so that
/// collation rules (case folding, trailing-space padding) cannot widen a match.
pub(crate) fn single_identity(
    presented: &str,
    candidates: Vec<IdentityRecord>,
) -> Result<Option<String>, DatabaseError> {
    let mut matching = candidates
        .into_iter()
        .filter(|record| record.token == presented);

    let Some(first) = matching.next() else {
        return Ok(None);
    };

    let extra = matching.count();
    if extra > 0 {
        return Err(DatabaseError::SchemaViolation(format!(
            "{} rows share one token",
            extra + 1
        )));
    }

    if first.userid.is_empty() {
        return Err(DatabaseError::SchemaViolation(
            "token is bound to an empty userid".to_string(),
        ));
    }

    Ok(Some(first.userid))
}


#[cfg(test)]
mod tests {
    use super::single_identity;
    use crate::db::{DatabaseError, IdentityRecord};

    #[test]
    fn no_candidates_is_not_found() {
        assert_eq!(single_identity("", Vec::new()).expect("lookup"), None);
    }

    #[test]
    fn single_exact_match_resolves() {
        let rows = vec![IdentityRecord::new("tok-1", "alice")];
        assert_eq!(
            single_identity("tok-1", rows).expect("lookup"),
            Some("alice".to_string())
        );
    }

    #[test]
    fn collation_matches_are_discarded() {
        let rows = vec![
            IdentityRecord::new("TOK-1", "mallory"),
            IdentityRecord::new("tok-1 ", "eve"),
        ];
        assert_eq!(single_identity("tok-1", rows).expect("lookup"), None);
    }

    #[test]
    fn duplicate_rows_are_a_schema_violation() {
        let rows = vec![
            IdentityRecord::new("tok-1", "alice"),
            IdentityRecord::new("tok-1", "bob"),
        ];
        assert!(matches!(
            single_identity("tok-1", rows),
            Err(DatabaseError::SchemaViolation(_))
        ));
    }

    #[test]
    fn empty_userid_is_a_schema_violation() {
        let rows = vec![IdentityRecord::new("tok-1", "")];
        assert!(matches!(
            single_identity("tok-1", rows),
            Err(DatabaseError::SchemaViolation(_))
        ));
    }
}
