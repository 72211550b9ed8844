use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::schema::identities;

/// Token of the single credential the fixture harness seeds into every backend.
pub const FIXTURE_TOKEN: &str = "g8mlRUwF1AKx7/ZRvReQ+dRhGpoDAzIC";
pub const FIXTURE_USERID: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = identities)]
pub struct IdentityRecord {
    pub token: String,
    pub userid: String,
}

impl IdentityRecord {
    pub fn new<T: Into<String>, U: Into<String>>(token: T, userid: U) -> Self {
        Self {
            token: token.into(),
            userid: userid.into(),
        }
    }

    pub fn fixture() -> Self {
        Self::new(FIXTURE_TOKEN, FIXTURE_USERID)
    }
}

impl std::str::FromStr for IdentityRecord {
    type Err = String;

    /// Parses the `TOKEN:USERID` form accepted on the command line.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(':') {
            Some((token, userid)) if !token.is_empty() && !userid.is_empty() => {
                Ok(Self::new(token, userid))
            }
            _ => Err(format!("expected TOKEN:USERID, got '{value}'")),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = identities)]
pub(crate) struct NewIdentity<'a> {
    pub token: &'a str,
    pub userid: &'a str,
}

impl<'a> From<&'a IdentityRecord> for NewIdentity<'a> {
    fn from(record: &'a IdentityRecord) -> Self {
        Self {
            token: &record.token,
            userid: &record.userid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FIXTURE_TOKEN, IdentityRecord};

    #[test]
    fn fixture_token_fits_fixed_width_column() {
        assert_eq!(FIXTURE_TOKEN.len(), 32);
        assert_eq!(IdentityRecord::fixture().userid, "admin");
    }

    #[test]
    fn parses_cli_seed_pairs() {
        let record: IdentityRecord = "abc/+=:alice".parse().expect("valid pair");
        assert_eq!(record, IdentityRecord::new("abc/+=", "alice"));

        assert!("no-separator".parse::<IdentityRecord>().is_err());
        assert!(":alice".parse::<IdentityRecord>().is_err());
        assert!("token:".parse::<IdentityRecord>().is_err());
    }
}
