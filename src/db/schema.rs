// Shared by all three engines. MySQL stores the token as CHAR(32) with a
// binary collation; diesel reads it through the same Text mapping.

diesel::table! {
    identities (token) {
        token -> Text,
        userid -> Text,
    }
}
