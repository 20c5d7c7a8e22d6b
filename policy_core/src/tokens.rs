//! Query template token substitution.
//!
//! Query strings arrive as templates carrying a fixed set of placeholder
//! tokens which are rewritten with concrete runtime values before execution.
//! The token names are part of the template contract with deployed rule
//! bases and must not change.

pub const CURRENT_TIME: &str = "IRODS_TOKEN_CURRENT_TIME";
pub const LIFETIME: &str = "IRODS_TOKEN_LIFETIME";
pub const COLLECTION_NAME: &str = "IRODS_TOKEN_COLLECTION_NAME";
pub const DATA_NAME: &str = "IRODS_TOKEN_DATA_NAME";
pub const SOURCE_RESOURCE_NAME: &str = "IRODS_TOKEN_SOURCE_RESOURCE_NAME";
pub const DESTINATION_RESOURCE_NAME: &str = "IRODS_TOKEN_DESTINATION_RESOURCE_NAME";

/// Replace every occurrence of `token` in `query` with `value`.
///
/// The loop re-scans after each replacement and stops once the token no
/// longer occurs. A value that itself embeds the token would re-introduce it
/// forever, so that case stops after the first pass.
pub fn replace_token(query: &mut String, token: &str, value: &str) {
    if token.is_empty() {
        return;
    }

    while let Some(pos) = query.find(token) {
        query.replace_range(pos..pos + token.len(), value);
        if value.contains(token) {
            break;
        }
    }
}

/// Replace a token with a numeric value rendered in decimal.
pub fn replace_numeric_token(query: &mut String, token: &str, value: i64) {
    replace_token(query, token, &value.to_string());
}
