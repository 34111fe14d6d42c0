//! Query string decoding

use std::collections::HashMap;

/// Decode an `application/x-www-form-urlencoded` query string.
/// Later occurrences of a key win.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
