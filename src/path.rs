//! Request path construction
//!
//! Keys are query-escaped into the path: unreserved bytes pass through, a
//! space becomes `+` and everything else is `%XX`. Query parameters are
//! form-encoded in the order given.

use std::fmt::Write;
use url::form_urlencoded;

/// Escape a key for use as a path segment
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                escaped.push(byte as char);
            }
            b' ' => escaped.push('+'),
            _ => {
                let _ = write!(escaped, "%{:02X}", byte);
            }
        }
    }
    escaped
}

/// `/<prefix>/<escaped key>[?query]`
pub fn key_path(prefix: &str, key: &str, query: &[(&str, &str)]) -> String {
    let mut path = format!("/{}/{}", prefix, escape_key(key));
    if !query.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query)
            .finish();
        path.push('?');
        path.push_str(&encoded);
    }
    path
}

/// Path of a stored key
pub fn data_path(key: &str, query: &[(&str, &str)]) -> String {
    key_path("data", key, query)
}

/// Path of a conjoined action on a key
pub fn conjoined_path(key: &str, query: &[(&str, &str)]) -> String {
    key_path("conjoined", key, query)
}
