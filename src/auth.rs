//! Request signing
//!
//! Every request carries an `Authorization` header of the form
//! `NIMBUS.IO <auth_key_id>:<hex hmac-sha256>` computed over
//! `name \n method \n timestamp \n path`, plus the timestamp itself in
//! `x-nimbus-io-timestamp`.

use crate::{Credentials, Error, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signing timestamp
pub const TIMESTAMP_HEADER: &str = "x-nimbus-io-timestamp";

/// Header identifying the client software
pub const AGENT_HEADER: &str = "agent";

/// Compute the `Authorization` header value for one request
///
/// `path` is the request path including its query string, without the host.
pub fn compute_auth_string(
    credentials: &Credentials,
    method: &str,
    timestamp: u64,
    path: &str,
) -> String {
    let message = format!("{}\n{}\n{}\n{}", credentials.name, method, timestamp, path);

    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(&credentials.auth_key)
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let digest = mac.finalize().into_bytes();

    format!("NIMBUS.IO {}:{}", credentials.auth_key_id, hex::encode(digest))
}

/// Build the full set of authentication headers for a request
pub fn auth_headers(
    credentials: &Credentials,
    method: &str,
    timestamp: u64,
    path: &str,
    agent: &str,
) -> Result<HeaderMap> {
    let auth_string = compute_auth_string(credentials, method, timestamp, path);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, header_value(&auth_string)?);
    headers.insert(TIMESTAMP_HEADER, HeaderValue::from(timestamp));
    headers.insert(AGENT_HEADER, header_value(agent)?);
    Ok(headers)
}

/// Current time in whole seconds since the epoch
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("invalid header value {:?}: {}", value, e)))
}
