//! Error types for nimbusio

use crate::requester::Response;
use reqwest::Method;
use std::io::Read;
use thiserror::Error;

/// Result type alias for nimbusio operations
pub type Result<T> = std::result::Result<T, Error>;

/// A response was received, but its status was not the one the operation expects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("HTTP error {status}: {message}")]
pub struct HttpError {
    /// Status code returned by the service
    pub status: u16,
    /// Method, host, path and (a prefix of) the response body
    pub message: String,
}

/// Errors that can occur in nimbusio operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("content length mismatch: expected {expected} found {found}")]
    ContentLengthMismatch { expected: u64, found: u64 },

    #[error("slice of {size} bytes at offset {offset} extends past the largest byte offset")]
    InvalidSlice { offset: u64, size: u64 },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// The HTTP status carried by an [`HttpError`], if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => Some(e.status),
            _ => None,
        }
    }

    /// True if the service answered 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Longest body prefix quoted in an [`HttpError`] message
const BODY_SNIPPET_LIMIT: u64 = 4096;

/// Pass the response through if its status is `expected`; otherwise turn it
/// into an [`HttpError`] quoting the request and the start of the body.
pub(crate) fn check_status(
    response: Response,
    expected: u16,
    method: &Method,
    host_name: &str,
    path: &str,
) -> Result<Response> {
    if response.status == expected {
        return Ok(response);
    }

    let status = response.status;
    let mut snippet = Vec::new();
    // The body is diagnostic only; a failed read leaves the snippet short.
    let _ = response
        .into_body()
        .take(BODY_SNIPPET_LIMIT)
        .read_to_end(&mut snippet);

    tracing::warn!(%method, host = host_name, path, status, expected, "unexpected status");

    Err(HttpError {
        status,
        message: format!(
            "{} {} {} failed {}",
            method,
            host_name,
            path,
            String::from_utf8_lossy(&snippet)
        ),
    }
    .into())
}
