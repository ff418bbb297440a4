//! Transport abstraction
//!
//! Every operation in this crate is a free function that takes a [`Requester`]:
//! the requester knows how to map a collection to a host, how to build a signed
//! request, and how to run it. [`HttpRequester`] is the real implementation on
//! top of `reqwest`; tests substitute their own.

mod http;

pub use http::{HttpRequester, RequesterConfig, DEFAULT_SERVICE_DOMAIN};

use crate::auth::{auth_headers, current_timestamp};
use crate::{Credentials, Error, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::{Cursor, Read};

/// Largest buffer reserved up front when reading a body into memory
const PREALLOCATE_LIMIT: u64 = 64 * 1024;

/// Outgoing request body
pub type RequestBody = Box<dyn Read + Send + 'static>;

/// Capability to reach the storage service
pub trait Requester: Send + Sync {
    /// Host name serving a collection
    fn collection_host_name(&self, collection_name: &str) -> String;

    /// Assemble a signed request. Performs no I/O.
    fn create_request(
        &self,
        method: Method,
        host_name: &str,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<Request>;

    /// Perform exactly one round trip
    fn execute(&self, request: Request) -> Result<Response>;
}

/// A request ready to be sent
pub struct Request {
    pub method: Method,
    pub host_name: String,
    /// Path and query, exactly as signed
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Explicit body length; never inferred from the body
    pub content_length: Option<u64>,
}

impl Request {
    /// Build a request carrying the authentication headers for `timestamp`
    pub fn signed(
        credentials: &Credentials,
        agent: &str,
        method: Method,
        host_name: &str,
        path: &str,
        body: Option<RequestBody>,
        timestamp: u64,
    ) -> Result<Self> {
        let headers = auth_headers(credentials, method.as_str(), timestamp, path, agent)?;
        Ok(Request {
            method,
            host_name: host_name.to_string(),
            path: path.to_string(),
            headers,
            body,
            content_length: None,
        })
    }

    /// Same as [`Request::signed`], stamped with the current time
    pub fn signed_now(
        credentials: &Credentials,
        agent: &str,
        method: Method,
        host_name: &str,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<Self> {
        Self::signed(
            credentials,
            agent,
            method,
            host_name,
            path,
            body,
            current_timestamp(),
        )
    }

    pub fn set_content_length(&mut self, content_length: u64) {
        self.content_length = Some(content_length);
    }

    /// Add a header; header names are lower-case
    pub fn add_header(&mut self, name: &'static str, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("invalid {} header {:?}: {}", name, value, e)))?;
        self.headers.append(HeaderName::from_static(name), value);
        Ok(())
    }

    /// Header value as a string, if present and printable
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("host_name", &self.host_name)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Body of a response, streamed from the connection
///
/// Dropping it releases the underlying connection.
pub struct ResponseBody {
    reader: Box<dyn Read + Send>,
    content_length: Option<u64>,
}

impl ResponseBody {
    pub fn new(reader: impl Read + Send + 'static, content_length: Option<u64>) -> Self {
        ResponseBody {
            reader: Box::new(reader),
            content_length,
        }
    }

    /// Length declared by the response, if any
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Read the remaining body into memory
    pub fn bytes(mut self) -> Result<Bytes> {
        // The declared length is the server's claim; only trust it up to a point.
        let capacity = self.content_length.unwrap_or(0).min(PREALLOCATE_LIMIT) as usize;
        let mut buf = Vec::with_capacity(capacity);
        self.reader.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A received response
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(
        status: u16,
        headers: HeaderMap,
        content_length: Option<u64>,
        body: impl Read + Send + 'static,
    ) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(|reason| format!("{} {}", status, reason))
            .unwrap_or_else(|| status.to_string());

        Response {
            status,
            status_text,
            headers,
            body: ResponseBody::new(body, content_length),
        }
    }

    /// A response with an in-memory body whose length is declared
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let len = body.len() as u64;
        Self::new(status, HeaderMap::new(), Some(len), Cursor::new(body))
    }

    pub fn content_length(&self) -> Option<u64> {
        self.body.content_length()
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    pub fn bytes(self) -> Result<Bytes> {
        self.body.bytes()
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
