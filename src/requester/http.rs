//! `reqwest`-backed requester

use super::{Request, RequestBody, Requester, Response};
use crate::auth::AGENT_HEADER;
use crate::{Credentials, Error, Result};
use reqwest::header::HeaderValue;
use reqwest::Method;

/// Default service domain; collections live at `<collection>.nimbus.io`
pub const DEFAULT_SERVICE_DOMAIN: &str = "nimbus.io";

/// Transport configuration
#[derive(Clone, Debug)]
pub struct RequesterConfig {
    /// Domain appended to collection names to form host names
    pub service_domain: String,
    /// Explicit port, if the service does not listen on the scheme default
    pub service_port: Option<u16>,
    /// Use https rather than http
    pub use_tls: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Value of the `agent` header
    pub agent: String,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        RequesterConfig {
            service_domain: DEFAULT_SERVICE_DOMAIN.to_string(),
            service_port: None,
            use_tls: true,
            timeout_secs: 60,
            agent: format!("rust-nimbusio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RequesterConfig {
    /// Create config from environment variables
    ///
    /// - `NIMBUS_IO_SERVICE_DOMAIN`: service domain
    /// - `NIMBUS_IO_SERVICE_PORT`: explicit port
    /// - `NIMBUS_IO_SERVICE_SSL`: `0` or `false` selects plain http
    pub fn from_env() -> Result<Self> {
        let mut config = RequesterConfig::default();

        if let Ok(domain) = std::env::var("NIMBUS_IO_SERVICE_DOMAIN") {
            config.service_domain = domain;
        }

        if let Ok(port) = std::env::var("NIMBUS_IO_SERVICE_PORT") {
            let port = port.parse::<u16>().map_err(|e| {
                Error::Config(format!("Invalid NIMBUS_IO_SERVICE_PORT {:?}: {}", port, e))
            })?;
            config.service_port = Some(port);
        }

        if let Ok(ssl) = std::env::var("NIMBUS_IO_SERVICE_SSL") {
            config.use_tls = !matches!(ssl.trim().to_ascii_lowercase().as_str(), "0" | "false");
        }

        Ok(config)
    }

    /// Full URL for a host and signed path
    pub fn url(&self, host_name: &str, path: &str) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        match self.service_port {
            Some(port) => format!("{}://{}:{}{}", scheme, host_name, port, path),
            None => format!("{}://{}{}", scheme, host_name, path),
        }
    }
}

/// Requester talking to the service over HTTP
pub struct HttpRequester {
    credentials: Credentials,
    config: RequesterConfig,
    client: reqwest::blocking::Client,
}

impl HttpRequester {
    pub fn new(credentials: Credentials, config: RequesterConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpRequester {
            credentials,
            config,
            client,
        })
    }

    /// Create a requester configured from the environment
    pub fn from_env(credentials: Credentials) -> Result<Self> {
        Self::new(credentials, RequesterConfig::from_env()?)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }
}

impl Requester for HttpRequester {
    fn collection_host_name(&self, collection_name: &str) -> String {
        format!("{}.{}", collection_name, self.config.service_domain)
    }

    fn create_request(
        &self,
        method: Method,
        host_name: &str,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<Request> {
        Request::signed_now(
            &self.credentials,
            &self.config.agent,
            method,
            host_name,
            path,
            body,
        )
    }

    fn execute(&self, request: Request) -> Result<Response> {
        let Request {
            method,
            host_name,
            path,
            mut headers,
            body,
            content_length,
        } = request;

        if !headers.contains_key(AGENT_HEADER) {
            let agent = HeaderValue::from_str(&self.config.agent)
                .map_err(|e| Error::Config(format!("invalid agent: {}", e)))?;
            headers.insert(AGENT_HEADER, agent);
        }

        let url = sendable_url(&self.config.url(&host_name, &path), &path)?;
        tracing::debug!(%method, host = %host_name, %path, "sending request");

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            let body = match content_length {
                Some(len) => reqwest::blocking::Body::sized(body, len),
                None => reqwest::blocking::Body::new(body),
            };
            builder = builder.body(body);
        }

        let response = builder.send()?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_length = response.content_length();
        tracing::debug!(status, ?content_length, "received response");

        Ok(Response::new(status, headers, content_length, response))
    }
}

/// Parse `url`, insisting that it still carries `signed_path` verbatim
///
/// URL parsing resolves `.` and `..` segments, so a key such as `..` would
/// otherwise reach a different resource than the one that was signed.
fn sendable_url(url: &str, signed_path: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Config(format!("invalid url {:?}: {}", url, e)))?;

    let sent_path = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };
    if sent_path != signed_path {
        return Err(Error::Config(format!(
            "key cannot be sent as a path segment: {:?} would be sent as {:?}",
            signed_path, sent_path
        )));
    }

    Ok(parsed)
}
