//! nimbus.io credentials and the credentials file
//!
//! The file holds one `Name value` pair per line:
//!
//! ```text
//! Username alice
//! AuthKeyId 42
//! AuthKey 0123456789abcdef
//! ```
//!
//! By default it lives at `~/.nimbus.io`; `NIMBUS_IO_CREDENTIALS` overrides that.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative credentials file
pub const CREDENTIALS_ENV: &str = "NIMBUS_IO_CREDENTIALS";

/// File name of the default credentials file in the home directory
pub const DEFAULT_CREDENTIALS_FILE: &str = ".nimbus.io";

/// Identity used to sign every request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Identity (user) name
    pub name: String,
    /// Public identifier of the access key
    pub auth_key_id: u64,
    /// Secret key used for HMAC signing
    pub auth_key: Vec<u8>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("auth_key_id", &self.auth_key_id)
            .field("auth_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(name: impl Into<String>, auth_key_id: u64, auth_key: impl Into<Vec<u8>>) -> Self {
        Credentials {
            name: name.into(),
            auth_key_id,
            auth_key: auth_key.into(),
        }
    }

    /// Parse the contents of a credentials file
    pub fn parse(content: &str) -> Result<Self> {
        let mut name = None;
        let mut auth_key_id = None;
        let mut auth_key = None;

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (field, value) = line
                .split_once(char::is_whitespace)
                .map(|(f, v)| (f, v.trim()))
                .ok_or_else(|| {
                    Error::Config(format!("line {}: expected 'Name value'", number + 1))
                })?;

            match field {
                "Username" => name = Some(value.to_string()),
                "AuthKeyId" => {
                    let id = value.parse::<u64>().map_err(|e| {
                        Error::Config(format!("line {}: invalid AuthKeyId: {}", number + 1, e))
                    })?;
                    auth_key_id = Some(id);
                }
                "AuthKey" => auth_key = Some(value.as_bytes().to_vec()),
                other => {
                    tracing::debug!(field = other, "ignoring unknown credentials field");
                }
            }
        }

        Ok(Credentials {
            name: name.ok_or_else(|| Error::Config("missing Username".into()))?,
            auth_key_id: auth_key_id.ok_or_else(|| Error::Config("missing AuthKeyId".into()))?,
            auth_key: auth_key.ok_or_else(|| Error::Config("missing AuthKey".into()))?,
        })
    }

    /// Load credentials from an explicit file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read credentials {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Load credentials from `$NIMBUS_IO_CREDENTIALS` or `~/.nimbus.io`
    pub fn load_default() -> Result<Self> {
        Self::load_from_path(default_path()?)
    }
}

/// Resolve the default credentials path
pub fn default_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CREDENTIALS_ENV) {
        return Ok(PathBuf::from(path));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Could not find home directory".into()))?;
    Ok(home.join(DEFAULT_CREDENTIALS_FILE))
}
