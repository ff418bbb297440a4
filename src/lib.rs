//! # nimbusio
//!
//! A blocking client for the nimbus.io object storage service.
//!
//! Every operation is a free function taking a [`Requester`], the capability
//! that resolves collection hosts, signs requests and performs the round
//! trip. [`HttpRequester`] is the production implementation.
//!
//! ## Core Concepts
//!
//! - **Collections**: named namespaces, each served at its own host
//! - **Keys**: objects within a collection, with one version per archive
//! - **Conjoined archives**: one key assembled from several uploads,
//!   sealed by finish or discarded by abort
//!
//! ## Example
//!
//! ```no_run
//! use nimbusio::{archive_bytes, retrieve_bytes, Credentials, HttpRequester, RetrieveParams};
//!
//! let credentials = Credentials::load_default()?;
//! let requester = HttpRequester::from_env(credentials)?;
//!
//! let version = archive_bytes(&requester, "dd-alice-photos", "test key", None, "test body")?;
//! let body = retrieve_bytes(&requester, "dd-alice-photos", "test key", &RetrieveParams::version(version))?;
//! assert_eq!(&body[..], b"test body");
//! # Ok::<(), nimbusio::Error>(())
//! ```

pub mod auth;
pub mod conjoined;
pub mod credentials;
pub mod key;
pub mod path;
pub mod requester;

mod error;

pub use auth::compute_auth_string;
pub use conjoined::{abort_conjoined, finish_conjoined, start_conjoined, ConjoinedArchive};
pub use credentials::Credentials;
pub use error::{Error, HttpError, Result};
pub use key::{
    archive, archive_bytes, delete_key, delete_version, retrieve, retrieve_bytes,
    ConjoinedParams, RetrieveParams,
};
pub use requester::{
    HttpRequester, Request, RequestBody, Requester, RequesterConfig, Response, ResponseBody,
};
