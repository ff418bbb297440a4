//! Key operations: archive, retrieve, delete

use crate::conjoined::SuccessReply;
use crate::error::check_status;
use crate::path::data_path;
use crate::requester::{Requester, ResponseBody};
use crate::{Error, Result};
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::time::SystemTime;

/// Tags an archive call as one part of a conjoined archive
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConjoinedParams {
    /// Identifier returned by `start_conjoined`; empty means a plain archive
    pub conjoined_identifier: String,
    /// Caller-assigned part number; not validated here
    pub conjoined_part: u32,
}

impl ConjoinedParams {
    pub fn new(conjoined_identifier: impl Into<String>, conjoined_part: u32) -> Self {
        ConjoinedParams {
            conjoined_identifier: conjoined_identifier.into(),
            conjoined_part,
        }
    }
}

/// Optional arguments to [`retrieve`]
///
/// A zero `slice_offset` means "from the start" and a zero `slice_size`
/// means "to the end". The conditional fields are recognised but not
/// supported; setting either makes `retrieve` fail before any request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetrieveParams {
    pub version_identifier: Option<String>,
    pub slice_offset: u64,
    pub slice_size: u64,
    pub modified_since: Option<SystemTime>,
    pub unmodified_since: Option<SystemTime>,
}

impl RetrieveParams {
    /// Retrieve a specific version
    pub fn version(version_identifier: impl Into<String>) -> Self {
        RetrieveParams {
            version_identifier: Some(version_identifier.into()),
            ..Default::default()
        }
    }

    /// Retrieve `size` bytes starting at `offset`
    pub fn slice(offset: u64, size: u64) -> Self {
        RetrieveParams {
            slice_offset: offset,
            slice_size: size,
            ..Default::default()
        }
    }

    /// Value of the `range` header, if a slice was requested
    ///
    /// Fails if the last byte of the slice lies past `u64::MAX`.
    pub fn range_header(&self) -> Result<Option<String>> {
        if self.slice_offset == 0 && self.slice_size == 0 {
            return Ok(None);
        }

        if self.slice_size == 0 {
            return Ok(Some(format!("bytes={}-", self.slice_offset)));
        }

        let last = self
            .slice_offset
            .checked_add(self.slice_size - 1)
            .ok_or(Error::InvalidSlice {
                offset: self.slice_offset,
                size: self.slice_size,
            })?;
        Ok(Some(format!("bytes={}-{}", self.slice_offset, last)))
    }
}

#[derive(Deserialize)]
struct ArchiveReply {
    version_identifier: String,
}

/// Upload `body` to `key`, returning the new version identifier
///
/// `content_length` is sent as given; the service rejects a body that
/// does not match it.
pub fn archive<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    conjoined_params: Option<&ConjoinedParams>,
    content_length: u64,
    body: impl Read + Send + 'static,
) -> Result<String> {
    let method = Method::POST;
    let host_name = requester.collection_host_name(collection_name);

    let path = match conjoined_params {
        Some(params) if !params.conjoined_identifier.is_empty() => {
            let part = params.conjoined_part.to_string();
            data_path(
                key,
                &[
                    ("conjoined_identifier", params.conjoined_identifier.as_str()),
                    ("conjoined_part", part.as_str()),
                ],
            )
        }
        _ => data_path(key, &[]),
    };

    let mut request =
        requester.create_request(method.clone(), &host_name, &path, Some(Box::new(body)))?;
    request.set_content_length(content_length);

    let response = requester.execute(request)?;
    let response = check_status(response, 200, &method, &host_name, &path)?;

    let reply: ArchiveReply = response.json()?;
    if reply.version_identifier.is_empty() {
        return Err(Error::Protocol(
            "archive returned an empty version_identifier".into(),
        ));
    }

    tracing::debug!(key, content_length, version_identifier = %reply.version_identifier, "archived");
    Ok(reply.version_identifier)
}

/// Upload an in-memory buffer to `key`
pub fn archive_bytes<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    conjoined_params: Option<&ConjoinedParams>,
    data: impl Into<Bytes>,
) -> Result<String> {
    let data: Bytes = data.into();
    let content_length = data.len() as u64;
    archive(
        requester,
        collection_name,
        key,
        conjoined_params,
        content_length,
        Cursor::new(data),
    )
}

/// Fetch the content of `key` as a stream
///
/// The caller owns the returned body; dropping it releases the connection.
pub fn retrieve<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    params: &RetrieveParams,
) -> Result<ResponseBody> {
    if params.modified_since.is_some() {
        return Err(Error::NotImplemented("retrieve_params.modified_since"));
    }
    if params.unmodified_since.is_some() {
        return Err(Error::NotImplemented("retrieve_params.unmodified_since"));
    }

    let method = Method::GET;
    let host_name = requester.collection_host_name(collection_name);

    let path = match params.version_identifier.as_deref() {
        Some(version) if !version.is_empty() => {
            data_path(key, &[("version_identifier", version)])
        }
        _ => data_path(key, &[]),
    };

    let range = params.range_header()?;

    let mut request = requester.create_request(method.clone(), &host_name, &path, None)?;

    let mut expected_status = 200;
    if let Some(range) = range {
        request.add_header("range", &range)?;
        expected_status = 206;
    }

    let response = requester.execute(request)?;
    let response = check_status(response, expected_status, &method, &host_name, &path)?;

    if params.slice_size > 0 {
        if let Some(found) = response.content_length() {
            if found != params.slice_size {
                return Err(Error::ContentLengthMismatch {
                    expected: params.slice_size,
                    found,
                });
            }
        }
    }

    Ok(response.into_body())
}

/// Fetch the whole content of `key` into memory
pub fn retrieve_bytes<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    params: &RetrieveParams,
) -> Result<Bytes> {
    retrieve(requester, collection_name, key, params)?.bytes()
}

/// Delete a key, hiding all of its versions
pub fn delete_key<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
) -> Result<()> {
    delete_version(requester, collection_name, key, "")
}

/// Delete one version of a key; an empty identifier deletes the key
pub fn delete_version<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    version_identifier: &str,
) -> Result<()> {
    let method = Method::DELETE;
    let host_name = requester.collection_host_name(collection_name);

    let path = if version_identifier.is_empty() {
        data_path(key, &[])
    } else {
        data_path(key, &[("version", version_identifier)])
    };

    let request = requester.create_request(method.clone(), &host_name, &path, None)?;
    let response = requester.execute(request)?;
    let response = check_status(response, 200, &method, &host_name, &path)?;

    let reply: SuccessReply = response.json()?;
    if !reply.success {
        tracing::warn!(key, version_identifier, "delete returned false");
        return Err(Error::Protocol("unexpected 'false' for 'success'".into()));
    }

    Ok(())
}
