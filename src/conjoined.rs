//! Conjoined archives
//!
//! A conjoined archive is one key assembled from several sequential uploads.
//! [`start_conjoined`] opens a session and returns its identifier; each part
//! is then archived with [`ConjoinedParams`]; [`finish_conjoined`] seals the
//! key or [`abort_conjoined`] discards it. The service owns the session
//! state; the client only carries the identifier around.

use crate::error::check_status;
use crate::key::{archive, archive_bytes, ConjoinedParams};
use crate::path::conjoined_path;
use crate::requester::Requester;
use crate::{Error, Result};
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use std::io::Read;

#[derive(Deserialize)]
struct StartReply {
    conjoined_identifier: String,
}

#[derive(Deserialize)]
pub(crate) struct SuccessReply {
    pub(crate) success: bool,
}

/// Start a conjoined archive, returning the identifier that tags its parts
pub fn start_conjoined<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
) -> Result<String> {
    let method = Method::POST;
    let host_name = requester.collection_host_name(collection_name);
    let path = conjoined_path(key, &[("action", "start")]);

    let request = requester.create_request(method.clone(), &host_name, &path, None)?;
    let response = requester.execute(request)?;
    let response = check_status(response, 200, &method, &host_name, &path)?;

    let reply: StartReply = response.json()?;
    if reply.conjoined_identifier.is_empty() {
        return Err(Error::Protocol(
            "conjoined action=start returned an empty conjoined_identifier".into(),
        ));
    }

    tracing::debug!(key, conjoined_identifier = %reply.conjoined_identifier, "started conjoined archive");
    Ok(reply.conjoined_identifier)
}

/// Abort a conjoined archive, discarding its parts
pub fn abort_conjoined<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    conjoined_identifier: &str,
) -> Result<()> {
    conjoined_action(requester, collection_name, key, "abort", conjoined_identifier)
}

/// Finish a conjoined archive, making the key retrievable as a whole
pub fn finish_conjoined<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    conjoined_identifier: &str,
) -> Result<()> {
    conjoined_action(requester, collection_name, key, "finish", conjoined_identifier)
}

fn conjoined_action<R: Requester + ?Sized>(
    requester: &R,
    collection_name: &str,
    key: &str,
    action: &str,
    conjoined_identifier: &str,
) -> Result<()> {
    let method = Method::POST;
    let host_name = requester.collection_host_name(collection_name);
    let path = conjoined_path(
        key,
        &[
            ("action", action),
            ("conjoined_identifier", conjoined_identifier),
        ],
    );

    let request = requester.create_request(method.clone(), &host_name, &path, None)?;
    let response = requester.execute(request)?;
    let response = check_status(response, 200, &method, &host_name, &path)?;

    let reply: SuccessReply = response.json()?;
    if !reply.success {
        tracing::warn!(key, action, conjoined_identifier, "conjoined action returned false");
        return Err(Error::Protocol(format!(
            "conjoined action={} returned false",
            action
        )));
    }

    Ok(())
}

/// A started conjoined archive
///
/// Holds the identifier and numbers parts from 1. `finish` and `abort`
/// consume the session, so a session cannot be closed twice through it.
pub struct ConjoinedArchive<'a, R: Requester + ?Sized> {
    requester: &'a R,
    collection_name: String,
    key: String,
    conjoined_identifier: String,
    next_part: u32,
}

impl<'a, R: Requester + ?Sized> ConjoinedArchive<'a, R> {
    /// Start a new session on the service
    pub fn start(requester: &'a R, collection_name: &str, key: &str) -> Result<Self> {
        let conjoined_identifier = start_conjoined(requester, collection_name, key)?;
        Ok(ConjoinedArchive {
            requester,
            collection_name: collection_name.to_string(),
            key: key.to_string(),
            conjoined_identifier,
            next_part: 1,
        })
    }

    pub fn conjoined_identifier(&self) -> &str {
        &self.conjoined_identifier
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Part number the next call to `archive_part` will use
    pub fn next_part(&self) -> u32 {
        self.next_part
    }

    /// Archive the next part, returning its version identifier
    pub fn archive_part(
        &mut self,
        content_length: u64,
        body: impl Read + Send + 'static,
    ) -> Result<String> {
        let params = self.next_params();
        let version_identifier = archive(
            self.requester,
            &self.collection_name,
            &self.key,
            Some(&params),
            content_length,
            body,
        )?;
        self.next_part += 1;
        Ok(version_identifier)
    }

    /// Archive the next part from memory
    pub fn archive_part_bytes(&mut self, data: impl Into<Bytes>) -> Result<String> {
        let params = self.next_params();
        let version_identifier = archive_bytes(
            self.requester,
            &self.collection_name,
            &self.key,
            Some(&params),
            data,
        )?;
        self.next_part += 1;
        Ok(version_identifier)
    }

    fn next_params(&self) -> ConjoinedParams {
        ConjoinedParams::new(self.conjoined_identifier.clone(), self.next_part)
    }

    /// Seal the archive
    pub fn finish(self) -> Result<()> {
        finish_conjoined(
            self.requester,
            &self.collection_name,
            &self.key,
            &self.conjoined_identifier,
        )
    }

    /// Discard the archive
    pub fn abort(self) -> Result<()> {
        abort_conjoined(
            self.requester,
            &self.collection_name,
            &self.key,
            &self.conjoined_identifier,
        )
    }
}
