//! In-memory stand-in for the storage service
//!
//! `FakeService` implements `Requester` without a network: it checks each
//! request's signature, then answers archive / retrieve / delete / conjoined
//! calls from a map held behind a mutex. Canned responses can be queued to
//! exercise error paths.

#![allow(dead_code)]

use nimbusio::auth::{compute_auth_string, TIMESTAMP_HEADER};
use nimbusio::{Credentials, Request, RequestBody, Requester, Response, Result};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{Cursor, Read};
use url::form_urlencoded;

pub const COLLECTION: &str = "dd-tester-test-00000";
pub const AGENT: &str = "nimbusio-tests/1.0";

/// What the service saw for one request
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub host_name: String,
    pub path: String,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A queued response returned instead of routing the request
pub struct Canned {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_length: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Started,
    Aborted,
    Finished,
}

struct Session {
    key: String,
    state: SessionState,
    parts: BTreeMap<u32, Vec<u8>>,
}

struct Version {
    id: String,
    data: Vec<u8>,
    deleted: bool,
}

#[derive(Default)]
struct State {
    keys: HashMap<String, Vec<Version>>,
    sessions: HashMap<String, Session>,
    next_id: u64,
    clock: u64,
    requests: Vec<RecordedRequest>,
    canned: VecDeque<Canned>,
}

impl State {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08}", prefix, self.next_id)
    }
}

pub struct FakeService {
    credentials: Credentials,
    state: Mutex<State>,
}

impl FakeService {
    pub fn new() -> Self {
        FakeService {
            credentials: Credentials::new("tester", 17, "fake-secret"),
            state: Mutex::new(State {
                clock: 1_700_000_000,
                ..Default::default()
            }),
        }
    }

    /// Queue a response for the next executed request
    pub fn push_response(&self, status: u16, body: &str) {
        self.push_canned(Canned {
            status,
            body: body.as_bytes().to_vec(),
            content_length: Some(body.len() as u64),
        });
    }

    pub fn push_canned(&self, canned: Canned) {
        self.state.lock().canned.push_back(canned);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.lock().requests.last().cloned()
    }

    fn route(&self, state: &mut State, request: &RecordedRequest, body: Vec<u8>) -> Response {
        let (path, query) = match request.path.split_once('?') {
            Some((path, query)) => (path, query),
            None => (request.path.as_str(), ""),
        };
        let query: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        let (prefix, escaped_key) = match path.trim_start_matches('/').split_once('/') {
            Some(parts) => parts,
            None => return json(400, r#"{"error": "bad path"}"#),
        };
        let key = unescape(escaped_key);

        match (&request.method, prefix) {
            (&Method::POST, "conjoined") => conjoined(state, &key, &query),
            (&Method::POST, "data") => archive(state, &key, &query, request, body),
            (&Method::GET, "data") => retrieve(state, &key, &query, request),
            (&Method::DELETE, "data") => delete(state, &key, &query),
            _ => json(405, r#"{"error": "method not allowed"}"#),
        }
    }
}

impl Requester for FakeService {
    fn collection_host_name(&self, collection_name: &str) -> String {
        format!("{}.test.local", collection_name)
    }

    fn create_request(
        &self,
        method: Method,
        host_name: &str,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<Request> {
        let timestamp = {
            let mut state = self.state.lock();
            state.clock += 1;
            state.clock
        };
        Request::signed(&self.credentials, AGENT, method, host_name, path, body, timestamp)
    }

    fn execute(&self, request: Request) -> Result<Response> {
        let recorded = RecordedRequest {
            method: request.method.clone(),
            host_name: request.host_name.clone(),
            path: request.path.clone(),
            headers: request.headers.clone(),
            content_length: request.content_length,
        };

        let mut body = Vec::new();
        if let Some(mut reader) = request.body {
            reader.read_to_end(&mut body)?;
        }

        let mut state = self.state.lock();
        state.requests.push(recorded.clone());

        if let Some(canned) = state.canned.pop_front() {
            return Ok(Response::new(
                canned.status,
                HeaderMap::new(),
                canned.content_length,
                Cursor::new(canned.body),
            ));
        }

        if !self.signature_valid(&recorded) {
            return Ok(json(401, r#"{"error": "invalid signature"}"#));
        }

        Ok(self.route(&mut state, &recorded, body))
    }
}

impl FakeService {
    fn signature_valid(&self, request: &RecordedRequest) -> bool {
        let Some(timestamp) = request
            .header(TIMESTAMP_HEADER)
            .and_then(|t| t.parse::<u64>().ok())
        else {
            return false;
        };
        let expected = compute_auth_string(
            &self.credentials,
            request.method.as_str(),
            timestamp,
            &request.path,
        );
        request.header("authorization") == Some(expected.as_str()) && request.header("agent").is_some()
    }
}

fn json(status: u16, body: &str) -> Response {
    Response::from_bytes(status, body.to_string())
}

fn unescape(segment: &str) -> String {
    let wrapped = format!("k={}", segment);
    form_urlencoded::parse(wrapped.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn conjoined(state: &mut State, key: &str, query: &HashMap<String, String>) -> Response {
    let action = query.get("action").map(String::as_str).unwrap_or("");
    if action == "start" {
        let id = state.fresh_id("conjoined");
        state.sessions.insert(
            id.clone(),
            Session {
                key: key.to_string(),
                state: SessionState::Started,
                parts: BTreeMap::new(),
            },
        );
        return json(200, &format!(r#"{{"conjoined_identifier": "{}"}}"#, id));
    }

    let Some(id) = query.get("conjoined_identifier") else {
        return json(400, r#"{"error": "missing conjoined_identifier"}"#);
    };
    let Some(session) = state.sessions.get_mut(id) else {
        return json(404, r#"{"error": "unknown conjoined archive"}"#);
    };
    if session.key != key || session.state != SessionState::Started {
        return json(409, r#"{"error": "conjoined archive is not open"}"#);
    }

    match action {
        "abort" => {
            session.state = SessionState::Aborted;
            json(200, r#"{"success": true}"#)
        }
        "finish" => {
            session.state = SessionState::Finished;
            let data: Vec<u8> = session.parts.values().flatten().copied().collect();
            let version = state.fresh_id("version");
            state
                .keys
                .entry(key.to_string())
                .or_default()
                .push(Version {
                    id: version,
                    data,
                    deleted: false,
                });
            json(200, r#"{"success": true}"#)
        }
        _ => json(400, r#"{"error": "unknown action"}"#),
    }
}

fn archive(
    state: &mut State,
    key: &str,
    query: &HashMap<String, String>,
    request: &RecordedRequest,
    body: Vec<u8>,
) -> Response {
    if request.content_length != Some(body.len() as u64) {
        return json(400, r#"{"error": "content length mismatch"}"#);
    }

    let version = state.fresh_id("version");

    if let Some(id) = query.get("conjoined_identifier") {
        let part = query
            .get("conjoined_part")
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(0);
        let Some(session) = state.sessions.get_mut(id) else {
            return json(404, r#"{"error": "unknown conjoined archive"}"#);
        };
        if session.key != key || session.state != SessionState::Started {
            return json(409, r#"{"error": "conjoined archive is not open"}"#);
        }
        session.parts.insert(part, body);
    } else {
        state.keys.entry(key.to_string()).or_default().push(Version {
            id: version.clone(),
            data: body,
            deleted: false,
        });
    }

    json(200, &format!(r#"{{"version_identifier": "{}"}}"#, version))
}

fn retrieve(
    state: &mut State,
    key: &str,
    query: &HashMap<String, String>,
    request: &RecordedRequest,
) -> Response {
    let versions = state.keys.get(key);
    let found = match query.get("version_identifier") {
        Some(id) => versions.and_then(|v| v.iter().find(|v| &v.id == id && !v.deleted)),
        None => versions.and_then(|v| v.iter().rev().find(|v| !v.deleted)),
    };
    let Some(version) = found else {
        return json(404, r#"{"error": "not found"}"#);
    };

    match request.header("range") {
        None => Response::from_bytes(200, version.data.clone()),
        Some(range) => {
            let Some((start, end)) = parse_range(range, version.data.len()) else {
                return json(416, r#"{"error": "bad range"}"#);
            };
            Response::from_bytes(206, version.data[start..end].to_vec())
        }
    }
}

/// `bytes=a-b` (inclusive) or `bytes=a-`, clamped to the object
fn parse_range(range: &str, len: usize) -> Option<(usize, usize)> {
    let spec = range.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end = if end.is_empty() {
        len
    } else {
        (end.parse::<usize>().ok()? + 1).min(len)
    };
    if start > end || start > len {
        return None;
    }
    Some((start, end))
}

fn delete(state: &mut State, key: &str, query: &HashMap<String, String>) -> Response {
    let Some(versions) = state.keys.get_mut(key) else {
        return json(404, r#"{"error": "not found"}"#);
    };

    let mut hit = false;
    for version in versions.iter_mut().filter(|v| !v.deleted) {
        match query.get("version") {
            Some(id) if &version.id != id => continue,
            _ => {
                version.deleted = true;
                hit = true;
            }
        }
    }

    if hit {
        json(200, r#"{"success": true}"#)
    } else {
        json(404, r#"{"error": "not found"}"#)
    }
}
