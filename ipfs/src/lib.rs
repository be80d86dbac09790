//! Client for the IPFS HTTP API.
//!
//! Covers the three operations the registry needs: a recursive `add` of an
//! image tree (CID version 1), `cat` for reading a path, and `ls` for
//! listing the links under a path. Everything else the node offers is out
//! of scope.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Default API endpoint of a local node.
const DEFAULT_API_ADDR: &str = "127.0.0.1:5001";

/// Connect timeout for API requests. No overall timeout is set because
/// `cat` of a large blob can legitimately take a long time.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure talking to the node.
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status returned by the node.
        status: u16,
        /// Message extracted from the response body, if any.
        message: String,
    },

    /// The node streamed an add response we could not interpret.
    #[error("unexpected add response: {0}")]
    Response(#[from] serde_json::Error),

    /// An `add` finished without reporting a root hash.
    #[error("no results received")]
    EmptyResponse,
}

/// A single link returned by `ls`.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    /// Entry name relative to the listed path.
    #[serde(rename = "Name")]
    pub name: String,
    /// Hash of the linked object.
    #[serde(rename = "Hash")]
    pub hash: String,
}

#[derive(Debug, Deserialize)]
struct LsObject {
    #[serde(rename = "Links", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct LsResponse {
    #[serde(rename = "Objects", default)]
    objects: Vec<LsObject>,
}

/// One NDJSON event from the `add` endpoint.
#[derive(Debug, Deserialize)]
struct AddEvent {
    #[serde(rename = "Hash", default)]
    hash: String,
}

/// Client for a single node's HTTP API.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    /// Create a client for the API at `host` (`host:port`). An empty host
    /// selects the default local endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    pub fn new(host: &str) -> Self {
        let host = if host.is_empty() { DEFAULT_API_ADDR } else { host };
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");

        Self { http, base }
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.base, command)
    }

    /// Add an image as a two-directory tree (`blobs/`, `manifests/`) and
    /// return the hash of the tree root.
    #[tracing::instrument(skip_all, fields(blobs = blobs.len(), manifests = manifests.len()))]
    pub async fn add_image(
        &self,
        manifests: &BTreeMap<String, Vec<u8>>,
        blobs: &BTreeMap<String, Vec<u8>>,
    ) -> Result<String, Error> {
        let mut form = Form::new()
            .part("file", dir_part("image")?)
            .part("file", dir_part("image/blobs")?)
            .part("file", dir_part("image/manifests")?);

        for (digest, data) in blobs {
            let name = format!("image/blobs/{digest}");
            form = form.part("file", file_part(&name, data.clone())?);
        }
        for (reference, data) in manifests {
            let name = format!("image/manifests/{reference}");
            form = form.part("file", file_part(&name, data.clone())?);
        }

        let response = self
            .http
            .post(self.endpoint("add"))
            .query(&[("recursive", "true"), ("cid-version", "1")])
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        parse_add_response(&body)
    }

    /// Read the full content at `path` (`<cid>/rest...`).
    #[tracing::instrument(skip(self))]
    pub async fn cat(&self, path: &str) -> Result<Bytes, Error> {
        let response = self
            .http
            .post(self.endpoint("cat"))
            .query(&[("arg", path)])
            .send()
            .await?;
        Ok(check_status(response).await?.bytes().await?)
    }

    /// Read the content at `path` as a byte stream. Prefer this over
    /// [`Client::cat`] when relaying the content to another peer.
    #[tracing::instrument(skip(self))]
    pub async fn cat_stream(&self, path: &str) -> Result<BoxStream<'static, io::Result<Bytes>>, Error> {
        let response = self
            .http
            .post(self.endpoint("cat"))
            .query(&[("arg", path)])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(Box::pin(
            response
                .bytes_stream()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err)),
        ))
    }

    /// List the links under `path`.
    #[tracing::instrument(skip(self))]
    pub async fn ls(&self, path: &str) -> Result<Vec<Link>, Error> {
        let response = self
            .http
            .post(self.endpoint("ls"))
            .query(&[("arg", path)])
            .send()
            .await?;
        let listing: LsResponse = check_status(response).await?.json().await?;
        Ok(listing.objects.into_iter().flat_map(|o| o.links).collect())
    }
}

/// The `add` endpoint streams one JSON object per line; the last hash is
/// the root of the whole tree.
fn parse_add_response(body: &str) -> Result<String, Error> {
    let mut root = String::new();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let event: AddEvent = serde_json::from_str(line)?;
        if !event.hash.is_empty() {
            root = event.hash;
        }
    }
    if root.is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(root)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // The node reports failures as `{"Message": "..."}`.
    #[derive(Deserialize)]
    struct ApiMessage {
        #[serde(rename = "Message", default)]
        message: String,
    }

    let message = match response.json::<ApiMessage>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => status.to_string(),
    };
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

fn dir_part(path: &str) -> Result<Part, Error> {
    Ok(Part::bytes(Vec::new())
        .file_name(encode_component(path))
        .mime_str("application/x-directory")?)
}

fn file_part(path: &str, data: Vec<u8>) -> Result<Part, Error> {
    Ok(Part::bytes(data)
        .file_name(encode_component(path))
        .mime_str("application/octet-stream")?)
}

/// The API expects part filenames percent-encoded, including `/`.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
