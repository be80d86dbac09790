//! Blob endpoints: reads, and the chunked upload state machine.
//!
//! Upload lifecycle, keyed by a server-chosen id:
//!
//! ```text
//! POST ../blobs/uploads/            -> open (Location carries the id)
//! PATCH with Content-Range          -> append iff start == slot length
//! PATCH without Content-Range       -> whole body, only once
//! PUT ?digest=..                    -> verify sha256, commit, drop slot
//! POST ../blobs/uploads/?digest=..  -> monolithic shortcut, no slot
//! ```

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::error::{RegistryError, RegistryResult};
use crate::state::{sha256_digest, RegistryState};
use crate::{insert_header, query_param, read_body};

/// Whether this path belongs to the blob sub-engine. Blob URLs are
/// recognized by their trailing segments because the repository name may
/// span several of the leading ones.
pub(crate) fn is_blob(elems: &[&str]) -> bool {
    if elems.len() < 3 {
        return false;
    }
    elems[elems.len() - 2] == "blobs"
        || (elems[elems.len() - 3] == "blobs" && elems[elems.len() - 2] == "uploads")
}

pub(crate) async fn handle(
    state: RegistryState,
    elems: &[&str],
    req: Request,
) -> RegistryResult<Response> {
    if elems.len() < 4 {
        return Err(RegistryError::NameInvalid(
            "blobs must be attached to a repo".to_string(),
        ));
    }

    let target = elems[elems.len() - 1].to_string();
    let service = elems[elems.len() - 2];
    let repo = if service == "uploads" {
        elems[1..elems.len() - 3].join("/")
    } else {
        elems[1..elems.len() - 2].join("/")
    };

    let digest_param = query_param(req.uri(), "digest").filter(|d| !d.is_empty());
    let content_range = req
        .headers()
        .get(header::CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match req.method().as_str() {
        "HEAD" => head_blob(&state, &repo, &target).await,
        "GET" => get_blob(&state, &repo, &target).await,
        "POST" if target == "uploads" => {
            let body = read_body(req).await?;
            match digest_param {
                Some(digest) => monolithic_upload(&state, &repo, &digest, body),
                None => start_upload(&repo),
            }
        }
        "PATCH" if service == "uploads" => {
            let body = read_body(req).await?;
            patch_upload(&state, &repo, &target, content_range, &body)
        }
        "PUT" if service == "uploads" => {
            let body = read_body(req).await?;
            match digest_param {
                Some(digest) => finalize_upload(&state, &repo, &target, &digest, &body),
                None => Err(RegistryError::DigestInvalid(
                    "digest not specified".to_string(),
                )),
            }
        }
        _ => Err(RegistryError::method_unknown()),
    }
}

async fn head_blob(state: &RegistryState, repo: &str, digest: &str) -> RegistryResult<Response> {
    // Local hit; the lock is dropped before any remote fetch.
    {
        let tables = state.blobs();
        if let Some(content) = tables.contents.get(digest) {
            return Ok(blob_head(digest, content.len() as u64));
        }
    }

    let cid = state
        .resolve_cid(repo, digest)
        .await
        .map_err(RegistryError::BlobUnknown)?;
    let content = state
        .store()
        .get_blob(&cid, digest)
        .await
        .map_err(|err| RegistryError::BlobUnknown(err.to_string()))?;
    Ok(blob_head(digest, content.len() as u64))
}

async fn get_blob(state: &RegistryState, repo: &str, digest: &str) -> RegistryResult<Response> {
    {
        let tables = state.blobs();
        if let Some(content) = tables.contents.get(digest) {
            let mut headers = blob_headers(digest, Some(content.len() as u64));
            insert_header(
                &mut headers,
                header::CONTENT_TYPE,
                "application/octet-stream",
            );
            return Ok((StatusCode::OK, headers, content.clone()).into_response());
        }
    }

    let cid = state
        .resolve_cid(repo, digest)
        .await
        .map_err(RegistryError::BlobUnknown)?;
    let blob = state
        .store()
        .blob_stream(&cid, digest)
        .await
        .map_err(|err| RegistryError::BlobUnknown(err.to_string()))?;

    let mut headers = blob_headers(digest, blob.size);
    insert_header(
        &mut headers,
        header::CONTENT_TYPE,
        "application/octet-stream",
    );
    Ok((StatusCode::OK, headers, Body::from_stream(blob.stream)).into_response())
}

/// Monolithic upload: hash, verify, commit; no upload slot is created.
fn monolithic_upload(
    state: &RegistryState,
    repo: &str,
    digest: &str,
    body: Bytes,
) -> RegistryResult<Response> {
    let computed = sha256_digest(&body);
    if computed != digest {
        return Err(RegistryError::DigestInvalid(
            "digest does not match contents".to_string(),
        ));
    }

    let mut tables = state.blobs();
    tables.contents.insert(computed.clone(), body);
    tables
        .layers
        .entry(repo.to_string())
        .or_default()
        .push(computed.clone());

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, docker_content_digest(), &computed);
    Ok((StatusCode::CREATED, headers).into_response())
}

fn start_upload(repo: &str) -> RegistryResult<Response> {
    let id = rand::random::<u64>().to_string();

    let mut headers = HeaderMap::new();
    insert_header(
        &mut headers,
        header::LOCATION,
        &format!("/v2/{repo}/blobs/uploads/{id}"),
    );
    insert_header(&mut headers, header::RANGE, "0-0");
    Ok((StatusCode::ACCEPTED, headers).into_response())
}

fn patch_upload(
    state: &RegistryState,
    repo: &str,
    upload_id: &str,
    content_range: Option<String>,
    body: &[u8],
) -> RegistryResult<Response> {
    let new_len = match content_range {
        Some(range) => {
            let (start, _end) = parse_content_range(&range).ok_or_else(|| {
                RegistryError::BlobUploadUnknown(
                    "We don't understand your Content-Range".to_string(),
                )
            })?;

            let mut tables = state.blobs();
            let current = tables.uploads.get(upload_id).map_or(0, Vec::len);
            if start != current {
                return Err(RegistryError::BlobUploadUnknown(
                    "Your content range doesn't match what we have".to_string(),
                ));
            }

            let slot = tables.uploads.entry(upload_id.to_string()).or_default();
            slot.extend_from_slice(body);
            slot.len()
        }
        None => {
            // Whole-body writes are only accepted into a fresh slot.
            let mut tables = state.blobs();
            if tables.uploads.contains_key(upload_id) {
                return Err(RegistryError::BlobUploadInvalid(
                    "Stream uploads after first write are not allowed".to_string(),
                ));
            }
            tables.uploads.insert(upload_id.to_string(), body.to_vec());
            body.len()
        }
    };

    let mut headers = HeaderMap::new();
    insert_header(
        &mut headers,
        header::LOCATION,
        &format!("/v2/{repo}/blobs/uploads/{upload_id}"),
    );
    insert_header(
        &mut headers,
        header::RANGE,
        &format!("0-{}", new_len.saturating_sub(1)),
    );
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

/// PUT finalization: append any trailing body, verify the digest, and
/// commit. On a mismatch the slot is left as it was before the PUT.
fn finalize_upload(
    state: &RegistryState,
    repo: &str,
    upload_id: &str,
    digest: &str,
    body: &[u8],
) -> RegistryResult<Response> {
    let mut tables = state.blobs();

    let mut slot = tables.uploads.get(upload_id).cloned().unwrap_or_default();
    slot.extend_from_slice(body);

    let computed = sha256_digest(&slot);
    if computed != digest {
        return Err(RegistryError::DigestInvalid(
            "digest does not match contents".to_string(),
        ));
    }

    tables.contents.insert(computed.clone(), Bytes::from(slot));
    tables
        .layers
        .entry(repo.to_string())
        .or_default()
        .push(computed.clone());
    tables.uploads.remove(upload_id);

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, docker_content_digest(), &computed);
    Ok((StatusCode::CREATED, headers).into_response())
}

fn blob_head(digest: &str, size: u64) -> Response {
    (StatusCode::OK, blob_headers(digest, Some(size))).into_response()
}

fn blob_headers(digest: &str, size: Option<u64>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, docker_content_digest(), digest);
    if let Some(size) = size {
        if let Ok(value) = HeaderValue::from_str(&size.to_string()) {
            headers.insert(header::CONTENT_LENGTH, value);
        }
    }
    headers
}

pub(crate) fn docker_content_digest() -> HeaderName {
    HeaderName::from_static("docker-content-digest")
}

/// Parse `<start>-<end>`; anything else is unintelligible.
fn parse_content_range(range: &str) -> Option<(usize, usize)> {
    let (start, end) = range.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}
