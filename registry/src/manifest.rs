//! Manifest endpoints, tag listing, and the catalog.

use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use store::Image;

use crate::blob::docker_content_digest;
use crate::error::{RegistryError, RegistryResult};
use crate::state::{sha256_digest, RegistryState};
use crate::{insert_header, read_body};

/// Whether this path belongs to the manifest sub-engine.
pub(crate) fn is_manifest(elems: &[&str]) -> bool {
    elems.len() >= 4 && elems[elems.len() - 2] == "manifests"
}

/// Whether this path is a tag listing.
pub(crate) fn is_tag_list(elems: &[&str]) -> bool {
    elems.len() >= 4 && elems[elems.len() - 2] == "tags" && elems[elems.len() - 1] == "list"
}

pub(crate) async fn handle(
    state: RegistryState,
    elems: &[&str],
    req: Request,
) -> RegistryResult<Response> {
    let target = elems[elems.len() - 1].to_string();
    let repo = elems[1..elems.len() - 2].join("/");

    match req.method().as_str() {
        "GET" => get_manifest(&state, &repo, &target, true).await,
        "HEAD" => get_manifest(&state, &repo, &target, false).await,
        "PUT" => {
            let body = read_body(req).await?;
            put_manifest(&state, &repo, &target, body).await
        }
        "DELETE" => delete_manifest(&state, &repo),
        _ => Err(RegistryError::method_unknown()),
    }
}

/// Serve a manifest by tag or digest: the local table first, then the
/// resolver chain and the active store.
async fn get_manifest(
    state: &RegistryState,
    repo: &str,
    reference: &str,
    with_body: bool,
) -> RegistryResult<Response> {
    let local = {
        let manifests = state.manifests();
        manifests
            .get(repo)
            .and_then(|entry| entry.get(reference))
            .cloned()
    };

    let body = match local {
        Some(body) => body,
        None => {
            let cid = state
                .resolve_cid(repo, reference)
                .await
                .map_err(RegistryError::ManifestUnknown)?;
            Bytes::from(
                state
                    .store()
                    .get_manifest(&cid, reference)
                    .await
                    .map_err(|err| RegistryError::ManifestUnknown(err.to_string()))?,
            )
        }
    };

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, header::CONTENT_TYPE, &detect_manifest_type(&body));
    insert_header(&mut headers, docker_content_digest(), &sha256_digest(&body));
    insert_header(&mut headers, header::CONTENT_LENGTH, &body.len().to_string());

    if with_body {
        Ok((StatusCode::OK, headers, body).into_response())
    } else {
        Ok((StatusCode::OK, headers).into_response())
    }
}

/// Store the manifest under both its reference and its digest, then
/// persist the whole image and remember the resulting CID.
async fn put_manifest(
    state: &RegistryState,
    repo: &str,
    reference: &str,
    body: Bytes,
) -> RegistryResult<Response> {
    let digest = sha256_digest(&body);

    let manifests = {
        let mut table = state.manifests();
        let entry = table.entry(repo.to_string()).or_default();
        entry.insert(reference.to_string(), body.clone());
        entry.insert(digest.clone(), body.clone());
        entry
            .iter()
            .map(|(reference, data)| (reference.clone(), data.to_vec()))
            .collect()
    };

    let image = Image::new(repo, manifests, state.layer_blobs(repo));
    let cid = state
        .store()
        .save(&image)
        .await
        .map_err(|err| RegistryError::ManifestUnknown(err.to_string()))?;
    tracing::debug!(%repo, %reference, %cid, "image persisted");

    state.cache_cid(repo, reference, &cid);
    state.cache_cid(repo, &digest, &cid);

    let mut headers = HeaderMap::new();
    insert_header(
        &mut headers,
        header::LOCATION,
        &format!("/v2/{repo}/manifests/{digest}"),
    );
    insert_header(&mut headers, docker_content_digest(), &digest);
    Ok((StatusCode::CREATED, headers).into_response())
}

/// Drop the repository's manifests and cascade to its blobs.
fn delete_manifest(state: &RegistryState, repo: &str) -> RegistryResult<Response> {
    let removed = state.manifests().remove(repo);
    if removed.is_none() {
        return Err(RegistryError::ManifestUnknown(format!(
            "no manifests for {repo}"
        )));
    }
    state.remove_repo(repo);
    Ok(StatusCode::ACCEPTED.into_response())
}

/// Tag list response.
#[derive(Debug, serde::Serialize)]
struct TagList {
    name: String,
    tags: Vec<String>,
}

pub(crate) async fn handle_tags(
    state: RegistryState,
    elems: &[&str],
    req: Request,
) -> RegistryResult<Response> {
    if req.method().as_str() != "GET" {
        return Err(RegistryError::method_unknown());
    }
    let repo = elems[1..elems.len() - 2].join("/");

    let references = state
        .resolver()
        .resolve(&repo, "")
        .await
        .map_err(|err| RegistryError::ManifestUnknown(err.to_string()))?;

    // Filesystem-style resolvers list raw `:<tag>` entries.
    let tags = references
        .iter()
        .map(|reference| reference.strip_prefix(':').unwrap_or(reference).to_string())
        .collect();

    Ok(Json(TagList { name: repo, tags }).into_response())
}

/// Catalog response.
#[derive(Debug, serde::Serialize)]
struct Catalog {
    repositories: Vec<String>,
}

pub(crate) async fn catalog(state: RegistryState) -> Response {
    let mut repositories: Vec<String> = state.blobs().layers.keys().cloned().collect();
    repositories.sort();
    Json(Catalog { repositories }).into_response()
}

/// Detect the manifest media type from its content.
fn detect_manifest_type(data: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Some(media_type) = json.get("mediaType").and_then(|v| v.as_str()) {
            return media_type.to_string();
        }
        if json.get("schemaVersion").and_then(|v| v.as_u64()) == Some(2) {
            if json.get("manifests").is_some() {
                return "application/vnd.docker.distribution.manifest.list.v2+json".to_string();
            }
            return "application/vnd.docker.distribution.manifest.v2+json".to_string();
        }
    }
    "application/vnd.oci.image.manifest.v1+json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_manifest_and_tag_urls() {
        assert!(is_manifest(&["v2", "lib", "foo", "manifests", "latest"]));
        assert!(!is_manifest(&["v2", "foo", "blobs", "sha256:a"]));
        assert!(is_tag_list(&["v2", "lib", "foo", "tags", "list"]));
        assert!(!is_tag_list(&["v2", "foo", "tags", "other"]));
    }

    #[test]
    fn media_type_comes_from_the_content() {
        let explicit = br#"{"mediaType":"application/vnd.oci.image.index.v1+json"}"#;
        assert_eq!(
            detect_manifest_type(explicit),
            "application/vnd.oci.image.index.v1+json"
        );

        let v2 = br#"{"schemaVersion":2,"config":{}}"#;
        assert_eq!(
            detect_manifest_type(v2),
            "application/vnd.docker.distribution.manifest.v2+json"
        );

        let list = br#"{"schemaVersion":2,"manifests":[]}"#;
        assert_eq!(
            detect_manifest_type(list),
            "application/vnd.docker.distribution.manifest.list.v2+json"
        );

        assert_eq!(
            detect_manifest_type(b"not json"),
            "application/vnd.oci.image.manifest.v1+json"
        );
    }
}
