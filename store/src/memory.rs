//! In-process backend.

use std::collections::HashMap;

use camino::Utf8PathBuf;
use tokio::sync::RwLock;

use crate::digest::compute_cid;
use crate::error::StoreError;
use crate::image::Image;
use crate::layout;

/// Keeps whole images in a map keyed by CID. Multiple tags pointing at
/// the same bytes share one entry. When constructed as `memory:/path`,
/// the `cids/` side-table is also persisted under that path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: RwLock<HashMap<String, Image>>,
    location: Option<Utf8PathBuf>,
}

impl MemoryStore {
    /// Create a store from a `memory:[/path]` URI.
    pub fn new(uri: &str) -> Self {
        let path = uri.strip_prefix("memory:").unwrap_or_default();
        Self {
            images: RwLock::new(HashMap::new()),
            location: (!path.is_empty()).then(|| Utf8PathBuf::from(path)),
        }
    }

    #[tracing::instrument(skip_all, fields(name = %image.name))]
    pub(crate) async fn save(&self, image: &Image) -> Result<String, StoreError> {
        crate::validate(image)?;
        let cid = compute_cid(image)?;

        {
            let mut images = self.images.write().await;
            images.insert(cid.clone(), image.clone());
        }

        // The side-table write happens outside the lock; it only touches
        // the filesystem.
        if let Some(location) = &self.location {
            layout::save_cid_table(location, &cid, image).await?;
        }

        Ok(cid)
    }

    pub(crate) async fn resolve(
        &self,
        name: &str,
        reference: &str,
    ) -> Result<Vec<String>, StoreError> {
        let images = self.images.read().await;
        for (cid, image) in images.iter() {
            if image.name != name {
                continue;
            }
            if reference.is_empty() {
                return Ok(image.manifests.keys().map(|k| format!(":{k}")).collect());
            }
            if image.manifests.contains_key(reference) {
                return Ok(vec![cid.clone()]);
            }
        }
        Err(StoreError::not_found(name))
    }

    pub(crate) async fn has_blob(&self, cid: &str, digest: &str) -> bool {
        let images = self.images.read().await;
        images
            .get(cid)
            .map(|image| image.blobs.contains_key(digest))
            .unwrap_or(false)
    }

    pub(crate) async fn get_blob(&self, cid: &str, digest: &str) -> Result<Vec<u8>, StoreError> {
        let images = self.images.read().await;
        images
            .get(cid)
            .and_then(|image| image.blobs.get(digest))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{cid}:{digest}")))
    }

    pub(crate) async fn get_manifest(
        &self,
        cid: &str,
        reference: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let images = self.images.read().await;
        images
            .get(cid)
            .and_then(|image| image.manifests.get(reference))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{cid}:{reference}")))
    }
}
