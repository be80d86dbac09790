//! Content-network backend.

use camino::Utf8PathBuf;
use url::Url;

use crate::error::StoreError;
use crate::image::Image;
use crate::layout;
use crate::BlobStream;

/// Persists images by adding them to a node as a recursive tree (CID
/// version 1) and reads them back with `cat`.
///
/// The CID returned by `save` is the one the network assigns to the
/// whole tree; it is not the locally computed image fingerprint (see
/// `DESIGN.md`).
#[derive(Debug)]
pub struct IpfsStore {
    client: ipfs::Client,
    location: Option<Utf8PathBuf>,
}

impl IpfsStore {
    /// Create a store from an `ipfs://host:port[/localpath]` URI; the
    /// optional local path mirrors the `cids/` side-table. An empty URI
    /// selects the default local node.
    pub fn new(uri: &str) -> Self {
        let (host, path) = match Url::parse(uri) {
            Ok(url) => {
                let host = match (url.host_str(), url.port()) {
                    (Some(host), Some(port)) => format!("{host}:{port}"),
                    (Some(host), None) => host.to_string(),
                    (None, _) => String::new(),
                };
                (host, url.path().to_string())
            }
            Err(_) => (String::new(), String::new()),
        };

        Self {
            client: ipfs::Client::new(&host),
            location: (!path.is_empty() && path != "/").then(|| Utf8PathBuf::from(path)),
        }
    }

    /// The API client, shared with resolvers built alongside this store.
    pub fn client(&self) -> &ipfs::Client {
        &self.client
    }

    #[tracing::instrument(skip_all, fields(name = %image.name))]
    pub(crate) async fn save(&self, image: &Image) -> Result<String, StoreError> {
        crate::validate(image)?;
        let cid = self.client.add_image(&image.manifests, &image.blobs).await?;

        if let Some(location) = &self.location {
            // The network copy is authoritative; a side-table failure
            // only costs local tag resolution.
            if let Err(err) = layout::save_cid_table(location, &cid, image).await {
                tracing::warn!(%err, "failed to record cid side-table");
            }
        }
        Ok(cid)
    }

    pub(crate) async fn resolve(
        &self,
        _name: &str,
        _reference: &str,
    ) -> Result<Vec<String>, StoreError> {
        Err(StoreError::NotSupported)
    }

    pub(crate) async fn has_blob(&self, cid: &str, digest: &str) -> bool {
        // A known CID implies the content exists somewhere on the
        // network; ask the node anyway.
        self.client.ls(&format!("{cid}/blobs/{digest}")).await.is_ok()
    }

    pub(crate) async fn get_blob(&self, cid: &str, digest: &str) -> Result<Vec<u8>, StoreError> {
        Ok(self.client.cat(&format!("{cid}/blobs/{digest}")).await?.to_vec())
    }

    pub(crate) async fn blob_stream(&self, cid: &str, digest: &str) -> Result<BlobStream, StoreError> {
        let stream = self
            .client
            .cat_stream(&format!("{cid}/blobs/{digest}"))
            .await?;
        Ok(BlobStream { size: None, stream })
    }

    pub(crate) async fn get_manifest(
        &self,
        cid: &str,
        reference: &str,
    ) -> Result<Vec<u8>, StoreError> {
        Ok(self
            .client
            .cat(&format!("{cid}/manifests/{reference}"))
            .await?
            .to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_selects_host_and_side_table_path() {
        let store = IpfsStore::new("ipfs://10.0.0.7:5001/var/lib/cids");
        assert_eq!(store.location.as_deref().map(|p| p.as_str()), Some("/var/lib/cids"));
    }

    #[test]
    fn empty_uri_has_no_side_table() {
        let store = IpfsStore::new("");
        assert!(store.location.is_none());
    }
}
