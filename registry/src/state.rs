//! Shared engine state.
//!
//! Three tables back the protocol: `contents` (committed blobs by
//! digest), `uploads` (in-flight upload slots), and `layers` (digests
//! per repository), guarded together by one lock so the upload state
//! machine is race-free. Manifests and the CID cache have their own
//! locks. No lock is held across a suspension point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use bytes::Bytes;
use resolver::Resolver;
use sha2::{Digest, Sha256};
use store::{Blobs, Store};

/// Blob-side tables, mutated only under their shared lock.
#[derive(Debug, Default)]
pub(crate) struct BlobTables {
    /// Committed blobs, keyed globally by digest.
    pub contents: HashMap<String, Bytes>,
    /// In-flight upload slots, keyed by upload id.
    pub uploads: HashMap<String, Vec<u8>>,
    /// Digests per repository, appended on successful ingestion.
    pub layers: HashMap<String, Vec<String>>,
}

/// Manifest bodies per repository, keyed by reference.
pub(crate) type ManifestTable = HashMap<String, HashMap<String, Bytes>>;

struct Inner {
    blobs: Mutex<BlobTables>,
    manifests: Mutex<ManifestTable>,
    cids: RwLock<HashMap<String, String>>,
    store: Store,
    resolver: Resolver,
}

/// Handle to the engine's state, cheap to clone into request tasks.
#[derive(Clone)]
pub(crate) struct RegistryState {
    inner: Arc<Inner>,
}

fn recover<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RegistryState {
    pub(crate) fn new(store: Store, resolver: Resolver) -> Self {
        Self {
            inner: Arc::new(Inner {
                blobs: Mutex::new(BlobTables::default()),
                manifests: Mutex::new(ManifestTable::default()),
                cids: RwLock::new(HashMap::new()),
                store,
                resolver,
            }),
        }
    }

    pub(crate) fn store(&self) -> &Store {
        &self.inner.store
    }

    pub(crate) fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub(crate) fn blobs(&self) -> MutexGuard<'_, BlobTables> {
        recover(&self.inner.blobs)
    }

    pub(crate) fn manifests(&self) -> MutexGuard<'_, ManifestTable> {
        recover(&self.inner.manifests)
    }

    fn cached_cid(&self, repo: &str, reference: &str) -> Option<String> {
        let cids = self
            .inner
            .cids
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        cids.get(&cid_key(repo, reference)).cloned()
    }

    pub(crate) fn cache_cid(&self, repo: &str, reference: &str, cid: &str) {
        let mut cids = self
            .inner
            .cids
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        cids.insert(cid_key(repo, reference), cid.to_string());
    }

    /// Map `(repo, reference)` to a CID: cache first, then the resolver
    /// chain, caching a hit. The error is the human-readable reason;
    /// callers choose the protocol code.
    pub(crate) async fn resolve_cid(&self, repo: &str, reference: &str) -> Result<String, String> {
        if let Some(cid) = self.cached_cid(repo, reference) {
            return Ok(cid);
        }

        let found = self
            .inner
            .resolver
            .resolve(repo, reference)
            .await
            .map_err(|err| err.to_string())?;
        let cid = found
            .into_iter()
            .next()
            .ok_or_else(|| format!("no cid found for {repo}:{reference}"))?;

        tracing::debug!(%repo, %reference, %cid, "resolved cid");
        self.cache_cid(repo, reference, &cid);
        Ok(cid)
    }

    /// Snapshot the repository's blobs for persisting an image. Empty if
    /// the repository is unknown or a recorded digest has lost its
    /// content.
    pub(crate) fn layer_blobs(&self, repo: &str) -> Blobs {
        let tables = self.blobs();
        let Some(digests) = tables.layers.get(repo) else {
            return Blobs::new();
        };

        let mut blobs = Blobs::new();
        for digest in digests {
            match tables.contents.get(digest) {
                Some(data) => {
                    blobs.insert(digest.clone(), data.to_vec());
                }
                None => return Blobs::new(),
            }
        }
        blobs
    }

    /// Drop a repository's layer list and every blob it owned.
    pub(crate) fn remove_repo(&self, repo: &str) {
        let mut tables = self.blobs();
        if let Some(digests) = tables.layers.remove(repo) {
            for digest in digests {
                tables.contents.remove(&digest);
            }
        }
    }
}

fn cid_key(repo: &str, reference: &str) -> String {
    format!("{repo}:{reference}")
}

/// `sha256:` hex digest of a byte slice.
pub(crate) fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}
