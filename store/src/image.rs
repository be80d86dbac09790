//! The in-memory image value object.

use std::collections::BTreeMap;

/// Manifest bodies keyed by reference (tag or `sha256:` digest).
pub type Manifests = BTreeMap<String, Vec<u8>>;

/// Blob bodies keyed by `sha256:` digest.
pub type Blobs = BTreeMap<String, Vec<u8>>;

/// An image as the registry hands it to a store: a name plus raw
/// manifest and blob bytes. Ordered maps keep every derived fingerprint
/// independent of insertion order.
#[derive(Debug, Clone, Default)]
pub struct Image {
    /// Repository name, e.g. `library/busybox`.
    pub name: String,
    /// Manifests by reference; exactly one entry is expected to carry a
    /// digest-form key.
    pub manifests: Manifests,
    /// Blobs by digest.
    pub blobs: Blobs,
}

impl Image {
    /// Bundle up an image.
    pub fn new(name: impl Into<String>, manifests: Manifests, blobs: Blobs) -> Self {
        Self {
            name: name.into(),
            manifests,
            blobs,
        }
    }
}
