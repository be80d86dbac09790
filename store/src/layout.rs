//! On-disk layout shared by the filesystem-style backends.
//!
//! ```text
//! <root>/<cid>/blobs/<digest>
//! <root>/<cid>/manifests/<reference>
//! <root>/cids/<repo>/:<reference>   -> file containing the CID
//! ```
//!
//! The `cids/` side-table is what the file resolver reads back later: it
//! lets `resolve(repo, tag)` find the right CID without scanning content.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::StoreError;
use crate::image::Image;

pub(crate) fn blob_path(root: &Utf8Path, cid: &str, digest: &str) -> Utf8PathBuf {
    root.join(cid).join("blobs").join(digest)
}

pub(crate) fn manifest_path(root: &Utf8Path, cid: &str, reference: &str) -> Utf8PathBuf {
    root.join(cid).join("manifests").join(reference)
}

pub(crate) fn cid_path(root: &Utf8Path, name: &str, reference: &str) -> Utf8PathBuf {
    root.join("cids").join(name).join(format!(":{reference}"))
}

/// Write the image's blobs and manifests under `<root>/<cid>/`.
pub(crate) async fn save_image_tree(
    root: &Utf8Path,
    cid: &str,
    image: &Image,
) -> Result<(), StoreError> {
    let manifest_dir = root.join(cid).join("manifests");
    tokio::fs::create_dir_all(&manifest_dir).await?;
    for (reference, data) in &image.manifests {
        tokio::fs::write(manifest_dir.join(reference), data).await?;
    }

    let blob_dir = root.join(cid).join("blobs");
    tokio::fs::create_dir_all(&blob_dir).await?;
    for (digest, data) in &image.blobs {
        tokio::fs::write(blob_dir.join(digest), data).await?;
    }

    Ok(())
}

/// Record `(name, tag) -> cid` for every non-digest manifest reference.
pub(crate) async fn save_cid_table(
    root: &Utf8Path,
    cid: &str,
    image: &Image,
) -> Result<(), StoreError> {
    if image.name.is_empty() {
        return Err(StoreError::Invalid);
    }

    tokio::fs::create_dir_all(root.join("cids").join(&image.name)).await?;
    for reference in image.manifests.keys() {
        if reference.starts_with("sha256:") {
            continue;
        }
        tokio::fs::write(cid_path(root, &image.name, reference), cid).await?;
    }
    Ok(())
}
