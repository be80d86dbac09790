//! Local filesystem backend.

use camino::{Utf8Path, Utf8PathBuf};
use resolver::{FileResolver, Resolver};

use crate::digest::compute_cid;
use crate::error::StoreError;
use crate::image::{Blobs, Image, Manifests};
use crate::layout;

/// Writes images under `<root>/<cid>/` and resolves tags through the
/// `cids/` side-table.
#[derive(Debug)]
pub struct FileStore {
    location: Utf8PathBuf,
    resolver: Resolver,
}

impl FileStore {
    /// Create a store from a `file:/path` URI.
    pub fn new(uri: &str) -> Self {
        let path = uri.strip_prefix("file:").unwrap_or(uri);
        let location = Utf8PathBuf::from(path);
        let resolver = Resolver::File(FileResolver::new(&format!(
            "file:{}",
            location.join("cids")
        )));
        Self { location, resolver }
    }

    #[tracing::instrument(skip_all, fields(name = %image.name, location = %self.location))]
    pub(crate) async fn save(&self, image: &Image) -> Result<String, StoreError> {
        crate::validate(image)?;
        let cid = compute_cid(image)?;
        layout::save_image_tree(&self.location, &cid, image).await?;
        layout::save_cid_table(&self.location, &cid, image).await?;
        Ok(cid)
    }

    pub(crate) async fn resolve(
        &self,
        name: &str,
        reference: &str,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self.resolver.resolve(name, reference).await?)
    }

    pub(crate) async fn has_blob(&self, cid: &str, digest: &str) -> bool {
        tokio::fs::try_exists(layout::blob_path(&self.location, cid, digest))
            .await
            .unwrap_or(false)
    }

    pub(crate) async fn get_blob(&self, cid: &str, digest: &str) -> Result<Vec<u8>, StoreError> {
        read(
            &layout::blob_path(&self.location, cid, digest),
            format!("{cid}:{digest}"),
        )
        .await
    }

    pub(crate) async fn get_manifest(
        &self,
        cid: &str,
        reference: &str,
    ) -> Result<Vec<u8>, StoreError> {
        read(
            &layout::manifest_path(&self.location, cid, reference),
            format!("{cid}:{reference}"),
        )
        .await
    }
}

async fn read(path: &Utf8Path, name: String) -> Result<Vec<u8>, StoreError> {
    tokio::fs::read(path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::not_found(name)
        } else {
            StoreError::Io(err)
        }
    })
}

/// Read a `blobs/` + `manifests/` tree back into an [`Image`]. The tree
/// must contain at least one manifest and a digest-named manifest entry.
pub async fn load_image(location: &Utf8Path) -> Result<Image, StoreError> {
    let mut manifests = Manifests::new();
    let mut has_digest_manifest = false;

    let mut dir = tokio::fs::read_dir(location.join("manifests")).await?;
    while let Some(entry) = dir.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("sha256:") {
            has_digest_manifest = true;
        }
        let data = tokio::fs::read(entry.path()).await?;
        manifests.insert(name, data);
    }
    if manifests.is_empty() || !has_digest_manifest {
        return Err(StoreError::Invalid);
    }

    let mut blobs = Blobs::new();
    let mut dir = tokio::fs::read_dir(location.join("blobs")).await?;
    while let Some(entry) = dir.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let data = tokio::fs::read(entry.path()).await?;
        blobs.insert(name, data);
    }
    if blobs.is_empty() {
        return Err(StoreError::Invalid);
    }

    Ok(Image {
        name: String::new(),
        manifests,
        blobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Image {
        let mut blobs = Blobs::new();
        blobs.insert("sha256:aaa".to_string(), b"layer-a".to_vec());
        blobs.insert("sha256:bbb".to_string(), b"layer-b".to_vec());
        let mut manifests = Manifests::new();
        manifests.insert("latest".to_string(), b"manifest".to_vec());
        manifests.insert("sha256:mmm".to_string(), b"manifest".to_vec());
        Image::new("library/busybox", manifests, blobs)
    }

    fn store_at(tmp: &tempfile::TempDir) -> FileStore {
        FileStore::new(&format!("file:{}", tmp.path().display()))
    }

    #[tokio::test]
    async fn save_lays_out_the_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_at(&tmp);
        let cid = store.save(&sample()).await.unwrap();

        assert!(tmp.path().join(&cid).join("blobs/sha256:aaa").exists());
        assert!(tmp.path().join(&cid).join("manifests/latest").exists());
        assert!(tmp
            .path()
            .join("cids/library/busybox/:latest")
            .exists());
        // Digest references never land in the side-table.
        assert!(!tmp
            .path()
            .join("cids/library/busybox/:sha256:mmm")
            .exists());
    }

    #[tokio::test]
    async fn save_then_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_at(&tmp);
        let cid = store.save(&sample()).await.unwrap();

        assert!(store.has_blob(&cid, "sha256:aaa").await);
        assert!(!store.has_blob(&cid, "sha256:zzz").await);
        assert_eq!(store.get_blob(&cid, "sha256:bbb").await.unwrap(), b"layer-b");
        assert_eq!(store.get_manifest(&cid, "latest").await.unwrap(), b"manifest");

        let err = store.get_blob(&cid, "sha256:zzz").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn resolve_reads_the_side_table() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_at(&tmp);
        let cid = store.save(&sample()).await.unwrap();

        let found = store.resolve("library/busybox", "latest").await.unwrap();
        assert_eq!(found, vec![cid]);
    }

    #[tokio::test]
    async fn load_image_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_at(&tmp);
        let image = sample();
        let cid = store.save(&image).await.unwrap();

        let root = Utf8PathBuf::from(tmp.path().display().to_string()).join(&cid);
        let loaded = load_image(&root).await.unwrap();
        assert_eq!(loaded.manifests, image.manifests);
        assert_eq!(loaded.blobs, image.blobs);
    }

    #[tokio::test]
    async fn load_image_requires_a_digest_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("manifests")).unwrap();
        std::fs::create_dir_all(root.join("blobs")).unwrap();
        std::fs::write(root.join("manifests/latest"), b"m").unwrap();
        std::fs::write(root.join("blobs/sha256:aaa"), b"l").unwrap();

        let root = Utf8PathBuf::from(root.display().to_string());
        assert!(matches!(
            load_image(&root).await,
            Err(StoreError::Invalid)
        ));
    }
}
