//! Resolver backed by a local directory tree.

use camino::Utf8PathBuf;

use crate::error::ResolveError;

/// Resolves against `<root>/<repo>/:<reference>` files; an empty
/// reference lists the entries of `<root>/<repo>`.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: Utf8PathBuf,
}

impl FileResolver {
    /// Create a resolver rooted at a `file:/path` URI (the scheme prefix
    /// is optional).
    pub fn new(uri: &str) -> Self {
        let path = uri.strip_prefix("file:").unwrap_or(uri);
        Self {
            root: Utf8PathBuf::from(path),
        }
    }

    #[tracing::instrument(skip(self), fields(root = %self.root))]
    pub(crate) async fn resolve(
        &self,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ResolveError> {
        if reference.is_empty() {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(self.root.join(repo)).await?;
            while let Some(entry) = dir.next_entry().await? {
                entries.push(entry.file_name().to_string_lossy().into_owned());
            }
            return Ok(entries);
        }

        let path = self.root.join(repo).join(format!(":{reference}"));
        let content = tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ResolveError::not_found(format!("{repo}:{reference}"))
            } else {
                ResolveError::Io(err)
            }
        })?;
        Ok(vec![content.trim().to_string()])
    }
}
