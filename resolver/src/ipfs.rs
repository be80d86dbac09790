//! Resolver rooted at an existing content tree on the network.

use crate::error::ResolveError;

/// Resolves against `/ipfs/<cid>/<repo>/:<reference>` paths.
#[derive(Debug, Clone)]
pub struct IpfsResolver {
    client: ipfs::Client,
    root: String,
}

impl IpfsResolver {
    /// Create a resolver for an `/ipfs/<cid>` root path.
    pub fn new(client: ipfs::Client, root: &str) -> Self {
        let root = root
            .trim_start_matches("/ipfs/")
            .trim_end_matches('/')
            .to_string();
        Self { client, root }
    }

    #[tracing::instrument(skip(self), fields(root = %self.root))]
    pub(crate) async fn resolve(
        &self,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ResolveError> {
        if reference.is_empty() {
            let links = self.client.ls(&format!("{}/{repo}", self.root)).await?;
            return Ok(links.into_iter().map(|link| link.name).collect());
        }

        let content = self
            .client
            .cat(&format!("{}/{repo}/:{reference}", self.root))
            .await?;
        Ok(vec![String::from_utf8_lossy(&content).trim().to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_strips_the_path_prefix() {
        let client = ipfs::Client::new("");
        let resolver = IpfsResolver::new(client, "/ipfs/bafyroot/");
        assert_eq!(resolver.root, "bafyroot");
    }
}
