//! DNSLink resolver.
//!
//! Looks up the `_dnslink.<domain>` TXT record and follows it to a file
//! or content-network resolver. The lookup happens on every resolve so
//! record changes take effect without a restart.

use hickory_resolver::TokioAsyncResolver;

use crate::error::ResolveError;
use crate::file::FileResolver;
use crate::ipfs::IpfsResolver;

#[derive(Debug, Clone)]
pub struct DnsLinkResolver {
    client: ipfs::Client,
    domain: String,
}

impl DnsLinkResolver {
    /// Create a resolver for `domain`.
    pub fn new(client: ipfs::Client, domain: &str) -> Self {
        Self {
            client,
            domain: domain.to_string(),
        }
    }

    #[tracing::instrument(skip(self), fields(domain = %self.domain))]
    pub(crate) async fn resolve(
        &self,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<String>, ResolveError> {
        let target = lookup(&self.domain).await?;
        tracing::debug!(%target, "dnslink target");

        if target.starts_with("file:") {
            FileResolver::new(&target).resolve(repo, reference).await
        } else if target.starts_with("/ipfs/") {
            IpfsResolver::new(self.client.clone(), &target)
                .resolve(repo, reference)
                .await
        } else {
            Err(ResolveError::UnsupportedTarget(target))
        }
    }
}

/// Resolve the first non-empty TXT record of `_dnslink.<domain>`.
async fn lookup(domain: &str) -> Result<String, ResolveError> {
    let name = dnslink_name(domain);
    let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
    let records = resolver.txt_lookup(name.clone()).await?;
    for record in records.iter() {
        let txt = record.to_string();
        if !txt.is_empty() {
            return Ok(strip_dnslink_prefix(&txt).to_string());
        }
    }
    Err(ResolveError::MissingTxtRecord(name))
}

fn dnslink_name(domain: &str) -> String {
    let domain = domain.trim().to_ascii_lowercase();
    if domain.starts_with("_dnslink.") {
        domain
    } else {
        format!("_dnslink.{domain}")
    }
}

fn strip_dnslink_prefix(txt: &str) -> &str {
    txt.strip_prefix("dnslink=").unwrap_or(txt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_the_dnslink_label() {
        assert_eq!(dnslink_name("Example.COM "), "_dnslink.example.com");
        assert_eq!(dnslink_name("_dnslink.example.com"), "_dnslink.example.com");
    }

    #[test]
    fn strips_the_record_prefix() {
        assert_eq!(strip_dnslink_prefix("dnslink=/ipfs/bafy"), "/ipfs/bafy");
        assert_eq!(strip_dnslink_prefix("/ipfs/bafy"), "/ipfs/bafy");
    }
}
