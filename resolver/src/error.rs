//! Error type shared by all resolver variants.

use crate::shell::ShellError;
use hickory_resolver::error::ResolveError as DnsLookupError;

/// Errors from resolving a `(repository, reference)` pair.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No entry for the requested repository and reference.
    #[error("{name} not found")]
    NotFound {
        /// The `repo:reference` pair that missed.
        name: String,
    },

    /// Filesystem failure below a file resolver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TXT lookup itself failed.
    #[error("dns lookup: {0}")]
    Dns(#[from] DnsLookupError),

    /// The domain has no usable `dnslink=` TXT record.
    #[error("no dnslink TXT record for {0}")]
    MissingTxtRecord(String),

    /// The TXT record points somewhere we cannot follow.
    #[error("unsupported dnslink target: {0}")]
    UnsupportedTarget(String),

    /// Content-network failure below an IPFS resolver.
    #[error("content network: {0}")]
    Network(#[from] ipfs::Error),

    /// SSH failure below an SCP resolver.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// A resolver URI could not be parsed.
    #[error("invalid resolver uri: {0}")]
    InvalidUri(String),
}

impl ResolveError {
    /// Shorthand for a miss on `name`.
    pub fn not_found(name: impl Into<String>) -> Self {
        ResolveError::NotFound { name: name.into() }
    }

    /// Whether this error means "no such entry" rather than a transport
    /// failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            ResolveError::NotFound { .. } => true,
            ResolveError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
