//! Error type shared by all storage backends.

/// Errors from saving or reading images.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob, manifest, or mapping does not exist.
    #[error("{name} not found")]
    NotFound {
        /// What was looked up.
        name: String,
    },

    /// The image is not persistable (no manifests).
    #[error("invalid image")]
    Invalid,

    /// The operation is not available on this backend.
    #[error("not supported")]
    NotSupported,

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resolver failure below a backend.
    #[error(transparent)]
    Resolve(#[from] resolver::ResolveError),

    /// Content-network failure.
    #[error("content network: {0}")]
    Network(#[from] ipfs::Error),

    /// SSH failure below the scp backend.
    #[error(transparent)]
    Shell(#[from] resolver::ShellError),

    /// The content identifier could not be encoded.
    #[error("cid encoding: {0}")]
    Cid(#[from] multihash::Error),
}

impl StoreError {
    /// Shorthand for a miss on `name`.
    pub fn not_found(name: impl Into<String>) -> Self {
        StoreError::NotFound { name: name.into() }
    }

    /// Whether this error means "no such entry" rather than a transport
    /// failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => true,
            StoreError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            StoreError::Resolve(err) => err.is_not_found(),
            _ => false,
        }
    }
}
