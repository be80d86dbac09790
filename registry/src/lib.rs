//! # Registry front-end
//!
//! Implements the pull/push subset of the registry distribution
//! protocol over a content-addressed [`store::Store`]:
//!
//! - Blob reads and the chunked upload state machine
//! - Manifest upload, retrieval, and deletion
//! - Catalog and tag listing
//! - Read misses fall back through a [`resolver::Resolver`] chain to a
//!   CID, then fetch from the active backend
//!
//! ## Example
//!
//! ```no_run
//! use registry::RegistryBuilder;
//! use store::Store;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = RegistryBuilder::new()
//!     .store(Store::create("memory:")?)
//!     .build();
//!
//! // Serve `app` with axum or any tower-compatible server.
//! # Ok(())
//! # }
//! ```

mod api;
mod blob;
mod error;
mod manifest;
mod state;

pub use api::{RegistryBuilder, RegistryConfig};
pub use error::{RegistryError, RegistryResult};

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use bytes::Bytes;

/// Read the full request body.
pub(crate) async fn read_body(req: Request) -> Result<Bytes, RegistryError> {
    axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|err| RegistryError::BlobUploadInvalid(format!("failed to read body: {err}")))
}

/// Extract a query parameter, percent-decoded.
pub(crate) fn query_param(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

/// Set a header, silently skipping values that are not valid header
/// text.
pub(crate) fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
