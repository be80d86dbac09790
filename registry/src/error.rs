//! Protocol error contract.
//!
//! Every failure leaves the engine as `{Status, Code, Message}` and is
//! rendered as the distribution-spec JSON body. Storage and resolver
//! errors never cross the HTTP boundary verbatim; call sites translate
//! them into one of these variants.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type for engine operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Error types for engine operations, one per protocol error code.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The URL carries no usable repository name.
    #[error("{0}")]
    NameInvalid(String),

    /// The blob does not exist locally or anywhere we can resolve.
    #[error("{0}")]
    BlobUnknown(String),

    /// The upload request contradicts the slot's state.
    #[error("{0}")]
    BlobUploadInvalid(String),

    /// The Content-Range does not continue the slot.
    #[error("{0}")]
    BlobUploadUnknown(String),

    /// A digest was missing or does not match the content.
    #[error("{0}")]
    DigestInvalid(String),

    /// The manifest does not exist locally or anywhere we can resolve.
    #[error("{0}")]
    ManifestUnknown(String),

    /// Unrecognized method and URL combination.
    #[error("{0}")]
    MethodUnknown(String),
}

impl RegistryError {
    /// Shorthand for the catch-all dispatch failure.
    pub(crate) fn method_unknown() -> Self {
        RegistryError::MethodUnknown("We don't understand your method + url".to_string())
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::BlobUnknown(_) | RegistryError::ManifestUnknown(_) => {
                StatusCode::NOT_FOUND
            }
            RegistryError::BlobUploadUnknown(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            RegistryError::NameInvalid(_)
            | RegistryError::BlobUploadInvalid(_)
            | RegistryError::DigestInvalid(_)
            | RegistryError::MethodUnknown(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for the JSON error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::NameInvalid(_) => "NAME_INVALID",
            RegistryError::BlobUnknown(_) => "BLOB_UNKNOWN",
            RegistryError::BlobUploadInvalid(_) => "BLOB_UPLOAD_INVALID",
            RegistryError::BlobUploadUnknown(_) => "BLOB_UPLOAD_UNKNOWN",
            RegistryError::DigestInvalid(_) => "DIGEST_INVALID",
            RegistryError::ManifestUnknown(_) => "MANIFEST_UNKNOWN",
            RegistryError::MethodUnknown(_) => "METHOD_UNKNOWN",
        }
    }
}

/// Error response body per the distribution spec.
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, serde::Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        let body = ErrorResponse {
            errors: vec![ErrorDetail { code, message }],
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_their_statuses() {
        let err = RegistryError::BlobUploadUnknown("range mismatch".to_string());
        assert_eq!(err.status_code(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(err.error_code(), "BLOB_UPLOAD_UNKNOWN");

        let err = RegistryError::BlobUnknown("missing".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
