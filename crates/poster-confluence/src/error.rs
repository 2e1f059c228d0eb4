//! Error types for Confluence integration.

use std::path::PathBuf;

/// Error building an HTTP session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Certificate or key file could not be read or parsed.
    #[error("failed to load {}: {message}", .path.display())]
    CertificateLoad {
        /// File that failed.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The private key does not belong to the certificate.
    #[error("private key {} does not match certificate {}", .key_path.display(), .cert_path.display())]
    KeyCertMismatch {
        key_path: PathBuf,
        cert_path: PathBuf,
    },
}

/// Error from a single Confluence API operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Server answered with a non-retryable error status.
    #[error("HTTP error: {status} - {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// Every attempt failed with a transient error.
    #[error("request failed after {attempts} attempts: {message}")]
    TransportExhausted {
        attempts: u32,
        /// Last failure.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Error publishing one document.
#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    #[error("parent page {title:?} not found in space {space_key}")]
    ParentPageNotFound { space_key: String, title: String },

    #[error("{count} pages titled {title:?} in space {space_key}, cannot pick a parent")]
    AmbiguousParentPage {
        space_key: String,
        title: String,
        count: usize,
    },

    #[error("{count} pages titled {title:?} in space {space_key}, cannot pick one to update")]
    AmbiguousPage {
        space_key: String,
        title: String,
        count: usize,
    },

    /// The document would overwrite its own parent page.
    #[error("page {title:?} is the parent page in space {space_key}, refusing to overwrite it")]
    TitleIsParent { space_key: String, title: String },

    #[error("request rejected: {status} - {body}")]
    RequestRejected { status: u16, body: String },

    /// The page changed concurrently twice in a row.
    #[error("version conflict updating page {page_id} persisted after retry")]
    UpdateConflict { page_id: String },

    #[error("request failed after {attempts} attempts: {message}")]
    TransportExhausted { attempts: u32, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for UpsertError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { status, body } => Self::RequestRejected { status, body },
            ApiError::TransportExhausted { attempts, message } => {
                Self::TransportExhausted { attempts, message }
            }
            ApiError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}
