//! Error types for resealeds-core operations.
//! Nothing here is fatal to the process; callers log or surface these.

use std::path::PathBuf;

use resealeds_protocol::{DecodeError, ProductId};

/// Failures reported by a [`crate::store::CatalogStore`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store refused the request: {0}")]
    PermissionDenied(String),

    #[error("store returned a malformed record: {0}")]
    Decode(#[from] DecodeError),
}

/// Failures merging a confirmed record into the local list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("product {0} is already in the catalog")]
    DuplicateId(ProductId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session observer already has an active subscription")]
    AlreadySubscribed,
}

/// All errors that can occur in resealeds-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    // ─────────────────────────────────────────────────────────────────────
    // View Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid product: {0}")]
    Invalid(#[from] DecodeError),

    #[error("adding products requires a signed-in session")]
    NotSignedIn,

    #[error("catalog view is no longer mounted")]
    ViewClosed,

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using CatalogError.
pub type Result<T> = std::result::Result<T, CatalogError>;
