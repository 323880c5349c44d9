//! Error types for swarmstore
//!
//! Provides a unified error type for all client operations. Failures are
//! always returned to the caller; nothing here is treated as fatal and no
//! operation is retried internally.

use thiserror::Error;

/// Result type alias for swarmstore operations
pub type Result<T> = std::result::Result<T, SwarmstoreError>;

/// Unified error type for swarmstore
#[derive(Error, Debug)]
pub enum SwarmstoreError {
    // ===== Transport Errors =====
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request cancelled")]
    Cancelled,

    // ===== Application Errors =====
    /// Non-success response from the node. `message` is the structured
    /// `{code, message}` payload when decodable, the raw body text otherwise.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    // ===== Precondition Errors =====
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("postage batch id is required for this upload")]
    MissingPostageBatch,

    #[error("single owner chunk upload requires a signature")]
    MissingSignature,

    #[error("invalid collection item: no data stream")]
    InvalidCollectionItem,

    // ===== Archive Errors =====
    #[error("archive stream already finalized")]
    ArchiveFinalized,

    #[error("archive stream not finalized")]
    ArchiveNotFinalized,

    #[error("archive entry size mismatch: declared {declared}, written {written}")]
    ArchiveEntrySize { declared: u64, written: u64 },

    #[error("archive entry path too long: {0}")]
    ArchivePathTooLong(String),

    #[error("archive entry too large: {size} bytes (max: {max})")]
    ArchiveEntryTooLarge { size: u64, max: u64 },
}

impl SwarmstoreError {
    /// HTTP status carried by an application-level rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SwarmstoreError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SwarmstoreError::Api {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not Found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SwarmstoreError = io_err.into();
        assert!(matches!(err, SwarmstoreError::Io(_)));
        assert_eq!(err.status(), None);
    }
}
