//! Remote bucket store access for bucketctl.
//!
//! This crate provides the capability surface the reconciler drives
//! (`RemoteStore`: create, exists, tag, delete, list), an HTTP backend speaking
//! bucket protocol v1, an in-memory backend with fault injection for tests,
//! provider configuration, and credential resolution from declared
//! configuration with an environment fallback.

pub mod config;
pub mod credentials;
pub mod http;
pub mod mock;

pub use config::ProviderConfig;
pub use credentials::{CredentialContext, CredentialError, CredentialField, Credentials};
pub use http::HttpBackend;
pub use mock::{MemoryBackend, Operation, RemoteCall};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Protocol version sent as `X-Bucketctl-Protocol` header on all HTTP requests.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("bucket not found: {0}")]
    NotFound(String),
    #[error("bucket already exists: {0}")]
    AlreadyExists(String),
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("remote backend error: {0}")]
    Backend(String),
    #[error("bucket name cannot be used in a request path: {0}")]
    InvalidName(String),
    #[error("provider config error: {0}")]
    Config(String),
}

/// A bucket as reported by the remote inventory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBucket {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-bucket operations offered by an object-storage account.
///
/// Every call is synchronous and may fail independently; there is no
/// multi-bucket transaction.
pub trait RemoteStore: Send + Sync {
    /// Create an empty bucket.
    fn create(&self, name: &str) -> Result<(), RemoteError>;

    /// Check whether a bucket exists.
    fn exists(&self, name: &str) -> Result<bool, RemoteError>;

    /// Replace the bucket's tag set with `tags`.
    fn tag(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), RemoteError>;

    /// Delete a bucket.
    fn delete(&self, name: &str) -> Result<(), RemoteError>;

    /// List every bucket in the account, in the order the remote reports them.
    fn list(&self) -> Result<Vec<RemoteBucket>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_bucket_serializes_rfc3339() {
        let bucket = RemoteBucket {
            name: "logs".to_owned(),
            created_at: DateTime::parse_from_rfc3339("2024-03-01T12:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_string(&bucket).unwrap();
        assert!(json.contains("\"name\":\"logs\""));
        assert!(json.contains("2024-03-01T12:30:00Z"));
        let back: RemoteBucket = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bucket);
    }

    #[test]
    fn error_messages_carry_context() {
        let err = RemoteError::AlreadyExists("logs".to_owned());
        assert_eq!(err.to_string(), "bucket already exists: logs");
    }
}
