//! Object store contract shared by every backend.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use deckhand_shared::{DeckhandError, Result};

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub identifier: String,
    pub size: u64,
}

/// Parameters of a single listing call.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Token from the previous page; `None` requests the first page.
    pub continuation_token: Option<String>,
    /// Maximum entries in the returned page.
    pub max_keys: usize,
}

/// A page of listed objects in lexicographic identifier order.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub contents: Vec<ObjectSummary>,
    /// More entries follow; request them with `next_continuation_token`.
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// An object to write.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub identifier: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Readable without credentials once published.
    pub public_read: bool,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub identifier: String,
    /// Hex SHA-256 of the written body.
    pub sha256: String,
    pub size_bytes: usize,
}

/// Durable, location-scoped object storage.
///
/// A location is a flat namespace of `/`-separated identifiers (a bucket).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of identifiers in `location`.
    async fn list_page(&self, location: &str, request: &ListRequest) -> Result<ListPage>;

    /// Fetch the body of `identifier` in `location`.
    async fn get_object(&self, location: &str, identifier: &str) -> Result<Vec<u8>>;

    /// Write (or overwrite) an object in `location`.
    async fn put_object(&self, location: &str, request: PutRequest) -> Result<PutReceipt>;
}

/// Hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Reject names that could escape their location (absolute, `..`, empty segments).
pub(crate) fn check_relative(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.contains('\\')
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(())
    } else {
        Err(DeckhandError::validation(format!("invalid {kind}: {name:?}")))
    }
}
