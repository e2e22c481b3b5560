//! In-memory object store for tests and embedding.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use deckhand_shared::{DeckhandError, Result};

use crate::object::{
    ListPage, ListRequest, ObjectStore, ObjectSummary, PutReceipt, PutRequest, sha256_hex,
};

/// A stored object with the metadata it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub public_read: bool,
}

/// Object store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    locations: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    failing: RwLock<HashSet<String>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `location` with raw bodies (no content type, private).
    pub async fn insert(&self, location: &str, identifier: &str, body: impl Into<Vec<u8>>) {
        self.locations
            .write()
            .await
            .entry(location.to_string())
            .or_default()
            .insert(
                identifier.to_string(),
                StoredObject {
                    body: body.into(),
                    content_type: None,
                    public_read: false,
                },
            );
    }

    /// Make every fetch of `identifier` fail.
    pub async fn fail_on_get(&self, identifier: &str) {
        self.failing.write().await.insert(identifier.to_string());
    }

    /// Read back an object with its metadata.
    pub async fn object(&self, location: &str, identifier: &str) -> Option<StoredObject> {
        self.locations
            .read()
            .await
            .get(location)
            .and_then(|objects| objects.get(identifier))
            .cloned()
    }

    /// Number of `list_page` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_object` calls served so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(&self, location: &str, request: &ListRequest) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let locations = self.locations.read().await;
        let objects = locations.get(location).ok_or_else(|| {
            DeckhandError::Storage(format!("location {location:?} does not exist"))
        })?;

        let max_keys = request.max_keys.max(1);
        let mut remaining = objects
            .iter()
            .filter(|(id, _)| match &request.continuation_token {
                Some(token) => id.as_str() > token.as_str(),
                None => true,
            })
            .map(|(id, object)| ObjectSummary {
                identifier: id.clone(),
                size: object.body.len() as u64,
            });

        let contents: Vec<ObjectSummary> = remaining.by_ref().take(max_keys).collect();
        let is_truncated = remaining.next().is_some();
        let next_continuation_token = if is_truncated {
            contents.last().map(|o| o.identifier.clone())
        } else {
            None
        };

        Ok(ListPage {
            contents,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn get_object(&self, location: &str, identifier: &str) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.read().await.contains(identifier) {
            return Err(DeckhandError::Storage(format!(
                "failed to read {location}/{identifier}: injected failure"
            )));
        }

        self.locations
            .read()
            .await
            .get(location)
            .and_then(|objects| objects.get(identifier))
            .map(|object| object.body.clone())
            .ok_or_else(|| {
                DeckhandError::Storage(format!("no such object {location}/{identifier}"))
            })
    }

    async fn put_object(&self, location: &str, request: PutRequest) -> Result<PutReceipt> {
        let receipt = PutReceipt {
            identifier: request.identifier.clone(),
            sha256: sha256_hex(&request.body),
            size_bytes: request.body.len(),
        };

        self.locations
            .write()
            .await
            .entry(location.to_string())
            .or_default()
            .insert(
                request.identifier,
                StoredObject {
                    body: request.body,
                    content_type: Some(request.content_type),
                    public_read: request.public_read,
                },
            );

        Ok(receipt)
    }
}
