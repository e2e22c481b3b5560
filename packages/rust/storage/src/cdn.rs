//! CDN cache invalidation.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use deckhand_shared::{DeckhandError, Result};

/// A batch of paths to evict from a distribution's edge caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
    pub distribution: String,
    /// Idempotency token; repeated requests with the same reference are one invalidation.
    pub caller_reference: String,
    pub paths: Vec<String>,
}

/// Acknowledgement of an accepted invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationReceipt {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CdnInvalidator: Send + Sync {
    async fn create_invalidation(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationReceipt>;
}

/// One line of the local invalidation log.
#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    id: String,
    created_at: DateTime<Utc>,
    caller_reference: &'a str,
    paths: Vec<String>,
}

/// Appends invalidations to `<log_dir>/<distribution>.jsonl`.
#[derive(Debug, Clone)]
pub struct FsCdnInvalidator {
    log_dir: PathBuf,
}

impl FsCdnInvalidator {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Path of the log file for `distribution`.
    pub fn log_path(&self, distribution: &str) -> PathBuf {
        self.log_dir.join(format!("{distribution}.jsonl"))
    }
}

#[async_trait]
impl CdnInvalidator for FsCdnInvalidator {
    #[instrument(skip_all, fields(distribution = %request.distribution))]
    async fn create_invalidation(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationReceipt> {
        if request.paths.is_empty() {
            return Err(DeckhandError::Cdn("invalidation has no paths".into()));
        }

        tokio::fs::create_dir_all(&self.log_dir)
            .await
            .map_err(|e| DeckhandError::io(&self.log_dir, e))?;

        let receipt = InvalidationReceipt {
            id: Uuid::now_v7().to_string(),
            created_at: Utc::now(),
        };
        let entry = LogEntry {
            id: receipt.id.clone(),
            created_at: receipt.created_at,
            caller_reference: &request.caller_reference,
            paths: request.paths.clone(),
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| DeckhandError::Cdn(format!("failed to encode invalidation: {e}")))?;
        line.push('\n');

        let path = self.log_path(&request.distribution);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DeckhandError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DeckhandError::io(&path, e))?;

        info!(id = %receipt.id, paths = ?request.paths, "invalidation recorded");
        Ok(receipt)
    }
}

/// Keeps every request in memory; optionally fails all of them.
#[derive(Debug, Default)]
pub struct MemoryCdnInvalidator {
    requests: Mutex<Vec<InvalidationRequest>>,
    fail: bool,
}

impl MemoryCdnInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An invalidator that rejects every request.
    pub fn failing() -> Self {
        Self {
            requests: Mutex::default(),
            fail: true,
        }
    }

    pub async fn requests(&self) -> Vec<InvalidationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl CdnInvalidator for MemoryCdnInvalidator {
    async fn create_invalidation(
        &self,
        request: &InvalidationRequest,
    ) -> Result<InvalidationReceipt> {
        if self.fail {
            return Err(DeckhandError::Cdn(format!(
                "distribution {} rejected invalidation",
                request.distribution
            )));
        }

        self.requests.lock().await.push(request.clone());
        Ok(InvalidationReceipt {
            id: Uuid::now_v7().to_string(),
            created_at: Utc::now(),
        })
    }
}
