//! Filesystem-backed object store: one directory per location.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use deckhand_shared::{DeckhandError, Result};

use crate::object::{
    ListPage, ListRequest, ObjectStore, ObjectSummary, PutReceipt, PutRequest, check_relative,
    sha256_hex,
};

/// Object store rooted at a local directory.
///
/// Identifiers map to relative file paths below `<root>/<location>/`.
/// Each object's content type and public-read flag live in a
/// `.<name>.meta.json` sidecar next to it. Dot-files are invisible to
/// listings (they hold sidecars and in-flight writes).
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

/// Sidecar metadata stored beside each object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    public_read: bool,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn location_dir(&self, location: &str) -> Result<PathBuf> {
        check_relative("location", location)?;
        Ok(self.root.join(location))
    }

    fn object_path(&self, location: &str, identifier: &str) -> Result<PathBuf> {
        check_relative("identifier", identifier)?;
        Ok(self.location_dir(location)?.join(identifier))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    #[instrument(skip_all, fields(location = %location, token = ?request.continuation_token))]
    async fn list_page(&self, location: &str, request: &ListRequest) -> Result<ListPage> {
        let dir = self.location_dir(location)?;
        let missing = format!("location {location:?} does not exist");
        let mut identifiers = tokio::task::spawn_blocking(move || {
            if !dir.is_dir() {
                return Err(DeckhandError::Storage(missing));
            }
            let mut identifiers = Vec::new();
            collect_files(&dir, "", &mut identifiers)?;
            Ok(identifiers)
        })
        .await
        .map_err(|e| DeckhandError::Storage(format!("listing task failed: {e}")))??;
        identifiers.sort_by(|a, b| a.0.cmp(&b.0));

        let remaining: Vec<_> = identifiers
            .into_iter()
            .filter(|(id, _)| match &request.continuation_token {
                Some(token) => id.as_str() > token.as_str(),
                None => true,
            })
            .collect();

        let max_keys = request.max_keys.max(1);
        let is_truncated = remaining.len() > max_keys;
        let contents: Vec<ObjectSummary> = remaining
            .into_iter()
            .take(max_keys)
            .map(|(identifier, size)| ObjectSummary { identifier, size })
            .collect();

        let next_continuation_token = if is_truncated {
            contents.last().map(|o| o.identifier.clone())
        } else {
            None
        };

        debug!(count = contents.len(), is_truncated, "listed page");

        Ok(ListPage {
            contents,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn get_object(&self, location: &str, identifier: &str) -> Result<Vec<u8>> {
        let path = self.object_path(location, identifier)?;
        tokio::fs::read(&path).await.map_err(|e| {
            DeckhandError::Storage(format!("failed to read {location}/{identifier}: {e}"))
        })
    }

    #[instrument(skip_all, fields(location = %location, identifier = %request.identifier))]
    async fn put_object(&self, location: &str, request: PutRequest) -> Result<PutReceipt> {
        let target = self.object_path(location, &request.identifier)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| DeckhandError::io(&parent, e))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let meta = ObjectMeta {
            content_type: request.content_type.clone(),
            public_read: request.public_read,
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| DeckhandError::Storage(format!("failed to encode metadata: {e}")))?;

        write_atomic(&parent, &file_name, &request.body, &target).await?;
        write_atomic(
            &parent,
            &file_name,
            &meta_json,
            &parent.join(meta_file_name(&file_name)),
        )
        .await?;

        debug!(
            size = request.body.len(),
            content_type = %request.content_type,
            public_read = request.public_read,
            "wrote object"
        );

        Ok(PutReceipt {
            identifier: request.identifier,
            sha256: sha256_hex(&request.body),
            size_bytes: request.body.len(),
        })
    }
}

fn meta_file_name(file_name: &str) -> String {
    format!(".{file_name}.meta.json")
}

/// Write to a temp file in `parent`, then rename it over `target`.
async fn write_atomic(parent: &Path, file_name: &str, bytes: &[u8], target: &Path) -> Result<()> {
    let temp = parent.join(format!(".{file_name}.{}.tmp", Uuid::now_v7()));
    tokio::fs::write(&temp, bytes)
        .await
        .map_err(|e| DeckhandError::io(&temp, e))?;
    if let Err(e) = tokio::fs::rename(&temp, target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(DeckhandError::io(target, e));
    }
    Ok(())
}

/// Recursively gather `(identifier, size)` for every visible file below `dir`.
fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<(String, u64)>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| DeckhandError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| DeckhandError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let identifier = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| DeckhandError::io(&path, e))?;
        if metadata.is_dir() {
            collect_files(&path, &identifier, out)?;
        } else {
            out.push((identifier, metadata.len()));
        }
    }
    Ok(())
}
