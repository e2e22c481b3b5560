//! Stack output lookup, used to find where source content lives.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use deckhand_shared::{DeckhandError, Result};

/// Resolves named outputs of a deployed stack.
#[async_trait]
pub trait StackOutputs: Send + Sync {
    /// Value of output `key` on `stack`; `Resolution` error when absent.
    async fn output(&self, stack: &str, key: &str) -> Result<String>;
}

/// Outputs read from a JSON file of the form `{ "<stack>": { "<key>": "<value>" } }`.
///
/// The file is re-read on every lookup so a redeploy is picked up without restart.
#[derive(Debug, Clone)]
pub struct FileStackOutputs {
    path: PathBuf,
}

impl FileStackOutputs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StackOutputs for FileStackOutputs {
    async fn output(&self, stack: &str, key: &str) -> Result<String> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DeckhandError::io(&self.path, e))?;

        let stacks: HashMap<String, HashMap<String, String>> = serde_json::from_str(&content)
            .map_err(|e| {
                DeckhandError::validation(format!(
                    "invalid stack outputs file {}: {e}",
                    self.path.display()
                ))
            })?;

        debug!(path = %self.path.display(), stacks = stacks.len(), "loaded stack outputs");

        StaticStackOutputs { stacks }.lookup(stack, key)
    }
}

/// Fixed in-memory outputs.
#[derive(Debug, Clone, Default)]
pub struct StaticStackOutputs {
    stacks: HashMap<String, HashMap<String, String>>,
}

impl StaticStackOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one output value.
    pub fn with_output(
        mut self,
        stack: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.stacks
            .entry(stack.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    fn lookup(&self, stack: &str, key: &str) -> Result<String> {
        self.stacks
            .get(stack)
            .and_then(|outputs| outputs.get(key))
            .cloned()
            .ok_or_else(|| DeckhandError::resolution(stack, key))
    }
}

#[async_trait]
impl StackOutputs for StaticStackOutputs {
    async fn output(&self, stack: &str, key: &str) -> Result<String> {
        self.lookup(stack, key)
    }
}
