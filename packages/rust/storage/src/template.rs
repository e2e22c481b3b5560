//! Presentation template sources.

use std::path::PathBuf;

use deckhand_shared::{DeckhandError, Result};

/// Supplies the HTML template the slides are substituted into.
pub trait TemplateSource: Send + Sync {
    fn read_template(&self) -> Result<String>;
}

/// Template read from disk on every call.
#[derive(Debug, Clone)]
pub struct FileTemplate {
    path: PathBuf,
}

impl FileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TemplateSource for FileTemplate {
    fn read_template(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            DeckhandError::template(format!(
                "failed to read template {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// Template held in memory.
#[derive(Debug, Clone)]
pub struct StaticTemplate(pub String);

impl TemplateSource for StaticTemplate {
    fn read_template(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
