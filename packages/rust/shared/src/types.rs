//! Core domain types for Deckhand content objects.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContentFormat
// ---------------------------------------------------------------------------

/// Declared format of a content object, taken from its identifier extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Raw HTML fragment (`.html`).
    Markup,
    /// Markdown text (`.md`).
    Markdown,
}

impl ContentFormat {
    /// Identifier extension for this format, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markup => "html",
            Self::Markdown => "md",
        }
    }

    /// Map an identifier extension back to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "html" => Some(Self::Markup),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

// ---------------------------------------------------------------------------
// ContentObject
// ---------------------------------------------------------------------------

/// A stored content item whose identifier follows the `<group>/<subindex>.<ext>` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentObject {
    /// Full identifier within its storage location (e.g. `3/2.md`).
    pub identifier: String,
    /// Raw body bytes as stored.
    pub body: Vec<u8>,
    /// Format declared by the identifier extension.
    pub format: ContentFormat,
}

impl ContentObject {
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

// ---------------------------------------------------------------------------
// ParsedKey
// ---------------------------------------------------------------------------

/// Two-level ordering position of a content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedKey {
    /// First numeric segment; one slide per group.
    pub group: u64,
    /// Second numeric segment; orders parts within a group.
    pub subindex: u64,
    pub format: ContentFormat,
}

// ---------------------------------------------------------------------------
// SearchDocument
// ---------------------------------------------------------------------------

/// A markdown object prepared for the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Identifier with the `.md` suffix stripped (e.g. `3/2`).
    pub id: String,
    /// Searchable text.
    pub text: String,
}

impl SearchDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}
