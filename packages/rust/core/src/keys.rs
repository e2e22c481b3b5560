//! Identifier parsing for the `<group>/<subindex>.<ext>` naming scheme.
//!
//! Identifiers that don't follow the scheme are unrelated objects sharing the
//! location; they are filtered out, never reported as errors.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use deckhand_shared::{ContentFormat, ContentObject, ParsedKey};

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)/([0-9]+)\.(html|md)$").expect("valid regex")
});

/// A content object together with its parsed ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedObject {
    pub key: ParsedKey,
    pub object: ContentObject,
}

/// Parse an identifier into its group, subindex and format.
///
/// Returns `None` for any identifier outside the naming scheme, including
/// numeric segments too large for `u64`.
pub fn parse_key(identifier: &str) -> Option<ParsedKey> {
    let caps = KEY_RE.captures(identifier)?;
    let group = caps[1].parse().ok()?;
    let subindex = caps[2].parse().ok()?;
    let format = ContentFormat::from_extension(&caps[3])?;

    Some(ParsedKey {
        group,
        subindex,
        format,
    })
}

/// Whether an identifier belongs in the slide corpus.
pub fn is_slide_key(identifier: &str) -> bool {
    parse_key(identifier).is_some()
}

/// Whether an identifier belongs in the search corpus (markdown only).
pub fn is_search_key(identifier: &str) -> bool {
    parse_key(identifier).is_some_and(|key| key.format == ContentFormat::Markdown)
}

/// Search document id for an identifier: the identifier without its `.md` suffix.
pub fn search_id(identifier: &str) -> &str {
    identifier.strip_suffix(".md").unwrap_or(identifier)
}

/// Attach parsed keys to raw `(identifier, body)` pairs, dropping non-matching ones.
///
/// Input order is preserved.
pub fn classify<I>(objects: I) -> Vec<KeyedObject>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    objects
        .into_iter()
        .filter_map(|(identifier, body)| match parse_key(&identifier) {
            Some(key) => Some(KeyedObject {
                key,
                object: ContentObject {
                    identifier,
                    body,
                    format: key.format,
                },
            }),
            None => {
                debug!(%identifier, "identifier outside naming scheme, skipping");
                None
            }
        })
        .collect()
}
