//! Deck assembler.
//!
//! Takes ordered slide groups, renders them, and substitutes the joined
//! body into the presentation template.

use tracing::{debug, instrument};

use deckhand_shared::{DeckhandError, Result};

use crate::aggregate::SlideGroup;
use crate::render::render_group;

/// Separator placed between rendered groups.
const FRAGMENT_SEPARATOR: &str = "\n";

/// Rendered fragments in group order, one per slide group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    fragments: Vec<String>,
}

impl Deck {
    /// Render every group, keeping the input (ascending group) order.
    pub fn render(groups: &[SlideGroup]) -> Self {
        Self {
            fragments: groups.iter().map(render_group).collect(),
        }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Substitute the body into `template` at the first occurrence of `marker`.
    pub fn assemble(&self, template: &str, marker: &str) -> Result<String> {
        assemble_document(&self.fragments, template, marker)
    }
}

/// Join `fragments` and replace the first `marker` in `template` with them.
///
/// A template without the marker is an error: substituting nothing would
/// publish a deck with no slides.
#[instrument(skip_all, fields(fragments = fragments.len(), template_len = template.len()))]
pub fn assemble_document(fragments: &[String], template: &str, marker: &str) -> Result<String> {
    if marker.is_empty() {
        return Err(DeckhandError::config("substitution marker must not be empty"));
    }
    if !template.contains(marker) {
        return Err(DeckhandError::template(format!(
            "template has no {marker:?} marker"
        )));
    }

    let body = fragments.join(FRAGMENT_SEPARATOR);
    let document = template.replacen(marker, &body, 1);

    debug!(body_len = body.len(), document_len = document.len(), "deck assembled");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::keys::classify;

    const TEMPLATE: &str = "<html><div class=\"slides\">%slides%</div></html>";

    fn groups() -> Vec<SlideGroup> {
        aggregate(classify(vec![
            ("2/2.md".to_string(), b"C".to_vec()),
            ("1/1.md".to_string(), b"A".to_vec()),
            ("2/1.html".to_string(), b"B".to_vec()),
        ]))
    }

    #[test]
    fn joins_fragments_with_newline() {
        let doc = assemble_document(&["a".into(), "b".into()], "[%slides%]", "%slides%").unwrap();
        assert_eq!(doc, "[a\nb]");
    }

    #[test]
    fn substitutes_only_first_marker() {
        let doc = assemble_document(&["x".into()], "%m% and %m%", "%m%").unwrap();
        assert_eq!(doc, "x and %m%");
    }

    #[test]
    fn dollar_signs_are_literal() {
        let doc = assemble_document(&["cost: $& $1".into()], "%slides%", "%slides%").unwrap();
        assert_eq!(doc, "cost: $& $1");
    }

    #[test]
    fn missing_marker_fails_loudly() {
        let err = assemble_document(&["a".into()], "<html></html>", "%slides%").unwrap_err();
        assert!(matches!(err, DeckhandError::Template { .. }));
        assert!(err.to_string().contains("%slides%"));
    }

    #[test]
    fn empty_deck_still_substitutes() {
        let deck = Deck::default();
        assert!(deck.is_empty());
        assert_eq!(deck.assemble("[%slides%]", "%slides%").unwrap(), "[]");
    }

    #[test]
    fn deck_renders_in_group_order() {
        let deck = Deck::render(&groups());
        assert_eq!(deck.len(), 2);
        assert!(deck.fragments()[0].contains(">A<"));
        assert!(deck.fragments()[1].starts_with("\n<section>\n<section>B</section>"));

        let doc = deck.assemble(TEMPLATE, "%slides%").unwrap();
        assert!(doc.starts_with("<html><div class=\"slides\"><section data-markdown>"));
        assert!(!doc.contains("%slides%"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let first = Deck::render(&groups()).assemble(TEMPLATE, "%slides%").unwrap();
        let second = Deck::render(&groups()).assemble(TEMPLATE, "%slides%").unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }
}
