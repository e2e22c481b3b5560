//! Slide fragment rendering.
//!
//! Content is trusted and inserted verbatim; no escaping is applied.

use deckhand_shared::ContentFormat;

use crate::aggregate::{GroupKind, SlideGroup};

/// Render one piece of content as a standalone slide section.
///
/// Markdown is wrapped for client-side markdown rendering; markup is
/// placed directly inside the section.
pub fn render_slide(text: &str, format: ContentFormat) -> String {
    match format {
        ContentFormat::Markdown => format!(
            r#"<section data-markdown><script type="text/template">{text}</script></section>"#
        ),
        ContentFormat::Markup => format!("<section>{text}</section>"),
    }
}

/// Wrap already-rendered slides in an outer section (vertical sub-slides).
pub fn wrap_slides(inner: &str) -> String {
    format!("\n<section>\n{inner}\n</section>\n")
}

/// Render a whole group: singletons standalone, composites wrapped.
pub fn render_group(group: &SlideGroup) -> String {
    match group.kind() {
        GroupKind::Singleton => group
            .members
            .first()
            .map(|m| render_slide(&m.object.text(), m.object.format))
            .unwrap_or_default(),
        GroupKind::Composite => {
            let inner = group
                .members
                .iter()
                .map(|m| render_slide(&m.object.text(), m.object.format))
                .collect::<Vec<_>>()
                .join("\n");
            wrap_slides(&inner)
        }
    }
}
