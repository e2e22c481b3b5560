//! Groups keyed content objects into ordered slides.
//!
//! Every object sharing a group number belongs to one slide. Groups are
//! ordered ascending; members within a group are ordered by subindex.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use deckhand_shared::ContentObject;

use crate::keys::KeyedObject;

/// One member of a slide group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideMember {
    pub subindex: u64,
    pub object: ContentObject,
}

/// Rendering classification of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Exactly one member; rendered standalone.
    Singleton,
    /// Two or more members; rendered nested inside one outer slide.
    Composite,
}

/// All objects sharing one group number, sorted by subindex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideGroup {
    pub group: u64,
    pub members: Vec<SlideMember>,
}

impl SlideGroup {
    pub fn kind(&self) -> GroupKind {
        if self.members.len() == 1 {
            GroupKind::Singleton
        } else {
            GroupKind::Composite
        }
    }
}

/// Build the ordered slide groups for a corpus.
///
/// 1. Accumulates members per group in one pass
/// 2. Resolves duplicate subindexes: the later object in input order wins
/// 3. Sorts groups by number and members by subindex
#[instrument(skip_all, fields(objects = objects.len()))]
pub fn aggregate(objects: Vec<KeyedObject>) -> Vec<SlideGroup> {
    let mut grouping: HashMap<u64, Vec<SlideMember>> = HashMap::new();

    for KeyedObject { key, object } in objects {
        let members = grouping.entry(key.group).or_default();
        let member = SlideMember {
            subindex: key.subindex,
            object,
        };

        match members.iter_mut().find(|m| m.subindex == key.subindex) {
            Some(existing) => {
                warn!(
                    group = key.group,
                    subindex = key.subindex,
                    replaced = %existing.object.identifier,
                    by = %member.object.identifier,
                    "duplicate subindex, later object wins"
                );
                *existing = member;
            }
            None => members.push(member),
        }
    }

    let mut groups: Vec<SlideGroup> = grouping
        .into_iter()
        .map(|(group, mut members)| {
            members.sort_by_key(|m| m.subindex);
            SlideGroup { group, members }
        })
        .collect();
    groups.sort_by_key(|g| g.group);

    for group in &groups {
        debug!(
            group = group.group,
            members = group.members.len(),
            kind = ?group.kind(),
            "slide group"
        );
    }
    info!(groups = groups.len(), "corpus aggregated");

    groups
}
