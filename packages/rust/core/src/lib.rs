//! Core domain logic for Deckhand.
//!
//! Turns a flat corpus of `<group>/<subindex>.<ext>` objects into an ordered
//! slide deck (`keys` → `aggregate` → `render` → `assembler`) and into a
//! fuzzy search index (`search`). The `handlers` wire both paths to storage
//! events and search requests.

pub mod aggregate;
pub mod assembler;
pub mod corpus;
pub mod handlers;
pub mod keys;
pub mod render;
pub mod search;
