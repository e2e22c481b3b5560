//! Shared types, error model, and configuration for Deckhand.
//!
//! This crate is the foundation depended on by all other Deckhand crates.
//! It provides:
//! - [`DeckhandError`], the unified error type
//! - Domain types ([`ContentObject`], [`ParsedKey`], [`SearchDocument`])
//! - Configuration ([`AppConfig`], [`FetchOptions`], [`SearchOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CdnConfig, FetchOptions, MAX_BITAP_PATTERN_LENGTH, PresentationConfig,
    SearchConfig, SearchOptions, StackConfig, StorageConfig, apply_env_overrides,
    apply_overrides_from, config_dir, config_file_path, init_config, init_config_at,
    load_config, load_config_from, load_config_or_default, validate_config,
};
pub use error::{DeckhandError, Result};
pub use types::{ContentFormat, ContentObject, ParsedKey, SearchDocument};
