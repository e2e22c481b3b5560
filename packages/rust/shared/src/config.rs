//! Application configuration for Deckhand.
//!
//! User config lives at `~/.deckhand/deckhand.toml`.
//! Environment variables override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeckhandError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "deckhand.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".deckhand";

/// Longest pattern the bitap matcher can hold in a 64-bit mask.
pub const MAX_BITAP_PATTERN_LENGTH: usize = 64;

/// Env var overriding `stack.name`.
pub const ENV_STACK: &str = "DECKHAND_STACK";
/// Env var overriding `presentation.location`.
pub const ENV_PRESENTATION_LOCATION: &str = "DECKHAND_PRESENTATION_LOCATION";
/// Env var overriding `cdn.distribution`.
pub const ENV_CDN_DISTRIBUTION: &str = "DECKHAND_CDN_DISTRIBUTION";

// ---------------------------------------------------------------------------
// Config structs (matching deckhand.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub stack: StackConfig,

    #[serde(default)]
    pub presentation: PresentationConfig,

    #[serde(default)]
    pub cdn: CdnConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local object store (one subdirectory per location).
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// Maximum identifiers returned per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on listing pages followed in one run.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum concurrent object fetches.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_storage_root() -> String {
    "var/store".into()
}
fn default_page_size() -> usize {
    1000
}
fn default_max_pages() -> usize {
    10_000
}
fn default_fetch_concurrency() -> usize {
    16
}

/// `[stack]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack whose outputs name the source location for search.
    #[serde(default = "default_stack_name")]
    pub name: String,

    /// JSON file holding `{ "<stack>": { "<OutputKey>": "<value>" } }`.
    #[serde(default = "default_outputs_file")]
    pub outputs_file: String,

    /// Output key holding the source location.
    #[serde(default = "default_source_output_key")]
    pub source_output_key: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: default_stack_name(),
            outputs_file: default_outputs_file(),
            source_output_key: default_source_output_key(),
        }
    }
}

fn default_stack_name() -> String {
    "deckhand".into()
}
fn default_outputs_file() -> String {
    "var/stack-outputs.json".into()
}
fn default_source_output_key() -> String {
    "SourceBucket".into()
}

/// `[presentation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationConfig {
    /// Location the assembled document is published to.
    #[serde(default = "default_presentation_location")]
    pub location: String,

    /// Identifier of the assembled document.
    #[serde(default = "default_document_key")]
    pub document_key: String,

    /// Path of the HTML template file.
    #[serde(default = "default_template_path")]
    pub template_path: String,

    /// Literal marker replaced by the rendered slides.
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            location: default_presentation_location(),
            document_key: default_document_key(),
            template_path: default_template_path(),
            marker: default_marker(),
        }
    }
}

fn default_presentation_location() -> String {
    "presentation".into()
}
fn default_document_key() -> String {
    "index.html".into()
}
fn default_template_path() -> String {
    "template/index.html".into()
}
fn default_marker() -> String {
    "%slides%".into()
}

/// `[cdn]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    /// Distribution the invalidations are issued against.
    #[serde(default = "default_distribution")]
    pub distribution: String,

    /// Directory of the local invalidation log.
    #[serde(default = "default_cdn_log_dir")]
    pub log_dir: String,

    /// Path pattern covering every search response.
    #[serde(default = "default_search_path")]
    pub search_path: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            distribution: default_distribution(),
            log_dir: default_cdn_log_dir(),
            search_path: default_search_path(),
        }
    }
}

fn default_distribution() -> String {
    "local".into()
}
fn default_cdn_log_dir() -> String {
    "var/cdn".into()
}
fn default_search_path() -> String {
    "/search*".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Score at or below which a match is accepted (0 = exact, 1 = anything).
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Character offset where matches are expected.
    #[serde(default)]
    pub location: usize,

    /// How far from `location` a match may drift before scoring 1.0.
    #[serde(default = "default_distance")]
    pub distance: usize,

    /// Longest pattern matched with bitap; longer ones use word alternation.
    #[serde(default = "default_max_pattern_length")]
    pub max_pattern_length: usize,

    /// Shortest run of matched characters that counts as a hit.
    #[serde(default = "default_min_match_char_length")]
    pub min_match_char_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            location: 0,
            distance: default_distance(),
            max_pattern_length: default_max_pattern_length(),
            min_match_char_length: default_min_match_char_length(),
        }
    }
}

fn default_threshold() -> f64 {
    0.6
}
fn default_distance() -> usize {
    1000
}
fn default_max_pattern_length() -> usize {
    MAX_BITAP_PATTERN_LENGTH
}
fn default_min_match_char_length() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Runtime options (derived from AppConfig)
// ---------------------------------------------------------------------------

/// Corpus retrieval limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Identifiers requested per listing page.
    pub page_size: usize,
    /// Listing pages followed before giving up.
    pub max_pages: usize,
    /// Maximum in-flight object fetches.
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.storage.page_size,
            max_pages: config.storage.max_pages,
            concurrency: config.storage.fetch_concurrency,
        }
    }
}

/// Fuzzy matching options used to build a search index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub threshold: f64,
    pub location: usize,
    pub distance: usize,
    pub max_pattern_length: usize,
    pub min_match_char_length: usize,
    /// Also score each query word against each text word.
    pub tokenize: bool,
    pub case_sensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SearchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            threshold: config.search.threshold,
            location: config.search.location,
            distance: config.search.distance,
            max_pattern_length: config.search.max_pattern_length,
            min_match_char_length: config.search.min_match_char_length,
            tokenize: true,
            case_sensitive: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Directory holding the user config.
///
/// Always `~/.deckhand/`; fails only when no home directory is known.
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| DeckhandError::config("could not determine home directory"))
}

/// Default config file, `~/.deckhand/deckhand.toml`.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the user config.
///
/// A missing file is not an error: every section falls back to its defaults.
pub fn load_config() -> Result<AppConfig> {
    load_config_or_default(&config_file_path()?)
}

/// Load `path` if it exists, defaults otherwise.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig> {
    if path.is_file() {
        return load_config_from(path);
    }
    tracing::debug!(path = %path.display(), "no config file, using defaults");
    Ok(AppConfig::default())
}

/// Load and parse `path`.
///
/// Unlike [`load_config_or_default`], a missing file is an `Io` error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DeckhandError::io(path, e))?;
    toml::from_str(&content)
        .map_err(|e| DeckhandError::config(format!("invalid config {}: {e}", path.display())))
}

/// Write a default config to `~/.deckhand/deckhand.toml`.
///
/// See [`init_config_at`].
pub fn init_config() -> Result<PathBuf> {
    init_config_at(&config_file_path()?)
}

/// Write a default config to `path` unless a file is already there.
///
/// An existing config is left untouched. Returns `path` either way.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        tracing::info!(path = %path.display(), "config already present, leaving it as is");
        return Ok(path.to_path_buf());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| DeckhandError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DeckhandError::config(format!("cannot encode default config: {e}")))?;
    std::fs::write(path, content).map_err(|e| DeckhandError::io(path, e))?;

    tracing::info!(path = %path.display(), "wrote default config");
    Ok(path.to_path_buf())
}

/// Apply `DECKHAND_*` environment overrides.
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides_from(config, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup. Empty values are ignored.
pub fn apply_overrides_from(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(stack) = lookup(ENV_STACK) {
        tracing::debug!(%stack, "stack name overridden from environment");
        config.stack.name = stack;
    }
    if let Some(location) = lookup(ENV_PRESENTATION_LOCATION) {
        tracing::debug!(%location, "presentation location overridden from environment");
        config.presentation.location = location;
    }
    if let Some(distribution) = lookup(ENV_CDN_DISTRIBUTION) {
        tracing::debug!(%distribution, "cdn distribution overridden from environment");
        config.cdn.distribution = distribution;
    }
}

/// Reject configurations the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let search = &config.search;
    if !(0.0..=1.0).contains(&search.threshold) {
        return Err(DeckhandError::config(format!(
            "search.threshold must be within [0, 1], got {}",
            search.threshold
        )));
    }
    if search.max_pattern_length == 0 || search.max_pattern_length > MAX_BITAP_PATTERN_LENGTH {
        return Err(DeckhandError::config(format!(
            "search.max_pattern_length must be within 1..={MAX_BITAP_PATTERN_LENGTH}, got {}",
            search.max_pattern_length
        )));
    }

    let storage = &config.storage;
    for (name, value) in [
        ("storage.page_size", storage.page_size),
        ("storage.max_pages", storage.max_pages),
        ("storage.fetch_concurrency", storage.fetch_concurrency),
    ] {
        if value == 0 {
            return Err(DeckhandError::config(format!("{name} must be at least 1")));
        }
    }

    if config.presentation.marker.is_empty() {
        return Err(DeckhandError::config("presentation.marker must not be empty"));
    }
    if config.presentation.document_key.is_empty() {
        return Err(DeckhandError::config(
            "presentation.document_key must not be empty",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("deckhand-config-test-{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = temp_dir().join(CONFIG_FILE_NAME);
        let config = load_config_or_default(&path).expect("defaults");
        assert_eq!(config.presentation.marker, "%slides%");

        assert!(matches!(
            load_config_from(&path).unwrap_err(),
            DeckhandError::Io { .. }
        ));
    }

    #[test]
    fn init_writes_defaults_once() {
        let dir = temp_dir();
        let path = dir.join("nested").join(CONFIG_FILE_NAME);

        assert_eq!(init_config_at(&path).expect("init"), path);
        let written = load_config_from(&path).expect("load written config");
        assert_eq!(written.stack.name, "deckhand");

        std::fs::write(&path, "[stack]\nname = \"custom\"\n").expect("edit config");
        init_config_at(&path).expect("re-init");
        let kept = load_config_or_default(&path).expect("load kept config");
        assert_eq!(kept.stack.name, "custom");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unparsable_file_names_path() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[search\nthreshold = ").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, DeckhandError::Config { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("document_key"));
        assert!(toml_str.contains("%slides%"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.search.distance, 1000);
        assert_eq!(parsed.stack.source_output_key, "SourceBucket");
        assert!(validate_config(&parsed).is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[presentation]
location = "slides-public"

[search]
threshold = 0.3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.presentation.location, "slides-public");
        assert_eq!(config.presentation.marker, "%slides%");
        assert_eq!(config.search.threshold, 0.3);
        assert_eq!(config.search.max_pattern_length, 64);
        assert_eq!(config.storage.fetch_concurrency, 16);
    }

    #[test]
    fn runtime_options_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchOptions::from(&app);
        assert_eq!(fetch.page_size, 1000);
        assert_eq!(fetch.max_pages, 10_000);

        let search = SearchOptions::from(&app);
        assert_eq!(search.threshold, 0.6);
        assert_eq!(search.location, 0);
        assert_eq!(search.min_match_char_length, 1);
        assert!(search.tokenize);
        assert!(!search.case_sensitive);
    }

    #[test]
    fn env_overrides_applied() {
        let mut config = AppConfig::default();
        apply_overrides_from(&mut config, |name| match name {
            ENV_STACK => Some("prod-stack".into()),
            ENV_CDN_DISTRIBUTION => Some("E123".into()),
            ENV_PRESENTATION_LOCATION => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.stack.name, "prod-stack");
        assert_eq!(config.cdn.distribution, "E123");
        assert_eq!(config.presentation.location, "presentation");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.search.max_pattern_length = 65;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.search.threshold = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.storage.fetch_concurrency = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("fetch_concurrency"));

        let mut config = AppConfig::default();
        config.presentation.marker.clear();
        assert!(validate_config(&config).is_err());
    }
}
