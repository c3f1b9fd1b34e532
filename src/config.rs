//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILTRIAGE_CONFIG` (environment variable)
//! 2. `~/.config/mailtriage/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailtriage\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Every value is checked by [`Config::validate`] before any mailbox is
//! touched; an out-of-range threshold is fatal at startup.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Which messages are fetched for triage.
    pub fetch: FetchConfig,
    /// Content sufficiency gate.
    pub content: ContentConfig,
    /// Local and cross-folder spam detection.
    pub spam: SpamConfig,
    /// Text vectorizer.
    pub vectorizer: VectorizerConfig,
    /// Clustering engine.
    pub clustering: ClusteringConfig,
    /// Category folder matching and cleanup.
    pub category: CategoryConfig,
    /// Active-conversation filter.
    pub conversation: ConversationConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Compute and log the plan, never mutate the mailbox.
    pub dry_run: bool,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Fetch window for the folder being triaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Folder to organize.
    pub folder: String,
    /// Maximum number of (most recent) messages to consider.
    pub limit: usize,
    /// Only messages received within this many days.
    pub since_days: Option<u32>,
    /// Only messages received on or after this date (`YYYY-MM-DD`).
    /// Takes precedence over `since_days`.
    pub since_date: Option<String>,
}

/// Content sufficiency thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Minimum number of characters of subject + body.
    pub min_chars: usize,
    /// Minimum number of whitespace-delimited tokens.
    pub min_tokens: usize,
    /// Treat messages with an empty sender or subject as insufficient.
    pub require_headers: bool,
}

/// Spam detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamConfig {
    /// Cosine similarity to a spam/trash reference at which a message is spam.
    pub cross_similarity: f64,
    /// Maximum number of reference messages sampled from spam/trash folders.
    pub cross_sample_limit: usize,
}

/// Stop-word list selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwordsMode {
    None,
    English,
}

/// TF-IDF vectorizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Maximum vocabulary size.
    pub max_features: usize,
    /// Stop-word list.
    pub stopwords: StopwordsMode,
}

/// Clustering thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Pairwise cosine similarity at which two messages are linked.
    pub similarity_threshold: f64,
    /// Smallest cluster that is acted upon.
    pub min_cluster_size: usize,
    /// Smallest cluster, as a fraction of eligible messages, that is acted upon.
    pub min_cluster_fraction: f64,
}

/// Category folder matching and cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Combined score at which a cluster reuses an existing category folder.
    pub match_similarity: f64,
    /// Weight of sender overlap in the combined score.
    pub sender_weight: f64,
    /// Maximum number of messages sampled from each category folder.
    pub sample_limit: usize,
    /// Delete empty category folders before organizing.
    pub cleanup_empty_folders: bool,
}

/// Active-conversation detection via Sent/Drafts folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub enabled: bool,
    /// How far back Sent/Drafts are scanned.
    pub history_days: u32,
    /// Maximum messages scanned per Sent/Drafts folder.
    pub history_limit: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            folder: "INBOX".to_string(),
            limit: 100,
            since_days: Some(7),
            since_date: None,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_chars: 40,
            min_tokens: 6,
            require_headers: true,
        }
    }
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            cross_similarity: 0.6,
            cross_sample_limit: 200,
        }
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 100,
            stopwords: StopwordsMode::None,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.25,
            min_cluster_size: 2,
            min_cluster_fraction: 0.10,
        }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            match_similarity: 0.5,
            sender_weight: 0.2,
            sample_limit: 50,
            cleanup_empty_folders: true,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_days: 360,
            history_limit: 300,
        }
    }
}

// ── Validation ──────────────────────────────────────────────────

fn check_unit(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TriageError::config(
            field,
            format!("{value} is outside the range 0.0..=1.0"),
        ));
    }
    Ok(())
}

fn check_nonzero(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TriageError::config(field, "must be greater than zero"));
    }
    Ok(())
}

impl Config {
    /// Reject out-of-range or malformed values.
    pub fn validate(&self) -> Result<()> {
        check_unit(
            "clustering.similarity_threshold",
            self.clustering.similarity_threshold,
        )?;
        check_unit(
            "clustering.min_cluster_fraction",
            self.clustering.min_cluster_fraction,
        )?;
        check_nonzero("clustering.min_cluster_size", self.clustering.min_cluster_size)?;
        check_unit("spam.cross_similarity", self.spam.cross_similarity)?;
        check_nonzero("spam.cross_sample_limit", self.spam.cross_sample_limit)?;
        check_unit("category.match_similarity", self.category.match_similarity)?;
        check_unit("category.sender_weight", self.category.sender_weight)?;
        check_nonzero("category.sample_limit", self.category.sample_limit)?;
        check_nonzero("vectorizer.max_features", self.vectorizer.max_features)?;
        check_nonzero("fetch.limit", self.fetch.limit)?;
        if self.fetch.folder.trim().is_empty() {
            return Err(TriageError::config("fetch.folder", "must not be empty"));
        }
        self.since_date()?;
        Ok(())
    }

    /// Parsed `fetch.since_date`, if set.
    pub fn since_date(&self) -> Result<Option<NaiveDate>> {
        match self.fetch.since_date.as_deref() {
            None => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Some)
                .map_err(|e| TriageError::config("fetch.since_date", format!("'{s}': {e}"))),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file exists. A file that
/// exists but fails to read or parse is an error.
pub fn load_config() -> Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(Config::default()),
    }
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
    let cfg = toml::from_str::<Config>(&contents).map_err(|e| TriageError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILTRIAGE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailtriage").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailtriage")
}
