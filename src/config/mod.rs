// src/config/mod.rs
//! Service configuration (TOML), with env overrides and sane defaults.
//!
//! Resolution order for the file:
//! 1) $STORYTELLER_CONFIG_PATH
//! 2) config/storyteller.toml
//!
//! A missing file is not an error: every section has built-in defaults.

pub mod llm;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub use llm::LlmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/storyteller.toml";
pub const ENV_CONFIG_PATH: &str = "STORYTELLER_CONFIG_PATH";
/// Comma-separated labels appended to `[arbitration].denylist`.
pub const ENV_DENYLIST: &str = "STORYTELLER_DENYLIST";

/// Labels the classifier is known to emit for uninformative feature vectors.
pub const DEFAULT_DENYLIST: [&str; 4] = [
    "Paralysis (brain hemorrhage)",
    "GERD",
    "Bronchial Asthma",
    "Unknown",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub arbitration: ArbitrationConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub stt: SttConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    /// JSON-lines file for inference records; `None` keeps records in memory.
    #[serde(default = "default_records_path")]
    pub records_path: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_records_path() -> Option<PathBuf> {
    Some(PathBuf::from("records/inference.jsonl"))
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            models_dir: default_models_dir(),
            records_path: default_records_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrationConfig {
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    /// The primary top-1 must reach this probability to be trusted.
    #[serde(default = "default_min_probability")]
    pub min_top_probability: f32,
}

fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()
}
fn default_min_probability() -> f32 {
    0.05
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            denylist: default_denylist(),
            min_top_probability: default_min_probability(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Entries below this probability are dropped from every prediction set.
    #[serde(default = "default_min_probability")]
    pub min_probability: f32,
}

fn default_top_n() -> usize {
    3
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            min_probability: default_min_probability(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_stt_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_stt_timeout_ms() -> u64 {
    120_000
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_ms: default_stt_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Load using env var + default path. Missing file → defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            tracing::info!(target: "startup", path = %path.display(), "no config file, using defaults");
            return Ok(Self::defaults());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg.finish())
    }

    /// Built-in defaults with env overrides applied. Used when no file exists
    /// and when the file cannot be read or parsed.
    pub fn defaults() -> Self {
        Self::default().finish()
    }

    /// Apply env overrides and sanitize values. Never fails.
    fn finish(mut self) -> Self {
        self.llm = self.llm.resolve();

        if let Ok(extra) = std::env::var(ENV_DENYLIST) {
            self.arbitration
                .denylist
                .extend(extra.split(',').map(|s| s.trim().to_string()));
        }
        self.arbitration.denylist = clean_list(std::mem::take(&mut self.arbitration.denylist));

        if !(0.0..=1.0).contains(&self.arbitration.min_top_probability) {
            self.arbitration.min_top_probability = default_min_probability();
        }
        if !(0.0..=1.0).contains(&self.prediction.min_probability) {
            self.prediction.min_probability = default_min_probability();
        }
        if self.prediction.top_n == 0 {
            self.prediction.top_n = default_top_n();
        }
        if self.stt.timeout_ms == 0 {
            self.stt.timeout_ms = default_stt_timeout_ms();
        }
        self
    }
}

/// Trim, drop empties, dedup while keeping first-seen order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
