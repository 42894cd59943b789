//! Configuration file support.
//!
//! Settings are read from TOML. Every section and field has a default, so
//! an empty file (or no file at all) is a valid configuration. A few values
//! can also be overridden from the environment, which wins over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_MAX_PROOF_FILE_SIZE: u64 = 1024 * 1024;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Overrides [`ArtifactsConfig::cache_dir`].
pub const ARTIFACT_DIR_ENV: &str = "SEMAPHORE_ARTIFACT_DIR";
/// Overrides [`ProofConfig::max_file_size`].
pub const MAX_PROOF_FILE_SIZE_ENV: &str = "SEMAPHORE_MAX_PROOF_FILE_SIZE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub proof: ProofConfig,
    #[serde(default)]
    pub nullifiers: NullifiersConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_true")]
    pub enable_persistence: bool,
    #[serde(default = "default_artifact_version")]
    pub version: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default = "default_max_proof_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullifiersConfig {
    #[serde(default = "default_registry_file")]
    pub registry_file: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_artifacts_dir(),
            enable_persistence: true,
            version: default_artifact_version(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_PROOF_FILE_SIZE,
        }
    }
}

impl Default for NullifiersConfig {
    fn default() -> Self {
        Self {
            registry_file: default_registry_file(),
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".semaphore-artifacts")
}

fn default_true() -> bool {
    true
}

fn default_artifact_version() -> String {
    crate::artifacts::ARTIFACT_VERSION.to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_max_proof_file_size() -> u64 {
    DEFAULT_MAX_PROOF_FILE_SIZE
}

fn default_registry_file() -> PathBuf {
    PathBuf::from("nullifiers.txt")
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    /// Loads `path` if given (defaults otherwise), then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`. Unparseable values are
    /// ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ARTIFACT_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.artifacts.cache_dir = PathBuf::from(dir);
        }
        if let Some(size) = lookup(MAX_PROOF_FILE_SIZE_ENV).and_then(|s| s.parse().ok()) {
            self.proof.max_file_size = size;
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
