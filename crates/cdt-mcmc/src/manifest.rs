use std::fs;
use std::path::{Path, PathBuf};

use cdt_core::errors::ErrorInfo;
use cdt_core::CdtError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RunConfig;
use crate::kernel::RunSummary;

/// Structured manifest describing a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// SHA-256 of the configuration rendered as YAML.
    pub config_hash: String,
    /// Master seed used to derive substreams.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Canonical hash of the final triangulation, when the universe provides one.
    pub universe_hash: Option<String>,
    /// Run summary.
    pub summary: RunSummary,
    /// Checkpoint files still on disk (relative order preserved).
    pub checkpoints: Vec<PathBuf>,
    /// RFC 3339 timestamp at which the manifest was built.
    pub created_at: String,
}

impl RunManifest {
    /// Builds a manifest for `config` and `summary`, stamped with the current time.
    pub fn new(
        config: &RunConfig,
        summary: RunSummary,
        universe_hash: Option<String>,
        checkpoints: Vec<PathBuf>,
    ) -> Result<Self, CdtError> {
        Ok(Self {
            config_hash: config_hash(config)?,
            config: config.clone(),
            master_seed: config.seed_policy.master_seed,
            seed_label: config.seed_policy.label.clone(),
            universe_hash,
            summary,
            checkpoints,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), CdtError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CdtError::Io(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CdtError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            CdtError::Io(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, CdtError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CdtError::Io(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            CdtError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// SHA-256 of the YAML rendering of `config`, as lowercase hex.
pub fn config_hash(config: &RunConfig) -> Result<String, CdtError> {
    let yaml = config.to_yaml()?;
    let digest = Sha256::digest(yaml.as_bytes());
    Ok(digest.iter().map(|byte| format!("{:02x}", byte)).collect())
}
