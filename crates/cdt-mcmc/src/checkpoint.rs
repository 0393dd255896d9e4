use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cdt_core::errors::ErrorInfo;
use cdt_core::{CdtError, ConfigurationCounts, SnapshotCardinalities};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::stats::{KindStatistics, MoveStatistics};

/// Progress report handed to a [`CheckpointSink`] after a due pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointReport {
    /// 1-based pass just completed.
    pub pass: usize,
    /// Tracked counts at the end of the pass.
    pub counts: ConfigurationCounts,
    /// Per-kind statistics keyed by move label.
    pub statistics: BTreeMap<String, KindStatistics>,
    /// Total attempts so far.
    pub total_attempted: u64,
    /// Cardinalities of the movable-element snapshot.
    pub cardinalities: SnapshotCardinalities,
}

impl CheckpointReport {
    /// Builds a report from the engine's live state.
    pub fn new(
        pass: usize,
        counts: ConfigurationCounts,
        statistics: &MoveStatistics,
        cardinalities: SnapshotCardinalities,
    ) -> Self {
        Self {
            pass,
            counts,
            statistics: statistics.by_kind(),
            total_attempted: statistics.total_attempted(),
            cardinalities,
        }
    }

    /// Restores a report from disk.
    pub fn load(path: &Path) -> Result<Self, CdtError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CdtError::Io(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            CdtError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Writes the report to disk.
    pub fn store(&self, path: &Path) -> Result<(), CdtError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                CdtError::Io(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CdtError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            CdtError::Io(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Receives periodic progress reports from the pass driver.
pub trait CheckpointSink {
    /// Called after every due pass.
    fn report(&mut self, report: &CheckpointReport) -> Result<(), CdtError>;
}

/// Sink that discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CheckpointSink for NullSink {
    fn report(&mut self, _report: &CheckpointReport) -> Result<(), CdtError> {
        Ok(())
    }
}

impl CheckpointSink for Vec<CheckpointReport> {
    fn report(&mut self, report: &CheckpointReport) -> Result<(), CdtError> {
        self.push(report.clone());
        Ok(())
    }
}

/// Writes each report as pretty JSON into a directory, keeping the newest few.
#[derive(Debug, Clone)]
pub struct JsonCheckpointSink {
    directory: PathBuf,
    max_to_keep: usize,
    written: Vec<PathBuf>,
}

impl JsonCheckpointSink {
    /// Sink writing into `directory`; `max_to_keep == 0` keeps everything.
    pub fn new(directory: impl Into<PathBuf>, max_to_keep: usize) -> Self {
        Self {
            directory: directory.into(),
            max_to_keep,
            written: Vec::new(),
        }
    }

    /// Checkpoint files currently on disk, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn enforce_retention(&mut self) -> Result<(), CdtError> {
        if self.max_to_keep == 0 {
            return Ok(());
        }
        while self.written.len() > self.max_to_keep {
            let path = self.written.remove(0);
            if path.exists() {
                fs::remove_file(&path).map_err(|err| {
                    CdtError::Io(
                        ErrorInfo::new("checkpoint-prune", err.to_string())
                            .with_context("path", path.display().to_string()),
                    )
                })?;
            }
        }
        Ok(())
    }
}

impl CheckpointSink for JsonCheckpointSink {
    fn report(&mut self, report: &CheckpointReport) -> Result<(), CdtError> {
        let path = checkpoint_path(&self.directory, report.pass);
        report.store(&path)?;
        info!(pass = report.pass, path = %path.display(), "checkpoint written");
        self.written.push(path);
        self.enforce_retention()
    }
}

/// Deterministic checkpoint file name for `pass`.
pub fn checkpoint_path(root: &Path, pass: usize) -> PathBuf {
    root.join(format!("ckpt_{pass:05}.json"))
}
