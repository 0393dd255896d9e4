use std::fs;
use std::path::{Path, PathBuf};

use cdt_core::errors::ErrorInfo;
use cdt_core::{CdtError, ConfigurationCounts, Couplings, Precision, DEFAULT_PRECISION_BITS};
use serde::{Deserialize, Serialize};

use crate::action::ActionFormula;

/// Validated physical and scheduling parameters of a run.
///
/// Immutable once built; the kernel only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    couplings: Couplings,
    passes: usize,
    checkpoint_interval: usize,
}

impl SimulationParameters {
    /// Validates and builds the parameter set.
    ///
    /// Couplings must be finite and `passes` positive. A zero
    /// `checkpoint_interval` disables periodic reporting.
    pub fn new(
        alpha: f64,
        k: f64,
        lambda: f64,
        passes: usize,
        checkpoint_interval: usize,
    ) -> Result<Self, CdtError> {
        let couplings = Couplings::new(alpha, k, lambda)?;
        if passes == 0 {
            return Err(CdtError::Config(
                ErrorInfo::new("zero-passes", "a run needs at least one pass")
                    .with_hint("set `passes` to a positive value"),
            ));
        }
        Ok(Self {
            couplings,
            passes,
            checkpoint_interval,
        })
    }

    /// Coupling constants.
    pub fn couplings(&self) -> &Couplings {
        &self.couplings
    }

    /// Timelike edge length squared.
    pub fn alpha(&self) -> f64 {
        self.couplings.alpha
    }

    /// Inverse Newton coupling.
    pub fn k(&self) -> f64 {
        self.couplings.k
    }

    /// Cosmological coupling.
    pub fn lambda(&self) -> f64 {
        self.couplings.lambda
    }

    /// Number of passes.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Passes between checkpoint reports; zero means never.
    pub fn checkpoint_interval(&self) -> usize {
        self.checkpoint_interval
    }

    /// Whether a report is due after the 1-based `pass`.
    pub fn checkpoint_due(&self, pass: usize) -> bool {
        self.checkpoint_interval > 0 && pass % self.checkpoint_interval == 0
    }
}

/// YAML-configurable parameters governing a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timelike edge length squared.
    #[serde(default = "default_coupling")]
    pub alpha: f64,
    /// Inverse Newton coupling.
    #[serde(default = "default_coupling")]
    pub k: f64,
    /// Cosmological coupling.
    #[serde(default = "default_coupling")]
    pub lambda: f64,
    /// Bulk action expression.
    #[serde(default)]
    pub action: ActionFormula,
    /// Number of passes to execute.
    #[serde(default = "default_passes")]
    pub passes: usize,
    /// Number of move attempts per pass.
    #[serde(default)]
    pub budget: AttemptBudget,
    /// When the movable-element snapshot is rebuilt.
    #[serde(default)]
    pub snapshot_refresh: SnapshotRefresh,
    /// Working precision for ratios and actions, in bits.
    #[serde(default = "default_precision_bits")]
    pub precision_bits: usize,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Speculative batch evaluation.
    #[serde(default)]
    pub parallel: ParallelConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Initial foliated universe used by the shipped executor.
    #[serde(default)]
    pub universe: UniverseConfig,
}

fn default_coupling() -> f64 {
    1.0
}

fn default_passes() -> usize {
    100
}

fn default_precision_bits() -> usize {
    DEFAULT_PRECISION_BITS
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            alpha: default_coupling(),
            k: default_coupling(),
            lambda: default_coupling(),
            action: ActionFormula::default(),
            passes: default_passes(),
            budget: AttemptBudget::default(),
            snapshot_refresh: SnapshotRefresh::default(),
            precision_bits: default_precision_bits(),
            checkpoint: CheckpointConfig::default(),
            parallel: ParallelConfig::default(),
            seed_policy: SeedPolicy::default(),
            universe: UniverseConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(source: &str) -> Result<Self, CdtError> {
        serde_yaml::from_str(source).map_err(|err| {
            CdtError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Loads a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, CdtError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CdtError::Io(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, CdtError> {
        serde_yaml::to_string(self)
            .map_err(|err| CdtError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Validated simulation parameters.
    pub fn parameters(&self) -> Result<SimulationParameters, CdtError> {
        SimulationParameters::new(
            self.alpha,
            self.k,
            self.lambda,
            self.passes,
            self.checkpoint.interval,
        )
    }

    /// Validated working precision.
    pub fn precision(&self) -> Result<Precision, CdtError> {
        Precision::new(self.precision_bits)
    }
}

/// Attempt budget per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AttemptBudget {
    /// One attempt per simplex, N3_31 + N3_22 read at the start of each pass.
    Simplices,
    /// A constant number of attempts per pass.
    Fixed {
        /// Attempts per pass.
        attempts: u64,
    },
}

impl Default for AttemptBudget {
    fn default() -> Self {
        AttemptBudget::Simplices
    }
}

impl AttemptBudget {
    /// Attempts to make in a pass that starts from `counts`.
    pub fn attempts(&self, counts: &ConfigurationCounts) -> u64 {
        match self {
            AttemptBudget::Simplices => counts.total_simplices(),
            AttemptBudget::Fixed { attempts } => *attempts,
        }
    }
}

/// Refresh policy for the movable-element snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotRefresh {
    /// Classify once at the start of the run and never again.
    Once,
    /// Reclassify at the start of every pass.
    EveryPass,
    /// Reclassify after every move that changed the universe.
    #[default]
    EveryAccept,
}

/// Checkpointing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in passes between checkpoint reports (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Directory where checkpoints are stored. Relative paths resolved from CLI working dir.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            directory: None,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Speculative batch evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Proposals evaluated together; 1 keeps the strictly sequential driver.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    1
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Free-form run label copied into the manifest; it does not affect seeding.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Size of the initial foliated universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Target number of simplices.
    #[serde(default = "default_simplices")]
    pub simplices: u64,
    /// Number of time slices.
    #[serde(default = "default_timeslices")]
    pub timeslices: u64,
}

fn default_simplices() -> u64 {
    6400
}

fn default_timeslices() -> u64 {
    16
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            simplices: default_simplices(),
            timeslices: default_timeslices(),
        }
    }
}
