#![deny(missing_docs)]

//! Metropolis-Hastings acceptance engine and pass driver for causal dynamical
//! triangulations, with the S3 bulk action and a foliated reference universe.

/// Acceptance ratios, decisions and the atomic commit path.
pub mod acceptance;
/// Discretised S3 bulk action.
pub mod action;
/// Checkpoint reports and sinks.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Pass driver and public `run` entry point.
pub mod kernel;
/// Run manifest serialization helpers.
pub mod manifest;
/// Speculative parallel evaluation of dynamical ratios.
mod speculative;
/// Per-kind move statistics.
pub mod stats;
/// Foliated reference universe, classifier and executor.
pub mod universe;

pub use acceptance::{AcceptanceEngine, Attempt, Failure, MoveOutcome, ProposalRecord};
pub use action::{ActionFormula, S3BulkAction};
pub use checkpoint::{CheckpointReport, CheckpointSink, JsonCheckpointSink, NullSink};
pub use config::{
    AttemptBudget, CheckpointConfig, ParallelConfig, RunConfig, SeedPolicy, SimulationParameters,
    SnapshotRefresh, UniverseConfig,
};
pub use kernel::{run, CancelToken, Metropolis, RunOutput, RunSummary};
pub use manifest::RunManifest;
pub use stats::{KindStatistics, MoveStatistics};
pub use universe::{FoliatedClassifier, FoliatedExecutor, FoliatedUniverse};
