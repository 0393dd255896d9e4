#![deny(missing_docs)]
#![doc = "Core traits and data types for the CDT Metropolis engine: move kinds, counts, errors, randomness and the collaborator contracts."]

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod moves;
pub mod precision;
pub mod rng;
mod types;

pub use errors::{CdtError, ErrorInfo};
pub use moves::{CountDelta, MoveKind, MOVE_DELTAS};
pub use precision::{Precision, Real, DEFAULT_PRECISION_BITS};
pub use rng::{derive_substream_seed, RandomSource, RngHandle};
pub use types::{ConfigurationCounts, Couplings};

/// Owned triangulation handle driven by the engine.
///
/// The handle is moved into a run and moved back out; it names the cell and
/// edge handle types the classifier hands to the executor.
pub trait Universe {
    /// Handle to a 3-simplex.
    type Cell: Clone + Debug + Send + Sync;
    /// Handle to an edge.
    type Edge: Clone + Debug + Send + Sync;
}

/// Simplices grouped by how their vertices straddle two adjacent time slices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplexClasses<C> {
    /// (3,1) simplices.
    pub three_one: Vec<C>,
    /// (2,2) simplices.
    pub two_two: Vec<C>,
    /// (1,3) simplices.
    pub one_three: Vec<C>,
}

impl<C> Default for SimplexClasses<C> {
    fn default() -> Self {
        Self {
            three_one: Vec::new(),
            two_two: Vec::new(),
            one_three: Vec::new(),
        }
    }
}

/// Timelike edges plus the number of spacelike edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeClasses<E> {
    /// Edges joining adjacent time slices.
    pub timelike: Vec<E>,
    /// Number of edges lying within a time slice.
    pub spacelike_count: u64,
}

impl<E> Default for EdgeClasses<E> {
    fn default() -> Self {
        Self {
            timelike: Vec::new(),
            spacelike_count: 0,
        }
    }
}

/// Cached view of the elements currently eligible for each move kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovableSnapshot<C, E> {
    /// Classified simplices.
    pub simplices: SimplexClasses<C>,
    /// Classified edges.
    pub edges: EdgeClasses<E>,
}

impl<C, E> Default for MovableSnapshot<C, E> {
    fn default() -> Self {
        Self {
            simplices: SimplexClasses::default(),
            edges: EdgeClasses::default(),
        }
    }
}

/// Snapshot type matching a given [`Universe`].
pub type SnapshotOf<U> = MovableSnapshot<<U as Universe>::Cell, <U as Universe>::Edge>;

impl<C, E> MovableSnapshot<C, E> {
    /// Counts implied by the snapshot's cardinalities.
    pub fn counts(&self) -> ConfigurationCounts {
        ConfigurationCounts {
            timelike_edges: self.edges.timelike.len() as u64,
            three_one: (self.simplices.three_one.len() + self.simplices.one_three.len()) as u64,
            two_two: self.simplices.two_two.len() as u64,
        }
    }

    /// Sizes of each eligible set, for reporting.
    pub fn cardinalities(&self) -> SnapshotCardinalities {
        SnapshotCardinalities {
            three_one: self.simplices.three_one.len() as u64,
            two_two: self.simplices.two_two.len() as u64,
            one_three: self.simplices.one_three.len() as u64,
            timelike_edges: self.edges.timelike.len() as u64,
            spacelike_edges: self.edges.spacelike_count,
        }
    }
}

/// Cardinalities of a [`MovableSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotCardinalities {
    /// Movable (3,1) simplices.
    pub three_one: u64,
    /// Movable (2,2) simplices.
    pub two_two: u64,
    /// Movable (1,3) simplices.
    pub one_three: u64,
    /// Movable timelike edges.
    pub timelike_edges: u64,
    /// Spacelike edges.
    pub spacelike_edges: u64,
}

/// Classifies a triangulation into move-eligible subsets.
pub trait MoveClassifier<U: Universe> {
    /// Groups the simplices of `universe` by type.
    fn classify_simplices(&self, universe: &U) -> Result<SimplexClasses<U::Cell>, CdtError>;

    /// Collects timelike edges and counts spacelike ones.
    fn classify_edges(&self, universe: &U) -> Result<EdgeClasses<U::Edge>, CdtError>;

    /// Runs both classifications.
    fn snapshot(&self, universe: &U) -> Result<SnapshotOf<U>, CdtError> {
        Ok(MovableSnapshot {
            simplices: self.classify_simplices(universe)?,
            edges: self.classify_edges(universe)?,
        })
    }
}

/// Whether an executor managed to realise a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Execution {
    /// The move was performed and the universe changed by the kind's delta.
    Applied,
    /// No eligible element admitted the move; the universe is unchanged.
    Infeasible,
}

/// Universe handed back by an executor together with what happened.
#[derive(Debug)]
pub struct Executed<U> {
    /// The universe after the attempt.
    pub universe: U,
    /// Whether the move took place.
    pub execution: Execution,
}

/// Performs Pachner moves on an owned triangulation.
pub trait MoveExecutor<U: Universe> {
    /// Whether this executor can perform `kind` at all.
    fn supports(&self, kind: MoveKind) -> bool {
        let _ = kind;
        true
    }

    /// Performs one move of `kind` using the eligible elements in `movable`.
    ///
    /// An `Err` means the universe could not be handed back in a valid state.
    fn execute(
        &mut self,
        kind: MoveKind,
        universe: U,
        movable: &SnapshotOf<U>,
    ) -> Result<Executed<U>, CdtError>;
}

/// Evaluates the discretised bulk action for a configuration.
pub trait ActionEvaluator {
    /// Action for `counts` under `couplings`, computed at `precision`.
    fn bulk_action(
        &self,
        counts: &ConfigurationCounts,
        couplings: &Couplings,
        precision: Precision,
    ) -> Result<Real, CdtError>;
}

impl<T: ActionEvaluator + ?Sized> ActionEvaluator for &T {
    fn bulk_action(
        &self,
        counts: &ConfigurationCounts,
        couplings: &Couplings,
        precision: Precision,
    ) -> Result<Real, CdtError> {
        (**self).bulk_action(counts, couplings, precision)
    }
}
