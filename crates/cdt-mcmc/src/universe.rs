//! Combinatorial foliated complex with a classifier and move executor.
//!
//! Cells and timelike edges are opaque identifiers bucketed by class. Each
//! Pachner move changes those buckets by exactly its Table 1 delta; there is
//! no embedding and no geometric validity check.

use std::collections::BTreeSet;

use cdt_core::errors::ErrorInfo;
use cdt_core::{
    CdtError, EdgeClasses, Executed, Execution, MoveClassifier, MoveExecutor, MoveKind,
    RandomSource, RngHandle, SimplexClasses, SnapshotCardinalities, SnapshotOf, Universe,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a 3-simplex.
pub type CellId = u64;
/// Identifier of a timelike edge.
pub type EdgeId = u64;

/// Spacelike edges gained by a (2,6) move and lost by a (6,2) move.
pub const SPACELIKE_PER_VERTEX: u64 = 3;

/// Foliated triangulation reduced to its class buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoliatedUniverse {
    timeslices: u64,
    three_one: BTreeSet<CellId>,
    one_three: BTreeSet<CellId>,
    two_two: BTreeSet<CellId>,
    timelike: BTreeSet<EdgeId>,
    spacelike_edges: u64,
    next_id: u64,
}

impl Universe for FoliatedUniverse {
    type Cell = CellId;
    type Edge = EdgeId;
}

impl FoliatedUniverse {
    /// Builds a complex of roughly `simplices` cells over `timeslices` slices.
    ///
    /// Half of the cells are (2,2); the rest split evenly between (3,1) and
    /// (1,3). Every slice boundary carries at least one cell of each class.
    pub fn foliated(simplices: u64, timeslices: u64) -> Result<Self, CdtError> {
        if timeslices < 2 {
            return Err(CdtError::Config(
                ErrorInfo::new("too-few-timeslices", "a foliation needs at least two slices")
                    .with_context("timeslices", timeslices.to_string()),
            ));
        }
        let per_slice = simplices / timeslices;
        if per_slice < 4 {
            return Err(CdtError::Config(
                ErrorInfo::new("too-few-simplices", "not enough simplices per time slice")
                    .with_context("simplices", simplices.to_string())
                    .with_context("timeslices", timeslices.to_string())
                    .with_hint("use at least four simplices per slice"),
            ));
        }
        let quarter = per_slice / 4 * timeslices;
        let two_two = per_slice * timeslices - 2 * quarter;
        Ok(Self::from_cardinalities(
            timeslices,
            SnapshotCardinalities {
                three_one: quarter,
                one_three: quarter,
                two_two,
                timelike_edges: two_two / 2 + quarter,
                spacelike_edges: SPACELIKE_PER_VERTEX * quarter,
            },
        ))
    }

    /// Builds a complex with exactly the given bucket sizes.
    pub fn from_cardinalities(timeslices: u64, cards: SnapshotCardinalities) -> Self {
        let mut universe = Self {
            timeslices,
            three_one: BTreeSet::new(),
            one_three: BTreeSet::new(),
            two_two: BTreeSet::new(),
            timelike: BTreeSet::new(),
            spacelike_edges: cards.spacelike_edges,
            next_id: 0,
        };
        for _ in 0..cards.three_one {
            let id = universe.mint();
            universe.three_one.insert(id);
        }
        for _ in 0..cards.one_three {
            let id = universe.mint();
            universe.one_three.insert(id);
        }
        for _ in 0..cards.two_two {
            let id = universe.mint();
            universe.two_two.insert(id);
        }
        for _ in 0..cards.timelike_edges {
            let id = universe.mint();
            universe.timelike.insert(id);
        }
        universe
    }

    fn mint(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Number of time slices.
    pub fn timeslices(&self) -> u64 {
        self.timeslices
    }

    /// Current bucket sizes.
    pub fn cardinalities(&self) -> SnapshotCardinalities {
        SnapshotCardinalities {
            three_one: self.three_one.len() as u64,
            two_two: self.two_two.len() as u64,
            one_three: self.one_three.len() as u64,
            timelike_edges: self.timelike.len() as u64,
            spacelike_edges: self.spacelike_edges,
        }
    }

    /// SHA-256 over the bucket contents, as lowercase hex.
    pub fn canonical_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.timeslices.to_le_bytes());
        for bucket in [&self.three_one, &self.one_three, &self.two_two, &self.timelike] {
            hasher.update((bucket.len() as u64).to_le_bytes());
            for id in bucket {
                hasher.update(id.to_le_bytes());
            }
        }
        hasher.update(self.spacelike_edges.to_le_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }
}

/// Classifier reading the buckets of a [`FoliatedUniverse`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FoliatedClassifier;

impl MoveClassifier<FoliatedUniverse> for FoliatedClassifier {
    fn classify_simplices(
        &self,
        universe: &FoliatedUniverse,
    ) -> Result<SimplexClasses<CellId>, CdtError> {
        Ok(SimplexClasses {
            three_one: universe.three_one.iter().copied().collect(),
            two_two: universe.two_two.iter().copied().collect(),
            one_three: universe.one_three.iter().copied().collect(),
        })
    }

    fn classify_edges(&self, universe: &FoliatedUniverse) -> Result<EdgeClasses<EdgeId>, CdtError> {
        Ok(EdgeClasses {
            timelike: universe.timelike.iter().copied().collect(),
            spacelike_count: universe.spacelike_edges,
        })
    }
}

/// Executor realising each move as its bucket change.
///
/// Elements are drawn from the snapshot with the executor's own random
/// stream. An element that has since left the universe makes the attempt
/// infeasible, as does a removal that would leave fewer than two timelike
/// edges, one (2,2) cell or two cells of each of (3,1) and (1,3). Those floors
/// keep every count at least as large as any move can remove.
#[derive(Debug, Clone)]
pub struct FoliatedExecutor {
    rng: RngHandle,
    disabled: BTreeSet<MoveKind>,
}

impl FoliatedExecutor {
    /// Executor drawing elements from `rng`.
    pub fn new(rng: RngHandle) -> Self {
        Self {
            rng,
            disabled: BTreeSet::new(),
        }
    }

    /// Stops supporting `kind`.
    pub fn without(mut self, kind: MoveKind) -> Self {
        self.disabled.insert(kind);
        self
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        let index = self.rng.uniform_int(0, items.len() as u64 - 1);
        items.get(index as usize).copied()
    }

    fn two_three(
        &mut self,
        universe: &mut FoliatedUniverse,
        movable: &SnapshotOf<FoliatedUniverse>,
    ) -> Execution {
        match self.pick(&movable.simplices.two_two) {
            Some(cell) if universe.two_two.contains(&cell) => {
                let fresh = universe.mint();
                universe.two_two.insert(fresh);
                let edge = universe.mint();
                universe.timelike.insert(edge);
                Execution::Applied
            }
            _ => Execution::Infeasible,
        }
    }

    fn three_two(
        &mut self,
        universe: &mut FoliatedUniverse,
        movable: &SnapshotOf<FoliatedUniverse>,
    ) -> Execution {
        let edge = match self.pick(&movable.edges.timelike) {
            Some(edge) if universe.timelike.contains(&edge) => edge,
            _ => return Execution::Infeasible,
        };
        if universe.two_two.len() < 2 || universe.timelike.len() < 3 {
            return Execution::Infeasible;
        }
        universe.timelike.remove(&edge);
        universe.two_two.pop_last();
        Execution::Applied
    }

    fn two_six(
        &mut self,
        universe: &mut FoliatedUniverse,
        movable: &SnapshotOf<FoliatedUniverse>,
    ) -> Execution {
        match self.pick(&movable.simplices.one_three) {
            Some(cell) if universe.one_three.contains(&cell) && !universe.three_one.is_empty() => {
                for _ in 0..2 {
                    let upper = universe.mint();
                    universe.three_one.insert(upper);
                    let lower = universe.mint();
                    universe.one_three.insert(lower);
                    let edge = universe.mint();
                    universe.timelike.insert(edge);
                }
                universe.spacelike_edges += SPACELIKE_PER_VERTEX;
                Execution::Applied
            }
            _ => Execution::Infeasible,
        }
    }

    fn six_two(
        &mut self,
        universe: &mut FoliatedUniverse,
        movable: &SnapshotOf<FoliatedUniverse>,
    ) -> Execution {
        let Some(seed) = self.pick(&movable.simplices.three_one) else {
            return Execution::Infeasible;
        };
        if !universe.three_one.contains(&seed)
            || universe.three_one.len() < 4
            || universe.one_three.len() < 4
            || universe.timelike.len() < 4
            || universe.spacelike_edges < 2 * SPACELIKE_PER_VERTEX
        {
            return Execution::Infeasible;
        }
        universe.three_one.remove(&seed);
        universe.three_one.pop_last();
        for _ in 0..2 {
            universe.one_three.pop_last();
            universe.timelike.pop_last();
        }
        universe.spacelike_edges -= SPACELIKE_PER_VERTEX;
        Execution::Applied
    }

    fn four_four(
        &mut self,
        universe: &mut FoliatedUniverse,
        movable: &SnapshotOf<FoliatedUniverse>,
    ) -> Execution {
        let upper = self.pick(&movable.simplices.three_one);
        let lower = self.pick(&movable.simplices.one_three);
        match (upper, lower) {
            (Some(upper), Some(lower))
                if universe.three_one.contains(&upper) && universe.one_three.contains(&lower) =>
            {
                universe.three_one.remove(&upper);
                universe.one_three.remove(&lower);
                let upper = universe.mint();
                universe.three_one.insert(upper);
                let lower = universe.mint();
                universe.one_three.insert(lower);
                Execution::Applied
            }
            _ => Execution::Infeasible,
        }
    }
}

impl MoveExecutor<FoliatedUniverse> for FoliatedExecutor {
    fn supports(&self, kind: MoveKind) -> bool {
        !self.disabled.contains(&kind)
    }

    fn execute(
        &mut self,
        kind: MoveKind,
        mut universe: FoliatedUniverse,
        movable: &SnapshotOf<FoliatedUniverse>,
    ) -> Result<Executed<FoliatedUniverse>, CdtError> {
        if !self.supports(kind) {
            return Err(CdtError::Collaborator(
                ErrorInfo::new("unsupported-move", "executor asked to perform a disabled move")
                    .with_context("kind", kind.label()),
            ));
        }
        let execution = match kind {
            MoveKind::TwoThree => self.two_three(&mut universe, movable),
            MoveKind::ThreeTwo => self.three_two(&mut universe, movable),
            MoveKind::TwoSix => self.two_six(&mut universe, movable),
            MoveKind::SixTwo => self.six_two(&mut universe, movable),
            MoveKind::FourFour => self.four_four(&mut universe, movable),
        };
        Ok(Executed {
            universe,
            execution,
        })
    }
}
