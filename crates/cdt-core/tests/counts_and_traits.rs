use cdt_core::{
    ActionEvaluator, CdtError, ConfigurationCounts, Couplings, EdgeClasses, Executed, Execution,
    MoveClassifier, MoveExecutor, MoveKind, Precision, Real, SimplexClasses, SnapshotOf, Universe,
};
use proptest::prelude::*;

#[derive(Debug, Default)]
struct Tally {
    cells: Vec<u32>,
    edges: Vec<u32>,
}

impl Universe for Tally {
    type Cell = u32;
    type Edge = u32;
}

struct SplitClassifier;

impl MoveClassifier<Tally> for SplitClassifier {
    fn classify_simplices(&self, universe: &Tally) -> Result<SimplexClasses<u32>, CdtError> {
        let (two_two, rest): (Vec<u32>, Vec<u32>) =
            universe.cells.iter().copied().partition(|cell| *cell % 2 == 0);
        Ok(SimplexClasses {
            three_one: rest,
            two_two,
            one_three: Vec::new(),
        })
    }

    fn classify_edges(&self, universe: &Tally) -> Result<EdgeClasses<u32>, CdtError> {
        Ok(EdgeClasses {
            timelike: universe.edges.clone(),
            spacelike_count: 3,
        })
    }
}

struct NoopExecutor;

impl MoveExecutor<Tally> for NoopExecutor {
    fn supports(&self, kind: MoveKind) -> bool {
        kind != MoveKind::SixTwo
    }

    fn execute(
        &mut self,
        _kind: MoveKind,
        universe: Tally,
        _movable: &SnapshotOf<Tally>,
    ) -> Result<Executed<Tally>, CdtError> {
        Ok(Executed {
            universe,
            execution: Execution::Infeasible,
        })
    }
}

struct FlatAction;

impl ActionEvaluator for FlatAction {
    fn bulk_action(
        &self,
        counts: &ConfigurationCounts,
        _couplings: &Couplings,
        precision: Precision,
    ) -> Result<Real, CdtError> {
        Ok(precision.count(counts.total_simplices()))
    }
}

#[test]
fn snapshot_counts_follow_cardinalities() {
    let universe = Tally {
        cells: vec![1, 2, 3, 4, 5],
        edges: vec![10, 11],
    };
    let snapshot = SplitClassifier.snapshot(&universe).unwrap();
    assert_eq!(snapshot.counts(), ConfigurationCounts::new(2, 3, 2));
    let cards = snapshot.cardinalities();
    assert_eq!(cards.spacelike_edges, 3);
    assert_eq!(cards.one_three, 0);
}

#[test]
fn executor_defaults_and_overrides_compile() {
    let mut executor = NoopExecutor;
    assert!(executor.supports(MoveKind::TwoThree));
    assert!(!executor.supports(MoveKind::SixTwo));
    let universe = Tally::default();
    let snapshot = SplitClassifier.snapshot(&universe).unwrap();
    let executed = executor
        .execute(MoveKind::TwoThree, universe, &snapshot)
        .unwrap();
    assert_eq!(executed.execution, Execution::Infeasible);
}

#[test]
fn evaluator_by_reference() {
    let evaluator = FlatAction;
    let by_ref: &dyn ActionEvaluator = &evaluator;
    let couplings = Couplings::new(1.0, 1.0, 1.0).unwrap();
    let value = by_ref
        .bulk_action(
            &ConfigurationCounts::new(1, 2, 3),
            &couplings,
            Precision::default(),
        )
        .unwrap();
    assert_eq!(value, Precision::default().count(5));
}

#[test]
fn couplings_reject_non_finite_values() {
    assert!(Couplings::new(f64::NAN, 1.0, 1.0).is_err());
    assert!(Couplings::new(1.0, f64::INFINITY, 1.0).is_err());
    assert!(Couplings::new(-1.0, 0.0, -3.5).is_ok());
}

#[test]
fn underflowing_delta_is_an_error() {
    let counts = ConfigurationCounts::new(1, 3, 0);
    let err = counts.apply(MoveKind::SixTwo.delta()).unwrap_err();
    assert_eq!(err.info().code, "count-underflow");
}

proptest! {
    #[test]
    fn delta_then_inverse_restores_counts(
        timelike in 2u64..1_000_000,
        three_one in 4u64..1_000_000,
        two_two in 1u64..1_000_000,
        pick in 0usize..5,
    ) {
        let counts = ConfigurationCounts::new(timelike, three_one, two_two);
        let kind = MoveKind::ALL[pick];
        let forward = counts.apply(kind.delta()).unwrap();
        let back = forward.apply(kind.inverse().delta()).unwrap();
        prop_assert_eq!(back, counts);
    }
}
