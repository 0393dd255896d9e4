use std::sync::atomic::{AtomicUsize, Ordering};

use cdt_core::precision::to_f64;
use cdt_core::{
    ActionEvaluator, CdtError, ConfigurationCounts, Couplings, MoveClassifier, MoveKind, Precision,
    RandomSource, Real, RngHandle, SnapshotCardinalities,
};
use cdt_mcmc::{
    AcceptanceEngine, AttemptBudget, FoliatedClassifier, FoliatedExecutor, FoliatedUniverse,
    Metropolis, MoveOutcome, NullSink, S3BulkAction, SimulationParameters,
};

struct Scripted {
    draws: Vec<f64>,
    next: usize,
}

impl Scripted {
    fn new(draws: &[f64]) -> Self {
        Self {
            draws: draws.to_vec(),
            next: 0,
        }
    }
}

impl RandomSource for Scripted {
    fn uniform01(&mut self) -> f64 {
        let draw = self.draws[self.next % self.draws.len()];
        self.next += 1;
        draw
    }

    fn uniform_int(&mut self, lo: u64, _hi: u64) -> u64 {
        lo
    }
}

#[derive(Default)]
struct CountingAction {
    calls: AtomicUsize,
}

impl ActionEvaluator for CountingAction {
    fn bulk_action(
        &self,
        counts: &ConfigurationCounts,
        couplings: &Couplings,
        precision: Precision,
    ) -> Result<Real, CdtError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        S3BulkAction::default().bulk_action(counts, couplings, precision)
    }
}

struct PanickingAction;

impl ActionEvaluator for PanickingAction {
    fn bulk_action(
        &self,
        _counts: &ConfigurationCounts,
        _couplings: &Couplings,
        _precision: Precision,
    ) -> Result<Real, CdtError> {
        panic!("the action must not be evaluated");
    }
}

fn ten_movable() -> FoliatedUniverse {
    FoliatedUniverse::from_cardinalities(
        2,
        SnapshotCardinalities {
            three_one: 6,
            one_three: 6,
            two_two: 10,
            timelike_edges: 10,
            spacelike_edges: 18,
        },
    )
}

fn unit_couplings() -> Couplings {
    Couplings::new(1.0, 1.0, 1.0).unwrap()
}

fn seeded<A: ActionEvaluator>(
    engine: &mut AcceptanceEngine<A>,
    executor: &mut FoliatedExecutor,
) -> FoliatedUniverse {
    let mut universe = ten_movable();
    let movable = FoliatedClassifier.snapshot(&universe).unwrap();
    engine.begin(movable.counts());
    for kind in MoveKind::SEEDED {
        universe = engine
            .seed_move(kind, universe, &movable, executor)
            .unwrap()
            .universe;
    }
    universe
}

#[test]
fn seeding_with_ten_movable_simplices() {
    let params = SimulationParameters::new(1.0, 1.0, 1.0, 1, 0).unwrap();
    let mut driver = Metropolis::new(
        params,
        Precision::default(),
        FoliatedClassifier,
        FoliatedExecutor::new(RngHandle::from_seed(1)),
        S3BulkAction::default(),
        RngHandle::from_seed(2),
    )
    .with_budget(AttemptBudget::Fixed { attempts: 0 });

    let universe = driver.run(ten_movable(), &mut NullSink).unwrap();

    for kind in MoveKind::SEEDED {
        assert_eq!(driver.attempted(kind), 1, "{kind}");
        assert_eq!(driver.successful(kind), 1, "{kind}");
    }
    assert_eq!(driver.attempted(MoveKind::SixTwo), 0);
    assert_eq!(driver.attempted(MoveKind::FourFour), 0);
    assert_eq!(driver.total_attempted(), 3);
    assert_eq!(driver.counts(), ConfigurationCounts::new(12, 16, 10));
    let classified = FoliatedClassifier.snapshot(&universe).unwrap().counts();
    assert_eq!(classified, driver.counts());
}

#[test]
fn forced_rejection_of_three_two() {
    let mut engine = AcceptanceEngine::new(
        S3BulkAction::default(),
        unit_couplings(),
        Precision::default(),
    );
    let mut executor = FoliatedExecutor::new(RngHandle::from_seed(4));
    let universe = seeded(&mut engine, &mut executor);
    let counts = engine.counts();
    let movable = FoliatedClassifier.snapshot(&universe).unwrap();

    let attempt = engine
        .attempt_move(
            MoveKind::ThreeTwo,
            universe,
            &movable,
            &mut executor,
            &mut Scripted::new(&[0.999_999]),
        )
        .unwrap();

    assert_eq!(attempt.record.outcome, MoveOutcome::Rejected);
    assert_eq!(engine.statistics().attempted(MoveKind::ThreeTwo), 2);
    assert_eq!(engine.statistics().successful(MoveKind::ThreeTwo), 1);
    assert_eq!(engine.counts(), counts);
    assert_eq!(
        FoliatedClassifier.snapshot(&attempt.universe).unwrap().counts(),
        counts
    );
}

#[test]
fn four_four_never_consults_the_action() {
    let mut engine =
        AcceptanceEngine::new(PanickingAction, unit_couplings(), Precision::default());
    let mut executor = FoliatedExecutor::new(RngHandle::from_seed(5));
    let universe = seeded(&mut engine, &mut executor);
    let movable = FoliatedClassifier.snapshot(&universe).unwrap();

    let a2 = engine.dynamical_ratio(MoveKind::FourFour).unwrap();
    assert_eq!(to_f64(&a2), 1.0);

    let attempt = engine
        .attempt_move(
            MoveKind::FourFour,
            universe,
            &movable,
            &mut executor,
            &mut Scripted::new(&[0.5]),
        )
        .unwrap();
    assert_eq!(attempt.record.a2, 1.0);
    assert_eq!(attempt.record.a1, 0.0);
    assert_eq!(attempt.record.outcome, MoveOutcome::Rejected);
    assert_eq!(engine.statistics().attempted(MoveKind::FourFour), 1);
}

#[test]
fn four_four_skips_the_evaluator_while_others_use_it() {
    let action = CountingAction::default();
    let engine = AcceptanceEngine::new(&action, unit_couplings(), Precision::default());
    engine.dynamical_ratio(MoveKind::FourFour).unwrap();
    assert_eq!(action.calls.load(Ordering::SeqCst), 0);
    engine.dynamical_ratio(MoveKind::TwoThree).unwrap();
    assert_eq!(action.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn accepted_moves_carry_their_table_delta() {
    let mut engine = AcceptanceEngine::new(
        S3BulkAction::default(),
        unit_couplings(),
        Precision::default(),
    );
    let mut executor = FoliatedExecutor::new(RngHandle::from_seed(6));
    let mut universe = seeded(&mut engine, &mut executor);
    let mut rng = Scripted::new(&[0.0]);
    for kind in [
        MoveKind::TwoThree,
        MoveKind::ThreeTwo,
        MoveKind::TwoSix,
        MoveKind::FourFour,
    ] {
        let before = engine.counts();
        let movable = FoliatedClassifier.snapshot(&universe).unwrap();
        let attempt = engine
            .attempt_move(kind, universe, &movable, &mut executor, &mut rng)
            .unwrap();
        universe = attempt.universe;
        assert_eq!(attempt.record.outcome, MoveOutcome::Accepted, "{kind}");
        assert_eq!(engine.counts(), before.apply(kind.delta()).unwrap(), "{kind}");
    }
}

#[test]
fn unsupported_kind_is_recorded_but_not_applied() {
    let mut engine = AcceptanceEngine::new(
        S3BulkAction::default(),
        unit_couplings(),
        Precision::default(),
    );
    let mut executor = FoliatedExecutor::new(RngHandle::from_seed(7)).without(MoveKind::SixTwo);
    let universe = seeded(&mut engine, &mut executor);
    let counts = engine.counts();
    let movable = FoliatedClassifier.snapshot(&universe).unwrap();

    let attempt = engine
        .attempt_move(
            MoveKind::SixTwo,
            universe,
            &movable,
            &mut executor,
            &mut Scripted::new(&[0.0]),
        )
        .unwrap();
    assert_eq!(attempt.record.outcome, MoveOutcome::Unsupported);
    assert_eq!(attempt.record.trial, None);
    assert_eq!(engine.statistics().attempted(MoveKind::SixTwo), 1);
    assert_eq!(engine.statistics().successful(MoveKind::SixTwo), 0);
    assert_eq!(engine.counts(), counts);
}
