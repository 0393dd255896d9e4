//! Metropolis-Hastings acceptance: ratio computation, the accept/reject
//! decision and the atomic commit of count deltas and statistics.

use std::fmt;

use cdt_core::errors::ErrorInfo;
use cdt_core::precision::to_f64;
use cdt_core::{
    ActionEvaluator, CdtError, ConfigurationCounts, Couplings, Executed, Execution, MoveExecutor,
    MoveKind, Precision, RandomSource, Real, SnapshotOf, Universe,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::stats::MoveStatistics;

/// How a single proposal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveOutcome {
    /// The draw passed and the executor applied the move.
    Accepted,
    /// The draw exceeded the acceptance probability.
    Rejected,
    /// The draw passed but no eligible element admitted the move.
    Infeasible,
    /// The executor cannot perform this kind.
    Unsupported,
}

impl MoveOutcome {
    /// Whether the universe and counts changed.
    pub fn is_accepted(self) -> bool {
        matches!(self, MoveOutcome::Accepted)
    }
}

/// Diagnostic record of one proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    /// Move kind proposed.
    pub kind: MoveKind,
    /// Uniform draw compared against the probability; absent when nothing was drawn.
    pub trial: Option<f64>,
    /// Combinatorial ratio, rounded for reporting.
    pub a1: f64,
    /// Dynamical ratio, rounded for reporting.
    pub a2: f64,
    /// `a1 * a2`, rounded for reporting.
    pub probability: f64,
    /// Final outcome.
    pub outcome: MoveOutcome,
}

impl ProposalRecord {
    fn untried(kind: MoveKind, outcome: MoveOutcome) -> Self {
        Self {
            kind,
            trial: None,
            a1: 0.0,
            a2: 0.0,
            probability: 0.0,
            outcome,
        }
    }
}

/// Universe handed back after an attempt, with what happened to it.
#[derive(Debug)]
pub struct Attempt<U> {
    /// The universe after the attempt.
    pub universe: U,
    /// Diagnostic record.
    pub record: ProposalRecord,
}

/// Error raised while the engine or driver held the triangulation.
///
/// The triangulation comes back whenever it was still owned when the error
/// surfaced; it is `None` only if an executor consumed it or it was never
/// built.
#[derive(Debug)]
pub struct Failure<U> {
    /// What went wrong.
    pub error: CdtError,
    /// The triangulation as it stood when the error surfaced.
    pub universe: Option<U>,
}

impl<U> Failure<U> {
    /// Failure that hands `universe` back.
    pub fn kept(error: CdtError, universe: U) -> Self {
        Self {
            error,
            universe: Some(universe),
        }
    }

    /// Failure after the triangulation was lost.
    pub fn lost(error: CdtError) -> Self {
        Self {
            error,
            universe: None,
        }
    }

    /// Rewrites the error, keeping the triangulation.
    pub fn map_error(self, f: impl FnOnce(CdtError) -> CdtError) -> Self {
        Self {
            error: f(self.error),
            universe: self.universe,
        }
    }

    /// Splits into the error and the triangulation.
    pub fn into_parts(self) -> (CdtError, Option<U>) {
        (self.error, self.universe)
    }
}

impl<U> From<CdtError> for Failure<U> {
    fn from(error: CdtError) -> Self {
        Self::lost(error)
    }
}

impl<U> fmt::Display for Failure<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<U: fmt::Debug> std::error::Error for Failure<U> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Acceptance engine owning the tracked counts and move statistics.
///
/// During a run, counts and statistics change together in a single commit
/// step after each decision.
#[derive(Debug, Clone)]
pub struct AcceptanceEngine<A> {
    evaluator: A,
    couplings: Couplings,
    precision: Precision,
    counts: ConfigurationCounts,
    statistics: MoveStatistics,
}

impl<A: ActionEvaluator> AcceptanceEngine<A> {
    /// Creates an engine with zero counts and statistics.
    pub fn new(evaluator: A, couplings: Couplings, precision: Precision) -> Self {
        Self {
            evaluator,
            couplings,
            precision,
            counts: ConfigurationCounts::default(),
            statistics: MoveStatistics::new(),
        }
    }

    /// Resets statistics and installs counts derived from a fresh classification.
    pub fn begin(&mut self, counts: ConfigurationCounts) {
        self.counts = counts;
        self.statistics = MoveStatistics::new();
    }

    /// Installs counts and statistics taken from an earlier run.
    pub fn restore(&mut self, counts: ConfigurationCounts, statistics: MoveStatistics) {
        self.counts = counts;
        self.statistics = statistics;
    }

    /// Tracked counts.
    pub fn counts(&self) -> ConfigurationCounts {
        self.counts
    }

    /// Accumulated statistics.
    pub fn statistics(&self) -> &MoveStatistics {
        &self.statistics
    }

    /// Working precision.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Coupling constants.
    pub fn couplings(&self) -> &Couplings {
        &self.couplings
    }

    /// Action evaluator.
    pub fn evaluator(&self) -> &A {
        &self.evaluator
    }

    /// `attempted[kind] / total_attempted`.
    pub fn combinatorial_ratio(&self, kind: MoveKind) -> Result<Real, CdtError> {
        let total = self.statistics.total_attempted();
        if total == 0 {
            return Err(CdtError::Precondition(
                ErrorInfo::new("unseeded-ratio", "combinatorial ratio requested before seeding")
                    .with_context("kind", kind.label()),
            ));
        }
        self.precision.ratio(self.statistics.attempted(kind), total)
    }

    /// `min(1, exp(S(counts + delta) - S(counts)))` at the tracked counts.
    pub fn dynamical_ratio(&self, kind: MoveKind) -> Result<Real, CdtError> {
        self.dynamical_ratio_at(&self.counts, kind)
    }

    /// Dynamical ratio evaluated against arbitrary `counts`.
    ///
    /// `FourFour` is exactly one and never consults the evaluator.
    pub fn dynamical_ratio_at(
        &self,
        counts: &ConfigurationCounts,
        kind: MoveKind,
    ) -> Result<Real, CdtError> {
        let delta = kind.delta();
        if delta.is_zero() {
            return Ok(Real::ONE);
        }
        let proposed = counts
            .apply(delta)
            .map_err(|err| err.with_context("kind", kind.label()))?;
        let current_action = self.action(counts, kind)?;
        let proposed_action = self.action(&proposed, kind)?;
        self.precision
            .exp_non_positive(&(proposed_action - current_action))
            .map_err(|err| err.with_context("kind", kind.label()))
    }

    fn action(&self, counts: &ConfigurationCounts, kind: MoveKind) -> Result<Real, CdtError> {
        self.evaluator
            .bulk_action(counts, &self.couplings, self.precision)
            .map_err(|err| {
                err.with_context("collaborator", "action-evaluator")
                    .with_context("kind", kind.label())
            })
    }

    /// Performs one Metropolis-Hastings attempt of `kind`.
    ///
    /// Errors raised before the executor runs hand the universe back.
    pub fn attempt_move<U, X, R>(
        &mut self,
        kind: MoveKind,
        universe: U,
        movable: &SnapshotOf<U>,
        executor: &mut X,
        rng: &mut R,
    ) -> Result<Attempt<U>, Failure<U>>
    where
        U: Universe,
        X: MoveExecutor<U> + ?Sized,
        R: RandomSource + ?Sized,
    {
        if !executor.supports(kind) {
            return Ok(self.unsupported(kind, universe));
        }
        let trial = rng.uniform01();
        let a2 = match self.dynamical_ratio(kind) {
            Ok(a2) => a2,
            Err(err) => return Err(Failure::kept(err, universe)),
        };
        self.resolve(kind, trial, a2, universe, movable, executor)
    }

    /// Records an attempt of a kind the executor cannot perform.
    pub(crate) fn unsupported<U>(&mut self, kind: MoveKind, universe: U) -> Attempt<U> {
        warn!(kind = kind.label(), "executor does not support move kind");
        self.statistics.record(kind, false);
        Attempt {
            universe,
            record: ProposalRecord::untried(kind, MoveOutcome::Unsupported),
        }
    }

    /// Decides and commits a proposal whose draw and dynamical ratio are known.
    ///
    /// The combinatorial ratio is always read from the live statistics.
    pub(crate) fn resolve<U, X>(
        &mut self,
        kind: MoveKind,
        trial: f64,
        a2: Real,
        universe: U,
        movable: &SnapshotOf<U>,
        executor: &mut X,
    ) -> Result<Attempt<U>, Failure<U>>
    where
        U: Universe,
        X: MoveExecutor<U> + ?Sized,
    {
        let (a1, probability, passed) = match self.decide(kind, trial, &a2) {
            Ok(decision) => decision,
            Err(err) => return Err(Failure::kept(err, universe)),
        };

        let mut record = ProposalRecord {
            kind,
            trial: Some(trial),
            a1: to_f64(&a1),
            a2: to_f64(&a2),
            probability: to_f64(&probability),
            outcome: MoveOutcome::Rejected,
        };

        let universe = if passed {
            let (universe, outcome) = self.execute_and_commit(kind, universe, movable, executor)?;
            record.outcome = outcome;
            universe
        } else {
            self.statistics.record(kind, false);
            universe
        };

        debug!(
            kind = kind.label(),
            trial,
            probability = record.probability,
            outcome = ?record.outcome,
            "move attempted"
        );
        Ok(Attempt { universe, record })
    }

    /// Returns `a1`, `a1 * a2` and whether `trial` passes.
    fn decide(&self, kind: MoveKind, trial: f64, a2: &Real) -> Result<(Real, Real, bool), CdtError> {
        let a1 = self.combinatorial_ratio(kind)?;
        let probability = a1.clone() * a2.clone();
        let draw = self.precision.real(trial)?;
        let passed = draw <= probability;
        Ok((a1, probability, passed))
    }

    /// Performs `kind` unconditionally, as done once per seeded kind before the main loop.
    ///
    /// A kind the executor does not support is skipped without touching the
    /// statistics. An infeasible seed is a precondition failure.
    pub fn seed_move<U, X>(
        &mut self,
        kind: MoveKind,
        universe: U,
        movable: &SnapshotOf<U>,
        executor: &mut X,
    ) -> Result<Attempt<U>, Failure<U>>
    where
        U: Universe,
        X: MoveExecutor<U> + ?Sized,
    {
        if !executor.supports(kind) {
            warn!(kind = kind.label(), "skipping seed move the executor does not support");
            return Ok(Attempt {
                universe,
                record: ProposalRecord::untried(kind, MoveOutcome::Unsupported),
            });
        }
        let (universe, outcome) = self.execute_and_commit(kind, universe, movable, executor)?;
        if outcome != MoveOutcome::Accepted {
            return Err(Failure::kept(
                CdtError::Precondition(
                    ErrorInfo::new("seed-infeasible", "seed move found no eligible element")
                        .with_context("kind", kind.label())
                        .with_hint("start from a larger initial triangulation"),
                ),
                universe,
            ));
        }
        debug!(kind = kind.label(), "seed move applied");
        Ok(Attempt {
            universe,
            record: ProposalRecord {
                kind,
                trial: None,
                a1: 1.0,
                a2: 1.0,
                probability: 1.0,
                outcome,
            },
        })
    }

    fn execute_and_commit<U, X>(
        &mut self,
        kind: MoveKind,
        universe: U,
        movable: &SnapshotOf<U>,
        executor: &mut X,
    ) -> Result<(U, MoveOutcome), Failure<U>>
    where
        U: Universe,
        X: MoveExecutor<U> + ?Sized,
    {
        let next = match self.counts.apply(kind.delta()) {
            Ok(next) => next,
            Err(err) => return Err(Failure::kept(err.with_context("kind", kind.label()), universe)),
        };
        // The executor owns the universe from here on; its errors cannot return it.
        let Executed {
            universe,
            execution,
        } = executor.execute(kind, universe, movable).map_err(|err| {
            Failure::lost(
                err.with_context("collaborator", "move-executor")
                    .with_context("kind", kind.label()),
            )
        })?;
        let outcome = match execution {
            Execution::Applied => MoveOutcome::Accepted,
            Execution::Infeasible => MoveOutcome::Infeasible,
        };
        self.commit(kind, outcome, next);
        Ok((universe, outcome))
    }

    fn commit(&mut self, kind: MoveKind, outcome: MoveOutcome, next: ConfigurationCounts) {
        if outcome.is_accepted() {
            self.counts = next;
        }
        self.statistics.record(kind, outcome.is_accepted());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_core::{CountDelta, EdgeClasses, MovableSnapshot, SimplexClasses};

    #[derive(Debug, Default)]
    struct Counter {
        applied: Vec<MoveKind>,
    }

    impl Universe for Counter {
        type Cell = u32;
        type Edge = u32;
    }

    struct Recording {
        infeasible: bool,
    }

    impl MoveExecutor<Counter> for Recording {
        fn execute(
            &mut self,
            kind: MoveKind,
            mut universe: Counter,
            _movable: &SnapshotOf<Counter>,
        ) -> Result<Executed<Counter>, CdtError> {
            if self.infeasible {
                return Ok(Executed {
                    universe,
                    execution: Execution::Infeasible,
                });
            }
            universe.applied.push(kind);
            Ok(Executed {
                universe,
                execution: Execution::Applied,
            })
        }
    }

    struct LinearAction;

    impl ActionEvaluator for LinearAction {
        fn bulk_action(
            &self,
            counts: &ConfigurationCounts,
            _couplings: &Couplings,
            precision: Precision,
        ) -> Result<Real, CdtError> {
            Ok(precision.count(counts.two_two))
        }
    }

    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn uniform01(&mut self) -> f64 {
            self.0
        }

        fn uniform_int(&mut self, lo: u64, _hi: u64) -> u64 {
            lo
        }
    }

    fn engine() -> AcceptanceEngine<LinearAction> {
        let mut engine = AcceptanceEngine::new(
            LinearAction,
            Couplings::new(1.0, 1.0, 1.0).unwrap(),
            Precision::default(),
        );
        engine.begin(ConfigurationCounts::new(10, 10, 10));
        engine
    }

    fn snapshot() -> MovableSnapshot<u32, u32> {
        MovableSnapshot {
            simplices: SimplexClasses::default(),
            edges: EdgeClasses::default(),
        }
    }

    #[test]
    fn ratio_before_seeding_is_a_precondition_error() {
        let err = engine().combinatorial_ratio(MoveKind::TwoThree).unwrap_err();
        assert_eq!(err.info().code, "unseeded-ratio");
    }

    #[test]
    fn seeding_commits_table_deltas() {
        let mut engine = engine();
        let mut executor = Recording { infeasible: false };
        let mut universe = Counter::default();
        for kind in MoveKind::SEEDED {
            universe = engine
                .seed_move(kind, universe, &snapshot(), &mut executor)
                .unwrap()
                .universe;
        }
        assert_eq!(universe.applied, MoveKind::SEEDED.to_vec());
        assert_eq!(engine.counts(), ConfigurationCounts::new(12, 14, 10));
        for kind in MoveKind::SEEDED {
            assert_eq!(engine.statistics().attempted(kind), 1);
            assert_eq!(engine.statistics().successful(kind), 1);
        }
    }

    #[test]
    fn infeasible_seed_fails() {
        let mut engine = engine();
        let mut executor = Recording { infeasible: true };
        let failure = engine
            .seed_move(MoveKind::TwoThree, Counter::default(), &snapshot(), &mut executor)
            .unwrap_err();
        assert_eq!(failure.error.info().code, "seed-infeasible");
        assert!(failure.universe.is_some());
    }

    #[test]
    fn ratio_failure_hands_the_universe_back() {
        let mut engine = engine();
        let mut executor = Recording { infeasible: false };
        let universe = Counter {
            applied: vec![MoveKind::TwoSix],
        };
        let failure = engine
            .attempt_move(
                MoveKind::TwoThree,
                universe,
                &snapshot(),
                &mut executor,
                &mut Fixed(0.0),
            )
            .unwrap_err();
        assert_eq!(failure.error.info().code, "unseeded-ratio");
        let universe = failure.universe.expect("universe kept");
        assert_eq!(universe.applied, vec![MoveKind::TwoSix]);
        assert_eq!(engine.counts(), ConfigurationCounts::new(10, 10, 10));
    }

    #[test]
    fn increasing_action_is_always_favoured() {
        let engine = engine();
        let a2 = engine.dynamical_ratio(MoveKind::TwoThree).unwrap();
        assert_eq!(to_f64(&a2), 1.0);
        let a2 = engine.dynamical_ratio(MoveKind::ThreeTwo).unwrap();
        assert!((to_f64(&a2) - (-1f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn draw_above_probability_only_bumps_attempted() {
        let mut engine = engine();
        let mut executor = Recording { infeasible: false };
        let mut universe = Counter::default();
        for kind in MoveKind::SEEDED {
            universe = engine
                .seed_move(kind, universe, &snapshot(), &mut executor)
                .unwrap()
                .universe;
        }
        let before = engine.counts();
        let attempt = engine
            .attempt_move(
                MoveKind::ThreeTwo,
                universe,
                &snapshot(),
                &mut executor,
                &mut Fixed(0.999_999),
            )
            .unwrap();
        assert_eq!(attempt.record.outcome, MoveOutcome::Rejected);
        assert_eq!(engine.counts(), before);
        assert_eq!(engine.statistics().attempted(MoveKind::ThreeTwo), 2);
        assert_eq!(engine.statistics().successful(MoveKind::ThreeTwo), 1);
    }

    #[test]
    fn infeasible_execution_is_recorded_as_rejection() {
        let mut engine = engine();
        engine.statistics.record(MoveKind::TwoThree, true);
        let mut executor = Recording { infeasible: true };
        let attempt = engine
            .attempt_move(
                MoveKind::TwoThree,
                Counter::default(),
                &snapshot(),
                &mut executor,
                &mut Fixed(0.0),
            )
            .unwrap();
        assert_eq!(attempt.record.outcome, MoveOutcome::Infeasible);
        assert_eq!(engine.counts(), ConfigurationCounts::new(10, 10, 10));
        assert_eq!(engine.statistics().attempted(MoveKind::TwoThree), 2);
        assert_eq!(engine.statistics().successful(MoveKind::TwoThree), 1);
    }

    #[test]
    fn six_two_acceptance_commits_its_own_delta() {
        let mut engine = engine();
        engine.statistics.record(MoveKind::SixTwo, false);
        let mut executor = Recording { infeasible: false };
        let attempt = engine
            .attempt_move(
                MoveKind::SixTwo,
                Counter::default(),
                &snapshot(),
                &mut executor,
                &mut Fixed(0.0),
            )
            .unwrap();
        assert!(attempt.record.outcome.is_accepted());
        let expected = ConfigurationCounts::new(10, 10, 10)
            .apply(CountDelta {
                timelike_edges: -2,
                three_one: -4,
                two_two: 0,
            })
            .unwrap();
        assert_eq!(engine.counts(), expected);
        assert_eq!(engine.statistics().successful(MoveKind::SixTwo), 1);
    }
}
