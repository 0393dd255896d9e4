use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cdt_core::errors::ErrorInfo;
use cdt_core::{
    ActionEvaluator, CdtError, ConfigurationCounts, MoveClassifier, MoveExecutor, MoveKind,
    Precision, RandomSource, RngHandle, SnapshotCardinalities, SnapshotOf, Universe,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::acceptance::{AcceptanceEngine, Failure, ProposalRecord};
use crate::action::S3BulkAction;
use crate::checkpoint::{CheckpointReport, CheckpointSink};
use crate::config::{AttemptBudget, RunConfig, SimulationParameters, SnapshotRefresh};
use crate::determinism;
use crate::stats::{KindStatistics, MoveStatistics};
use crate::universe::{FoliatedClassifier, FoliatedExecutor, FoliatedUniverse};

/// Shared flag checked by the pass driver between attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the run stops before its next attempt.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Attempted, successful and acceptance rate per move label.
    pub statistics: BTreeMap<String, KindStatistics>,
    /// Attempts over all kinds, seeding included.
    pub total_attempted: u64,
    /// Accepted attempts over all kinds, seeding included.
    pub total_successful: u64,
    /// Tracked counts at the end of the run.
    pub final_counts: ConfigurationCounts,
    /// Cardinalities of the last movable-element snapshot.
    pub cardinalities: SnapshotCardinalities,
    /// Passes fully executed.
    pub passes_completed: usize,
    /// Checkpoint reports issued.
    pub checkpoints: usize,
    /// Working precision in bits.
    pub precision_bits: usize,
}

/// Final triangulation and summary of a configured run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Triangulation handed back by the driver.
    pub universe: FoliatedUniverse,
    /// Run summary.
    pub summary: RunSummary,
}

/// Runs the shipped foliated universe with the S3 bulk action from `config`.
///
/// The executor draws from the executor substream of the master seed.
pub fn run(
    config: &RunConfig,
    sink: &mut dyn CheckpointSink,
) -> Result<RunOutput, Failure<FoliatedUniverse>> {
    let universe = FoliatedUniverse::foliated(config.universe.simplices, config.universe.timeslices)?;
    let executor = FoliatedExecutor::new(RngHandle::from_seed(determinism::executor_seed(
        config.seed_policy.master_seed,
    )));
    let mut driver = Metropolis::from_config(
        config,
        FoliatedClassifier,
        executor,
        S3BulkAction::new(config.action),
    )?;
    let universe = driver.run(universe, sink)?;
    Ok(RunOutput {
        universe,
        summary: driver.summary(),
    })
}

/// Pass driver for the Metropolis-Hastings chain.
///
/// The triangulation is moved into [`Metropolis::run`] and moved back out;
/// the driver never holds it between runs. A failed run hands it back inside
/// the [`Failure`] unless an executor consumed it, and statistics stay
/// readable on the driver.
#[derive(Debug)]
pub struct Metropolis<C, X, A, R = RngHandle> {
    parameters: SimulationParameters,
    classifier: C,
    pub(crate) executor: X,
    pub(crate) engine: AcceptanceEngine<A>,
    pub(crate) rng: R,
    budget: AttemptBudget,
    refresh: SnapshotRefresh,
    batch_size: usize,
    cancel: CancelToken,
    cardinalities: SnapshotCardinalities,
    passes_completed: usize,
    checkpoints: usize,
    trace: Option<Vec<ProposalRecord>>,
    drift_reported: bool,
}

impl<C, X, A: ActionEvaluator> Metropolis<C, X, A, RngHandle> {
    /// Builds a driver from a YAML run configuration.
    ///
    /// Kind selection and acceptance draws use the acceptance substream of
    /// the configured master seed.
    pub fn from_config(
        config: &RunConfig,
        classifier: C,
        executor: X,
        evaluator: A,
    ) -> Result<Self, CdtError> {
        let parameters = config.parameters()?;
        let precision = config.precision()?;
        if config.parallel.batch_size == 0 {
            return Err(CdtError::Config(
                ErrorInfo::new("zero-batch-size", "speculative batches need at least one proposal")
                    .with_hint("use 1 for the sequential driver"),
            ));
        }
        let rng = RngHandle::from_seed(determinism::acceptance_seed(
            config.seed_policy.master_seed,
        ));
        Ok(
            Self::new(parameters, precision, classifier, executor, evaluator, rng)
                .with_budget(config.budget)
                .with_snapshot_refresh(config.snapshot_refresh)
                .with_batch_size(config.parallel.batch_size),
        )
    }
}

impl<C, X, A: ActionEvaluator, R> Metropolis<C, X, A, R> {
    /// Creates a driver with the default budget, refresh policy and no batching.
    pub fn new(
        parameters: SimulationParameters,
        precision: Precision,
        classifier: C,
        executor: X,
        evaluator: A,
        rng: R,
    ) -> Self {
        Self {
            engine: AcceptanceEngine::new(evaluator, *parameters.couplings(), precision),
            parameters,
            classifier,
            executor,
            rng,
            budget: AttemptBudget::default(),
            refresh: SnapshotRefresh::default(),
            batch_size: 1,
            cancel: CancelToken::new(),
            cardinalities: SnapshotCardinalities::default(),
            passes_completed: 0,
            checkpoints: 0,
            trace: None,
            drift_reported: false,
        }
    }

    /// Sets the per-pass attempt budget.
    pub fn with_budget(mut self, budget: AttemptBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Sets when the movable-element snapshot is rebuilt.
    pub fn with_snapshot_refresh(mut self, refresh: SnapshotRefresh) -> Self {
        self.refresh = refresh;
        self
    }

    /// Evaluates dynamical ratios in speculative batches of `batch_size`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Uses `cancel` as the cancellation flag.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Keeps a [`ProposalRecord`] for every attempt of the next runs.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Validated parameters.
    pub fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    /// Working precision.
    pub fn precision(&self) -> Precision {
        self.engine.precision()
    }

    /// Tracked counts.
    pub fn counts(&self) -> ConfigurationCounts {
        self.engine.counts()
    }

    /// All move statistics.
    pub fn statistics(&self) -> &MoveStatistics {
        self.engine.statistics()
    }

    /// Attempts recorded for `kind`.
    pub fn attempted(&self, kind: MoveKind) -> u64 {
        self.engine.statistics().attempted(kind)
    }

    /// Successful attempts recorded for `kind`.
    pub fn successful(&self, kind: MoveKind) -> u64 {
        self.engine.statistics().successful(kind)
    }

    /// Attempts over all kinds.
    pub fn total_attempted(&self) -> u64 {
        self.engine.statistics().total_attempted()
    }

    /// Cardinalities of the current movable-element snapshot.
    pub fn snapshot_cardinalities(&self) -> SnapshotCardinalities {
        self.cardinalities
    }

    /// Proposals evaluated together; 1 means the sequential driver.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Passes fully executed by the last run.
    pub fn passes_completed(&self) -> usize {
        self.passes_completed
    }

    /// Proposal records of the last run, empty unless tracing was enabled.
    pub fn trace(&self) -> &[ProposalRecord] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Cancellation flag shared with this driver.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Acceptance engine.
    pub fn engine(&self) -> &AcceptanceEngine<A> {
        &self.engine
    }

    /// Serialisable summary of the driver's state.
    pub fn summary(&self) -> RunSummary {
        let statistics = self.engine.statistics();
        RunSummary {
            statistics: statistics.by_kind(),
            total_attempted: statistics.total_attempted(),
            total_successful: statistics.total_successful(),
            final_counts: self.engine.counts(),
            cardinalities: self.cardinalities,
            passes_completed: self.passes_completed,
            checkpoints: self.checkpoints,
            precision_bits: self.engine.precision().bits(),
        }
    }

    pub(crate) fn check_cancelled(&self, pass: usize, attempt: u64) -> Result<(), CdtError> {
        if self.cancel.is_cancelled() {
            return Err(CdtError::Cancelled(
                ErrorInfo::new("run-cancelled", "run cancelled between attempts")
                    .with_context("pass", pass.to_string())
                    .with_context("attempt", attempt.to_string()),
            ));
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, record: ProposalRecord) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(record);
        }
    }

    pub(crate) fn with_attempt_context(
        &self,
        err: CdtError,
        kind: MoveKind,
        pass: usize,
        attempt: u64,
    ) -> CdtError {
        self.with_pass_context(
            err.with_context("kind", kind.label())
                .with_context("attempt", attempt.to_string()),
            pass,
        )
    }

    pub(crate) fn with_pass_context(&self, err: CdtError, pass: usize) -> CdtError {
        let counts = self.engine.counts();
        err.with_context("pass", pass.to_string()).with_context(
            "counts",
            format!(
                "N1_TL={} N3_31={} N3_22={}",
                counts.timelike_edges, counts.three_one, counts.two_two
            ),
        )
    }
}

impl<C, X, A, R> Metropolis<C, X, A, R>
where
    A: ActionEvaluator + Sync,
    R: RandomSource,
{
    /// Runs seeding and every pass, then hands the universe back.
    ///
    /// Counts are derived once from a fresh classification; afterwards they
    /// change only through committed Table 1 deltas.
    pub fn run<U>(
        &mut self,
        universe: U,
        sink: &mut dyn CheckpointSink,
    ) -> Result<U, Failure<U>>
    where
        U: Universe,
        C: MoveClassifier<U>,
        X: MoveExecutor<U>,
    {
        self.passes_completed = 0;
        self.checkpoints = 0;
        self.drift_reported = false;
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }

        let mut movable = match self.classify(&universe) {
            Ok(movable) => movable,
            Err(err) => return Err(Failure::kept(err.with_context("pass", "0"), universe)),
        };
        self.engine.begin(movable.counts());
        self.cardinalities = movable.cardinalities();
        info!(
            passes = self.parameters.passes(),
            counts = ?self.engine.counts(),
            precision_bits = self.engine.precision().bits(),
            "starting run"
        );

        let mut universe = universe;
        for (index, kind) in MoveKind::SEEDED.into_iter().enumerate() {
            let seed = index as u64;
            let attempt = self
                .engine
                .seed_move(kind, universe, &movable, &mut self.executor)
                .map_err(|failure| {
                    failure.map_error(|err| self.with_attempt_context(err, kind, 0, seed))
                })?;
            universe = attempt.universe;
            let accepted = attempt.record.outcome.is_accepted();
            self.record(attempt.record);
            if accepted {
                universe = self.after_accept(universe, &mut movable, kind, 0, seed)?;
            }
        }

        let kinds: Vec<MoveKind> = MoveKind::ALL
            .into_iter()
            .filter(|kind| self.executor.supports(*kind))
            .collect();
        if kinds.is_empty() {
            return Err(Failure::kept(
                CdtError::Precondition(ErrorInfo::new(
                    "no-supported-moves",
                    "executor supports no move kind",
                )),
                universe,
            ));
        }

        for pass in 1..=self.parameters.passes() {
            if self.refresh == SnapshotRefresh::EveryPass {
                movable = match self.classify(&universe) {
                    Ok(movable) => movable,
                    Err(err) => {
                        return Err(Failure::kept(self.with_pass_context(err, pass), universe))
                    }
                };
            }
            let budget = self.budget.attempts(&self.engine.counts());
            universe = if self.batch_size > 1 {
                self.speculative_pass(universe, &mut movable, &kinds, pass, budget)?
            } else {
                self.sequential_pass(universe, &mut movable, &kinds, pass, budget)?
            };
            self.cardinalities = movable.cardinalities();
            self.passes_completed = pass;
            debug!(pass, attempts = budget, counts = ?self.engine.counts(), "pass complete");

            if self.parameters.checkpoint_due(pass) {
                let report = CheckpointReport::new(
                    pass,
                    self.engine.counts(),
                    self.engine.statistics(),
                    self.cardinalities,
                );
                if let Err(err) = sink.report(&report) {
                    let err = err.with_context("collaborator", "checkpoint-sink");
                    let err = self.with_pass_context(err, pass);
                    return Err(Failure::kept(err, universe));
                }
                self.checkpoints += 1;
            }
        }

        info!(
            passes = self.passes_completed,
            attempted = self.engine.statistics().total_attempted(),
            successful = self.engine.statistics().total_successful(),
            "run finished"
        );
        Ok(universe)
    }

    fn sequential_pass<U>(
        &mut self,
        mut universe: U,
        movable: &mut SnapshotOf<U>,
        kinds: &[MoveKind],
        pass: usize,
        budget: u64,
    ) -> Result<U, Failure<U>>
    where
        U: Universe,
        C: MoveClassifier<U>,
        X: MoveExecutor<U>,
    {
        for attempt in 0..budget {
            if let Err(err) = self.check_cancelled(pass, attempt) {
                return Err(Failure::kept(err, universe));
            }
            let kind = self.pick_kind(kinds);
            let outcome = self
                .engine
                .attempt_move(kind, universe, movable, &mut self.executor, &mut self.rng)
                .map_err(|failure| {
                    failure.map_error(|err| self.with_attempt_context(err, kind, pass, attempt))
                })?;
            universe = outcome.universe;
            let accepted = outcome.record.outcome.is_accepted();
            self.record(outcome.record);
            if accepted {
                universe = self.after_accept(universe, movable, kind, pass, attempt)?;
            }
        }
        Ok(universe)
    }

    pub(crate) fn pick_kind(&mut self, kinds: &[MoveKind]) -> MoveKind {
        let index = self.rng.uniform_int(0, kinds.len() as u64 - 1) as usize;
        kinds[index.min(kinds.len() - 1)]
    }
}

impl<C, X, A: ActionEvaluator, R> Metropolis<C, X, A, R> {
    pub(crate) fn classify<U>(&self, universe: &U) -> Result<SnapshotOf<U>, CdtError>
    where
        U: Universe,
        C: MoveClassifier<U>,
    {
        self.classifier
            .snapshot(universe)
            .map_err(|err| err.with_context("collaborator", "move-classifier"))
    }

    /// Refreshes the snapshot after an accepted `kind` when the policy asks for it.
    pub(crate) fn after_accept<U>(
        &mut self,
        universe: U,
        movable: &mut SnapshotOf<U>,
        kind: MoveKind,
        pass: usize,
        attempt: u64,
    ) -> Result<U, Failure<U>>
    where
        U: Universe,
        C: MoveClassifier<U>,
    {
        if self.refresh != SnapshotRefresh::EveryAccept {
            return Ok(universe);
        }
        *movable = match self.classify(&universe) {
            Ok(movable) => movable,
            Err(err) => {
                let err = self.with_attempt_context(err, kind, pass, attempt);
                return Err(Failure::kept(err, universe));
            }
        };
        let classified = movable.counts();
        if classified != self.engine.counts() && !self.drift_reported {
            warn!(
                tracked = ?self.engine.counts(),
                classified = ?classified,
                "classified counts differ from tracked counts"
            );
            self.drift_reported = true;
        }
        Ok(universe)
    }
}
