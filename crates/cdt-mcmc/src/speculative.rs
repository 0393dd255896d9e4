//! Speculative batch evaluation of dynamical ratios.
//!
//! Kinds and trial draws for a batch are taken serially from the driver's
//! random source, in the same order the sequential driver takes them. The
//! dynamical ratios are then evaluated in parallel against one versioned copy
//! of the counts. A single writer commits the proposals in order: `a1` comes
//! from the live statistics, and a precomputed `a2` is used only while the
//! counts version is unchanged. Every acceptance bumps the version.

use cdt_core::{
    ActionEvaluator, CdtError, MoveClassifier, MoveExecutor, MoveKind, RandomSource, Real,
    SnapshotOf, Universe,
};
use rayon::prelude::*;
use tracing::trace;

use crate::acceptance::Failure;
use crate::kernel::Metropolis;

impl<C, X, A, R> Metropolis<C, X, A, R>
where
    A: ActionEvaluator + Sync,
    R: RandomSource,
{
    pub(crate) fn speculative_pass<U>(
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
        let batch_size = self.batch_size() as u64;
        let mut version: u64 = 0;
        let mut attempt: u64 = 0;
        while attempt < budget {
            let size = batch_size.min(budget - attempt);
            let proposals: Vec<(MoveKind, f64)> = (0..size)
                .map(|_| {
                    let kind = self.pick_kind(kinds);
                    (kind, self.rng.uniform01())
                })
                .collect();

            let evaluated_at = version;
            let counts = self.engine.counts();
            let engine = &self.engine;
            let ratios: Vec<Result<Real, CdtError>> = proposals
                .par_iter()
                .map(|(kind, _)| engine.dynamical_ratio_at(&counts, *kind))
                .collect();

            for ((kind, trial), speculative) in proposals.into_iter().zip(ratios) {
                if let Err(err) = self.check_cancelled(pass, attempt) {
                    return Err(Failure::kept(err, universe));
                }
                let a2 = if version == evaluated_at {
                    speculative
                } else {
                    trace!(kind = kind.label(), "recomputing stale dynamical ratio");
                    self.engine.dynamical_ratio(kind)
                };
                let a2 = match a2 {
                    Ok(a2) => a2,
                    Err(err) => {
                        let err = self.with_attempt_context(err, kind, pass, attempt);
                        return Err(Failure::kept(err, universe));
                    }
                };
                let outcome = self
                    .engine
                    .resolve(kind, trial, a2, universe, movable, &mut self.executor)
                    .map_err(|failure| {
                        failure.map_error(|err| self.with_attempt_context(err, kind, pass, attempt))
                    })?;
                universe = outcome.universe;
                let accepted = outcome.record.outcome.is_accepted();
                self.record(outcome.record);
                if accepted {
                    version += 1;
                    universe = self.after_accept(universe, movable, kind, pass, attempt)?;
                }
                attempt += 1;
            }
        }
        Ok(universe)
    }
}
