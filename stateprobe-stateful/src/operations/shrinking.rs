//! Shrinking failing sequences to a minimal reproduction
//!
//! The shrinker repeatedly proposes simpler candidates and replays each one
//! from scratch. A candidate is accepted only when it reproduces a failure of
//! the same [`FailureClass`] and is strictly simpler (shortlex: fewer steps,
//! then lower argument complexity). Tactics, coarse to fine:
//!
//! 1. Delete chunks of steps: halves, then quarters, and so on (delta debugging)
//! 2. Delete single steps, front to back
//! 3. Shrink arguments in place using each rule's generator
//!
//! Every reproducing replay is also truncated to its failing checkpoint, so
//! a candidate that fails earlier than expected shortens the sequence for
//! free. The loop stops at a fixed point, when the replay budget runs out, or
//! when the campaign is cancelled. The best sequence found so far is always
//! returned, and it always reproduces the failure.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Sequence;
use crate::campaign::CancelToken;
use crate::error::EngineError;
use crate::failure::{Failure, FailureClass};
use crate::model::{Model, Subject};
use crate::runner::{ReplayVerdict, SequenceRunner};

/// Statistics about one shrink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrinkStats {
    /// Candidate sequences replayed
    pub attempts: usize,
    /// Candidates accepted as the new best
    pub accepted: usize,
    /// `false` when the budget or a cancellation cut the search short
    pub completed: bool,
}

/// Result of shrinking one failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkOutcome<R> {
    pub minimal: Sequence,
    pub failure: Failure<R>,
    pub stats: ShrinkStats,
}

struct Search<R> {
    class: FailureClass,
    best: Sequence,
    failure: Failure<R>,
    stats: ShrinkStats,
    interrupted: bool,
}

/// Sequence shrinker bound to a runner
pub struct Shrinker<'r, 'a, M: Model, F> {
    runner: &'r SequenceRunner<'a, M, F>,
    budget: usize,
    cancel: Option<CancelToken>,
}

impl<'r, 'a, M, S, F> Shrinker<'r, 'a, M, F>
where
    M: Model,
    S: Subject<M>,
    F: Fn() -> S,
{
    /// Create a shrinker allowed at most `budget` replays per failure
    pub fn new(runner: &'r SequenceRunner<'a, M, F>, budget: usize) -> Self {
        Self {
            runner,
            budget,
            cancel: None,
        }
    }

    /// Stop early, keeping the best sequence so far, once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Shrink a sequence that is known to fail with `failure`
    pub fn shrink(&self, sequence: &Sequence, failure: Failure<M::Reason>) -> Result<ShrinkOutcome<M::Reason>, EngineError> {
        let mut search = Search {
            class: failure.class(),
            best: sequence.truncated(failure.checkpoint),
            failure,
            stats: ShrinkStats::default(),
            interrupted: false,
        };
        debug!(
            target: "stateprobe::shrink",
            steps = search.best.len(),
            class = %search.class,
            "shrinking started"
        );

        loop {
            let mut improved = self.delete_chunks(&mut search)?;
            improved |= self.delete_steps(&mut search)?;
            improved |= self.shrink_arguments(&mut search)?;
            if search.interrupted || !improved {
                break;
            }
        }
        search.stats.completed = !search.interrupted;

        debug!(
            target: "stateprobe::shrink",
            steps = search.best.len(),
            attempts = search.stats.attempts,
            accepted = search.stats.accepted,
            completed = search.stats.completed,
            "shrinking finished"
        );
        Ok(ShrinkOutcome {
            minimal: search.best,
            failure: search.failure,
            stats: search.stats,
        })
    }

    /// Replay `sequence` and shrink it if it fails; `None` when it passes
    pub fn minimize(&self, sequence: &Sequence) -> Result<Option<ShrinkOutcome<M::Reason>>, EngineError> {
        match self.runner.replay(sequence)?.verdict {
            ReplayVerdict::Failed(failure) => self.shrink(sequence, failure).map(Some),
            ReplayVerdict::Passed | ReplayVerdict::Invalid { .. } => Ok(None),
        }
    }

    /// Replay one candidate, adopting it when it reproduces the failure class
    /// and is strictly simpler than the current best
    fn attempt(&self, search: &mut Search<M::Reason>, candidate: Sequence) -> Result<bool, EngineError> {
        if search.stats.attempts >= self.budget || self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            search.interrupted = true;
            return Ok(false);
        }
        search.stats.attempts += 1;

        let ReplayVerdict::Failed(failure) = self.runner.replay(&candidate)?.verdict else {
            return Ok(false);
        };
        if failure.class() != search.class {
            return Ok(false);
        }
        let reduced = candidate.truncated(failure.checkpoint);
        if !reduced.is_simpler_than(&search.best) {
            return Ok(false);
        }

        debug!(
            target: "stateprobe::shrink",
            steps = reduced.len(),
            sequence = %reduced,
            "accepted smaller sequence"
        );
        search.best = reduced;
        search.failure = failure;
        search.stats.accepted += 1;
        Ok(true)
    }

    fn delete_chunks(&self, search: &mut Search<M::Reason>) -> Result<bool, EngineError> {
        let mut improved = false;
        let mut size = search.best.len() / 2;
        while size >= 2 {
            let mut start = 0;
            while start < search.best.len() {
                let candidate = search.best.without(start..start + size);
                if self.attempt(search, candidate)? {
                    improved = true;
                } else if search.interrupted {
                    return Ok(improved);
                } else {
                    start += size;
                }
            }
            size /= 2;
        }
        Ok(improved)
    }

    fn delete_steps(&self, search: &mut Search<M::Reason>) -> Result<bool, EngineError> {
        let mut improved = false;
        let mut index = 0;
        while index < search.best.len() {
            let candidate = search.best.without(index..index + 1);
            if self.attempt(search, candidate)? {
                improved = true;
            } else if search.interrupted {
                return Ok(improved);
            } else {
                index += 1;
            }
        }
        Ok(improved)
    }

    fn shrink_arguments(&self, search: &mut Search<M::Reason>) -> Result<bool, EngineError> {
        let rules = self.runner.machine().rules();
        let mut improved = false;
        let mut index = 0;
        while index < search.best.len() {
            let step = search.best.steps()[index].clone();
            let Some(rule) = rules.get(&step.rule) else {
                return Err(EngineError::UnknownRule(step.rule));
            };

            for arg in 0..step.args.len() {
                // Keep shrinking this argument until no candidate is accepted
                'argument: loop {
                    let Some(current) = search.best.steps().get(index).and_then(|s| s.args.get(arg)).cloned() else {
                        break;
                    };
                    for value in rule.shrink_arg(arg, &current) {
                        if value.complexity() >= current.complexity() {
                            continue;
                        }
                        let candidate = search.best.with_arg(index, arg, value);
                        if self.attempt(search, candidate)? {
                            improved = true;
                            continue 'argument;
                        }
                        if search.interrupted {
                            return Ok(improved);
                        }
                    }
                    break;
                }
            }
            index += 1;
        }
        Ok(improved)
    }
}
