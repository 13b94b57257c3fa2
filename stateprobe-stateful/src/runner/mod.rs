//! Generating sequences step by step, and replaying recorded ones

pub(crate) mod executor;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use stateprobe::GeneratorConfig;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::dsl::StateMachine;
use crate::error::EngineError;
use crate::failure::{Failure, Violation};
use crate::model::worker::SubjectHandle;
use crate::model::{Model, Subject};
use crate::operations::{Sequence, Step};
use crate::outcome::Outcome;
use executor::{StepExecutor, StepReport};

/// Lifecycle of a single sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// Subject outcome differed from the model, or the subject went away
    Diverged,
    InvariantViolated,
    /// Step budget used up, or no rule was eligible any more
    Exhausted,
}

impl RunStatus {
    pub fn of<R>(violation: &Violation<R>) -> Self {
        match violation {
            Violation::Invariant { .. } => RunStatus::InvariantViolated,
            Violation::Divergence { .. } | Violation::Unobservable { .. } => RunStatus::Diverged,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Running => "running",
            RunStatus::Diverged => "diverged",
            RunStatus::InvariantViolated => "invariant violated",
            RunStatus::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// A generated sequence and how it ended
///
/// On failure the sequence stops at the failing step, so it reproduces the
/// failure as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRun<R> {
    pub sequence: Sequence,
    /// Outcomes of the steps that completed without a failure, in order
    pub outcomes: Vec<Outcome<R>>,
    pub status: RunStatus,
    pub failure: Option<Failure<R>>,
}

/// How a replay ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayVerdict<R> {
    Passed,
    Failed(Failure<R>),
    /// The step at this index is no longer eligible in the model state it
    /// reaches, so the sequence cannot be executed as written
    Invalid { step: usize },
}

/// Result of replaying a fixed sequence
#[derive(Debug, Clone)]
pub struct Replay<M: Model> {
    /// Outcomes of the steps that both sides agreed on
    pub outcomes: Vec<Outcome<M::Reason>>,
    /// Model state after the last committed step
    pub model: M,
    pub verdict: ReplayVerdict<M::Reason>,
}

impl<M: Model> Replay<M> {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, ReplayVerdict::Passed)
    }

    pub fn failure(&self) -> Option<&Failure<M::Reason>> {
        match &self.verdict {
            ReplayVerdict::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

enum Advance<R> {
    Continue(Outcome<R>),
    Stop(Failure<R>),
}

/// One model and one live subject walking through a sequence together
struct Session<'a, M: Model, S> {
    machine: &'a StateMachine<M>,
    executor: StepExecutor<'a, M>,
    model: M,
    subject: SubjectHandle<M, S>,
    status: RunStatus,
}

impl<'a, M: Model, S: Subject<M>> Session<'a, M, S> {
    fn start(machine: &'a StateMachine<M>, subject: S, timeout: Option<Duration>) -> Result<Self, EngineError> {
        Ok(Self {
            machine,
            executor: StepExecutor::new(machine),
            model: machine.initial_model().clone(),
            subject: SubjectHandle::start(subject, timeout)?,
            status: RunStatus::Running,
        })
    }

    /// Evaluate the invariants at `checkpoint`
    fn check(&mut self, checkpoint: usize) -> Result<Option<Failure<M::Reason>>, EngineError> {
        let machine = self.machine;
        let invariants = machine.invariants();
        let snapshot = if invariants.reads_snapshot() {
            match self.subject.observe() {
                Ok(snapshot) => snapshot,
                Err(outage) => {
                    return Ok(Some(self.stop(
                        checkpoint,
                        Violation::Unobservable {
                            unavailable: outage.kind,
                            detail: outage.detail,
                        },
                    )));
                }
            }
        } else {
            None
        };

        let mut violations = invariants.check_all(&self.model, snapshot.as_ref())?;
        if violations.is_empty() {
            return Ok(None);
        }
        if violations.len() > 1 {
            let tags: Vec<&str> = violations.iter().map(|v| v.tag.as_str()).collect();
            debug!(target: "stateprobe::runner", checkpoint, ?tags, "several invariants violated");
        }
        let first = violations.remove(0);
        Ok(Some(self.stop(checkpoint, first.into_violation())))
    }

    fn advance(&mut self, step: &Step, checkpoint: usize) -> Result<Advance<M::Reason>, EngineError> {
        match self.executor.execute(step, &mut self.model, &mut self.subject)? {
            StepReport::Diverged(violation) => Ok(Advance::Stop(self.stop(checkpoint, violation))),
            StepReport::Matched(outcome) => match self.check(checkpoint)? {
                Some(failure) => Ok(Advance::Stop(failure)),
                None => Ok(Advance::Continue(outcome)),
            },
        }
    }

    fn stop(&mut self, checkpoint: usize, violation: Violation<M::Reason>) -> Failure<M::Reason> {
        self.status = RunStatus::of(&violation);
        Failure::new(checkpoint, violation)
    }
}

/// Drives one sequence at a time against fresh subjects built by `factory`
pub struct SequenceRunner<'a, M: Model, F> {
    machine: &'a StateMachine<M>,
    factory: &'a F,
    subject_timeout: Option<Duration>,
}

impl<'a, M, S, F> SequenceRunner<'a, M, F>
where
    M: Model,
    S: Subject<M>,
    F: Fn() -> S,
{
    pub fn new(machine: &'a StateMachine<M>, factory: &'a F) -> Self {
        Self {
            machine,
            factory,
            subject_timeout: None,
        }
    }

    /// Call the subject on a worker thread, waiting at most `timeout` per call
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.subject_timeout = timeout;
        self
    }

    pub fn machine(&self) -> &'a StateMachine<M> {
        self.machine
    }

    /// Generate and execute a fresh sequence of at most `max_steps` steps
    ///
    /// Every random choice is drawn from `rng`: the rule among those eligible,
    /// then its arguments. The sequence ends early when no rule is eligible.
    pub fn run(
        &self,
        rng: &mut dyn RngCore,
        config: &GeneratorConfig,
        max_steps: usize,
    ) -> Result<SequenceRun<M::Reason>, EngineError> {
        let mut session = Session::start(self.machine, (self.factory)(), self.subject_timeout)?;
        let mut sequence = Sequence::new();
        let mut outcomes = Vec::new();

        let mut failure = session.check(0)?;
        while failure.is_none() && sequence.len() < max_steps {
            let Some(rule) = self.machine.rules().choose(&session.model, rng) else {
                debug!(
                    target: "stateprobe::runner",
                    steps = sequence.len(),
                    "no eligible rule, ending sequence early"
                );
                break;
            };
            let step = Step::new(rule.name(), rule.draw_args(rng, config)?);
            let advance = session.advance(&step, sequence.len() + 1)?;
            sequence.push(step);
            match advance {
                Advance::Continue(outcome) => outcomes.push(outcome),
                Advance::Stop(found) => failure = Some(found),
            }
        }

        if failure.is_none() {
            session.status = RunStatus::Exhausted;
        }
        debug!(
            target: "stateprobe::runner",
            steps = sequence.len(),
            status = %session.status,
            "sequence finished"
        );
        Ok(SequenceRun {
            sequence,
            outcomes,
            status: session.status,
            failure,
        })
    }

    /// Execute a fixed sequence from a fresh model and subject
    pub fn replay(&self, sequence: &Sequence) -> Result<Replay<M>, EngineError> {
        let mut session = Session::start(self.machine, (self.factory)(), self.subject_timeout)?;
        let mut outcomes = Vec::with_capacity(sequence.len());

        let verdict = 'replay: {
            if let Some(failure) = session.check(0)? {
                break 'replay ReplayVerdict::Failed(failure);
            }
            for (index, step) in sequence.steps().iter().enumerate() {
                let rule = self
                    .machine
                    .rules()
                    .get(&step.rule)
                    .ok_or_else(|| EngineError::UnknownRule(step.rule.clone()))?;
                if !rule.is_eligible(&session.model) {
                    break 'replay ReplayVerdict::Invalid { step: index };
                }
                match session.advance(step, index + 1)? {
                    Advance::Continue(outcome) => outcomes.push(outcome),
                    Advance::Stop(failure) => break 'replay ReplayVerdict::Failed(failure),
                }
            }
            ReplayVerdict::Passed
        };

        Ok(Replay {
            outcomes,
            model: session.model,
            verdict,
        })
    }
}
