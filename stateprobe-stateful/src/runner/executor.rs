//! Applies one step to both the model and the subject and compares outcomes

use tracing::trace;

use crate::dsl::StateMachine;
use crate::error::EngineError;
use crate::failure::Violation;
use crate::model::worker::SubjectHandle;
use crate::model::{Model, Subject};
use crate::operations::Step;
use crate::outcome::Outcome;

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepReport<R> {
    /// Both sides agree; the model has been advanced
    Matched(Outcome<R>),
    /// The outcomes differ; the model is untouched
    Diverged(Violation<R>),
}

pub(crate) struct StepExecutor<'a, M: Model> {
    machine: &'a StateMachine<M>,
}

impl<'a, M: Model> StepExecutor<'a, M> {
    pub(crate) fn new(machine: &'a StateMachine<M>) -> Self {
        Self { machine }
    }

    /// The model transition runs on a scratch copy that is committed only
    /// when the subject reports the same outcome.
    pub(crate) fn execute<S: Subject<M>>(
        &self,
        step: &Step,
        model: &mut M,
        subject: &mut SubjectHandle<M, S>,
    ) -> Result<StepReport<M::Reason>, EngineError> {
        let rule = self
            .machine
            .rules()
            .get(&step.rule)
            .ok_or_else(|| EngineError::UnknownRule(step.rule.clone()))?;
        rule.check_args(&step.args)?;

        let mut next = model.clone();
        let expected = rule.apply(&mut next, &step.args)?;
        let (actual, detail) = subject.apply(&step.rule, &step.args);

        trace!(
            target: "stateprobe::runner",
            step = %step,
            expected = %expected,
            actual = %actual,
            "executed step"
        );

        if expected == actual {
            *model = next;
            Ok(StepReport::Matched(actual))
        } else {
            Ok(StepReport::Diverged(Violation::Divergence {
                rule: step.rule.clone(),
                expected,
                actual,
                detail,
            }))
        }
    }
}
