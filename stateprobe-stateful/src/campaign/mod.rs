//! Campaigns: many independent sequences from one root seed
//!
//! Example `i` draws its sequence from a generator seeded with
//! `derive_seed(root, i)`, with a size hint that grows over the campaign. The
//! first failing example is shrunk and recorded; with `fail_fast` disabled the
//! campaign keeps going and records every failure. Outcomes of every
//! generated step are tallied per rule into the report's coverage.

pub mod coverage;
pub mod parallel;
pub mod record;

use stateprobe::{CampaignConfig, GeneratorConfig, create_seeded_rng, derive_seed, fresh_seed};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::dsl::StateMachine;
use crate::error::EngineError;
use crate::model::{Model, Subject};
use crate::operations::{Sequence, Shrinker};
use crate::runner::{Replay, SequenceRunner};

pub use coverage::{OutcomeCoverage, SUCCESS_LABEL, outcome_label};
pub use parallel::{ParallelCampaign, ParallelConfig};
pub use record::{CampaignReport, FailureRecord};

/// Cooperative cancellation shared between a campaign and its caller
///
/// Checked before every example and every shrink replay. A cancelled shrink
/// still yields a record holding the best reproducing sequence found so far.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What one example contributed to the report
pub(crate) struct ExampleResult<R> {
    pub coverage: OutcomeCoverage,
    pub failure: Option<FailureRecord<R>>,
}

/// A validated machine, a subject factory and a configuration
pub struct Campaign<M: Model, F> {
    machine: StateMachine<M>,
    factory: F,
    config: CampaignConfig,
    cancel: CancelToken,
}

impl<M, S, F> Campaign<M, F>
where
    M: Model,
    S: Subject<M>,
    F: Fn() -> S,
{
    /// Validate the configuration and the machine up front
    pub fn new(machine: StateMachine<M>, factory: F, config: CampaignConfig) -> Result<Self, EngineError> {
        config.validate()?;
        machine.validate()?;
        Ok(Self {
            machine,
            factory,
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Share a cancellation token with the caller
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn machine(&self) -> &StateMachine<M> {
        &self.machine
    }

    fn runner(&self) -> SequenceRunner<'_, M, F> {
        SequenceRunner::new(&self.machine, &self.factory).with_timeout(self.config.subject_timeout)
    }

    /// Run examples in order until one fails (or all of them, without fail-fast)
    pub fn run(&self) -> Result<CampaignReport<M::Reason>, EngineError> {
        let seed = self.config.seed.unwrap_or_else(fresh_seed);
        info!(
            target: "stateprobe::campaign",
            seed,
            max_examples = self.config.max_examples,
            max_steps = self.config.max_steps_per_sequence,
            fail_fast = self.config.fail_fast,
            "campaign started"
        );

        let runner = self.runner();
        let mut report = CampaignReport::new(seed);
        for example in 0..self.config.max_examples {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let result = self.run_example(&runner, seed, example)?;
            report.examples_run += 1;
            report.coverage.merge(&result.coverage);
            if let Some(record) = result.failure {
                report.failures.push(record);
                if self.config.fail_fast {
                    break;
                }
            }
        }

        self.finish(&report);
        Ok(report)
    }

    /// Replay a recorded sequence against a fresh subject
    pub fn replay(&self, sequence: &Sequence) -> Result<Replay<M>, EngineError> {
        self.runner().replay(sequence)
    }

    /// Generate, execute and (on failure) shrink one example
    pub(crate) fn run_example(
        &self,
        runner: &SequenceRunner<'_, M, F>,
        seed: u64,
        example: usize,
    ) -> Result<ExampleResult<M::Reason>, EngineError> {
        let example_seed = derive_seed(seed, example as u64);
        let mut rng = create_seeded_rng(example_seed);
        let generator_config = GeneratorConfig::default().with_size_hint(self.config.size_hint_for(example));

        let run = runner.run(&mut rng, &generator_config, self.config.max_steps_per_sequence)?;
        let mut coverage = OutcomeCoverage::new();
        coverage.record_run(&run.sequence, &run.outcomes);
        let Some(failure) = run.failure else {
            return Ok(ExampleResult {
                coverage,
                failure: None,
            });
        };
        info!(
            target: "stateprobe::campaign",
            example,
            steps = run.sequence.len(),
            class = %failure.class(),
            "failure found, shrinking"
        );

        let shrunk = Shrinker::new(runner, self.config.shrink_budget)
            .with_cancel(self.cancel.clone())
            .shrink(&run.sequence, failure)?;
        info!(
            target: "stateprobe::campaign",
            example,
            original = run.sequence.len(),
            minimal = shrunk.minimal.len(),
            "failure shrunk"
        );

        let record = FailureRecord {
            seed,
            example,
            example_seed,
            class: shrunk.failure.class(),
            checkpoint: shrunk.failure.checkpoint,
            violation: shrunk.failure.violation,
            sequence: shrunk.minimal,
            original_length: run.sequence.len(),
            shrink: shrunk.stats,
        };
        Ok(ExampleResult {
            coverage,
            failure: Some(record),
        })
    }

    fn finish(&self, report: &CampaignReport<M::Reason>) {
        info!(
            target: "stateprobe::campaign",
            seed = report.seed,
            examples = report.examples_run,
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "campaign finished"
        );
    }
}
