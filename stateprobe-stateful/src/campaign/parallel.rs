//! Parallel campaigns across worker threads
//!
//! Workers claim example indices from a shared counter and run them exactly
//! as the sequential campaign would: every example is generated from
//! `derive_seed(root, index)` and shrinks deterministically. Reports are
//! assembled in example order and the lowest failing index wins, so a parallel
//! report equals the sequential report for the same seed. Coverage is kept per
//! example so examples past the first failure can be left out of it.

use stateprobe::{ConfigError, fresh_seed};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::{Campaign, CampaignReport, FailureRecord, OutcomeCoverage};
use crate::error::EngineError;
use crate::model::{Model, Subject};
use crate::runner::SequenceRunner;

/// Configuration for parallel execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Number of worker threads
    pub workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
        }
    }
}

impl ParallelConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }
        Ok(())
    }
}

struct WorkerTally<R> {
    completed: usize,
    failures: Vec<FailureRecord<R>>,
    coverage: Vec<(usize, OutcomeCoverage)>,
}

/// A campaign whose examples are spread over worker threads
pub struct ParallelCampaign<M: Model, F> {
    campaign: Campaign<M, F>,
    config: ParallelConfig,
}

impl<M, S, F> ParallelCampaign<M, F>
where
    M: Model,
    S: Subject<M>,
    F: Fn() -> S + Sync,
{
    pub fn new(campaign: Campaign<M, F>, config: ParallelConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { campaign, config })
    }

    pub fn campaign(&self) -> &Campaign<M, F> {
        &self.campaign
    }

    pub fn run(&self) -> Result<CampaignReport<M::Reason>, EngineError> {
        let settings = self.campaign.config();
        let workers = self.config.workers.min(settings.max_examples);
        if workers <= 1 {
            // Fall back to sequential execution
            return self.campaign.run();
        }

        let seed = settings.seed.unwrap_or_else(fresh_seed);
        info!(
            target: "stateprobe::campaign",
            seed,
            workers,
            max_examples = settings.max_examples,
            max_steps = settings.max_steps_per_sequence,
            fail_fast = settings.fail_fast,
            "parallel campaign started"
        );

        let next = AtomicUsize::new(0);
        let lowest_failure = AtomicUsize::new(usize::MAX);
        let (next, lowest_failure) = (&next, &lowest_failure);

        // Use crossbeam for scoped threads so workers can borrow the campaign
        let tallies = crossbeam::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| s.spawn(move |_| self.work(worker, seed, next, lowest_failure)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().map_err(|_| EngineError::WorkerPanicked).and_then(|tally| tally))
                .collect::<Result<Vec<_>, EngineError>>()
        })
        .map_err(|_| EngineError::WorkerPanicked)??;

        let completed: usize = tallies.iter().map(|tally| tally.completed).sum();
        let mut failures = Vec::new();
        let mut per_example = Vec::new();
        for tally in tallies {
            failures.extend(tally.failures);
            per_example.extend(tally.coverage);
        }
        failures.sort_by_key(|record: &FailureRecord<M::Reason>| record.example);

        let examples_run = match failures.first() {
            // Everything below the first failure has run; anything above is discarded
            Some(first) if settings.fail_fast => {
                let examples_run = first.example + 1;
                failures.truncate(1);
                examples_run
            }
            _ => completed,
        };
        let last_kept = match failures.first() {
            Some(first) if settings.fail_fast => first.example,
            _ => usize::MAX,
        };

        let mut report = CampaignReport::new(seed);
        report.examples_run = examples_run;
        report.failures = failures;
        report.cancelled = self.campaign.cancel.is_cancelled();
        for (_, coverage) in per_example.iter().filter(|(example, _)| *example <= last_kept) {
            report.coverage.merge(coverage);
        }
        self.campaign.finish(&report);
        Ok(report)
    }

    fn work(
        &self,
        worker: usize,
        seed: u64,
        next: &AtomicUsize,
        lowest_failure: &AtomicUsize,
    ) -> Result<WorkerTally<M::Reason>, EngineError> {
        let settings = self.campaign.config();
        let runner: SequenceRunner<'_, M, F> = self.campaign.runner();
        let mut tally = WorkerTally {
            completed: 0,
            failures: Vec::new(),
            coverage: Vec::new(),
        };

        loop {
            if self.campaign.cancel.is_cancelled() {
                break;
            }
            let example = next.fetch_add(1, Ordering::SeqCst);
            if example >= settings.max_examples {
                break;
            }
            if settings.fail_fast && example > lowest_failure.load(Ordering::SeqCst) {
                break;
            }

            let result = self.campaign.run_example(&runner, seed, example)?;
            if let Some(record) = result.failure {
                lowest_failure.fetch_min(example, Ordering::SeqCst);
                tally.failures.push(record);
            }
            tally.coverage.push((example, result.coverage));
            tally.completed += 1;
        }

        debug!(
            target: "stateprobe::campaign",
            worker,
            completed = tally.completed,
            failures = tally.failures.len(),
            "worker finished"
        );
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{CounterModel, CounterSubject, Flaw, counter_machine};
    use stateprobe::CampaignConfig;

    fn parallel(flaw: Flaw, config: CampaignConfig, workers: usize) -> ParallelCampaign<CounterModel, impl Fn() -> CounterSubject + Sync> {
        let campaign = Campaign::new(counter_machine().unwrap(), move || CounterSubject::new(flaw), config).unwrap();
        ParallelCampaign::new(campaign, ParallelConfig::default().with_workers(workers)).unwrap()
    }

    #[test]
    fn test_parallel_matches_sequential_fail_fast() {
        let config = CampaignConfig::default().seed(31337);
        let sequential = parallel(Flaw::LenientDecrement, config.clone(), 1).run().unwrap();
        let concurrent = parallel(Flaw::LenientDecrement, config, 4).run().unwrap();
        assert!(!sequential.passed());
        assert_eq!(sequential, concurrent);
    }

    #[test]
    fn test_parallel_matches_sequential_collect_all() {
        let config = CampaignConfig::default().seed(8).max_examples(40).fail_fast(false);
        let sequential = parallel(Flaw::LeakyDecrement, config.clone(), 1).run().unwrap();
        let concurrent = parallel(Flaw::LeakyDecrement, config, 3).run().unwrap();
        assert_eq!(sequential.examples_run, 40);
        assert_eq!(sequential, concurrent);
    }

    #[test]
    fn test_parallel_pass() {
        let config = CampaignConfig::default().seed(4).max_examples(64);
        let report = parallel(Flaw::None, config, 4).run().unwrap();
        assert!(report.passed());
        assert_eq!(report.examples_run, 64);
        assert_eq!(report.coverage.total(), 64 * 50);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let campaign = Campaign::new(
            counter_machine().unwrap(),
            || CounterSubject::new(Flaw::None),
            CampaignConfig::default(),
        )
        .unwrap();
        let err = ParallelCampaign::new(campaign, ParallelConfig::default().with_workers(0))
            .err()
            .unwrap();
        assert_eq!(err, EngineError::Config(ConfigError::InvalidWorkers(0)));
    }
}
