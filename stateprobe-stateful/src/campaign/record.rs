//! Failure records and campaign reports

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use super::coverage::OutcomeCoverage;
use crate::failure::{Failure, FailureClass, Violation};
use crate::operations::{Sequence, ShrinkStats};

/// Everything needed to reproduce and understand one failure
///
/// Records carry no timestamps or host data: the same seed and configuration
/// produce a byte-identical serialized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord<R> {
    /// Root seed of the campaign
    pub seed: u64,
    /// Index of the failing example within the campaign
    pub example: usize,
    /// Seed the example's sequence was generated from
    pub example_seed: u64,
    /// Minimal reproducing sequence
    pub sequence: Sequence,
    /// Checkpoint of the failure within `sequence`
    pub checkpoint: usize,
    pub class: FailureClass,
    pub violation: Violation<R>,
    /// Length of the sequence before shrinking
    pub original_length: usize,
    pub shrink: ShrinkStats,
}

impl<R: Clone> FailureRecord<R> {
    pub fn failure(&self) -> Failure<R> {
        Failure::new(self.checkpoint, self.violation.clone())
    }
}

impl<R: Serialize> FailureRecord<R> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<R: for<'de> Deserialize<'de>> FailureRecord<R> {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl<R: Debug> fmt::Display for FailureRecord<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Falsified at example {} (seed {}, example seed {})",
            self.example, self.seed, self.example_seed
        )?;
        write!(
            f,
            "\n  Minimal sequence ({} of {} steps):",
            self.sequence.len(),
            self.original_length
        )?;
        for (idx, step) in self.sequence.steps().iter().enumerate() {
            write!(f, "\n    {}. {}", idx + 1, step)?;
        }
        write!(f, "\n  Failure at checkpoint {}: {}", self.checkpoint, self.violation)?;
        write!(
            f,
            "\n  Shrinking: {} accepted of {} replays",
            self.shrink.accepted, self.shrink.attempts
        )?;
        if !self.shrink.completed {
            write!(f, " (stopped early)")?;
        }
        Ok(())
    }
}

/// Summary of a whole campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport<R> {
    pub seed: u64,
    /// Examples that ran to completion
    pub examples_run: usize,
    /// Failures in example order; at most one when failing fast
    pub failures: Vec<FailureRecord<R>>,
    pub cancelled: bool,
    /// Outcome labels per rule over every example run
    #[serde(default)]
    pub coverage: OutcomeCoverage,
}

impl<R> CampaignReport<R> {
    /// An empty report for a campaign rooted at `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            examples_run: 0,
            failures: Vec::new(),
            cancelled: false,
            coverage: OutcomeCoverage::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&FailureRecord<R>> {
        self.failures.first()
    }
}

impl<R: Debug> fmt::Display for CampaignReport<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(f, "OK, passed {} examples (seed {})", self.examples_run, self.seed)?;
        } else {
            write!(
                f,
                "FAILED, {} failure(s) in {} examples (seed {})",
                self.failures.len(),
                self.examples_run,
                self.seed
            )?;
        }
        if self.cancelled {
            write!(f, ", cancelled")?;
        }
        Ok(())
    }
}
