//! Per-rule outcome counts gathered over a campaign
//!
//! A passing campaign says little unless every branch of every rule was
//! reached. Each generated step that completes is counted under its rule and
//! an outcome label: `ok` for a success, the serialized reason for an
//! expected failure, and the unavailability code otherwise. Shrink replays are
//! not counted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use crate::operations::Sequence;
use crate::outcome::Outcome;

/// Label counted for a successful step
pub const SUCCESS_LABEL: &str = "ok";

/// Outcome label of a step, as tallied by [`OutcomeCoverage`]
///
/// Reasons that serialize to a string (unit enum variants) use that string, so
/// labels match the reason codes written to failure records.
pub fn outcome_label<R: Serialize + Debug>(outcome: &Outcome<R>) -> String {
    match outcome {
        Outcome::Success(_) => SUCCESS_LABEL.to_string(),
        Outcome::Failure(reason) => match serde_json::to_value(reason) {
            Ok(serde_json::Value::String(code)) => code,
            Ok(other) => other.to_string(),
            Err(_) => format!("{:?}", reason),
        },
        Outcome::Unavailable(kind) => kind.to_string(),
    }
}

/// Counts of outcome labels per rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeCoverage {
    rules: BTreeMap<String, BTreeMap<String, usize>>,
}

impl OutcomeCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<R: Serialize + Debug>(&mut self, rule: &str, outcome: &Outcome<R>) {
        *self
            .rules
            .entry(rule.to_string())
            .or_default()
            .entry(outcome_label(outcome))
            .or_insert(0) += 1;
    }

    /// Count the agreed outcomes of a generated sequence, step by step
    pub fn record_run<R: Serialize + Debug>(&mut self, sequence: &Sequence, outcomes: &[Outcome<R>]) {
        for (step, outcome) in sequence.steps().iter().zip(outcomes) {
            self.record(&step.rule, outcome);
        }
    }

    pub fn merge(&mut self, other: &OutcomeCoverage) {
        for (rule, labels) in &other.rules {
            let counts = self.rules.entry(rule.clone()).or_default();
            for (label, count) in labels {
                *counts.entry(label.clone()).or_insert(0) += count;
            }
        }
    }

    pub fn count(&self, rule: &str, label: &str) -> usize {
        self.rules
            .get(rule)
            .and_then(|labels| labels.get(label))
            .copied()
            .unwrap_or(0)
    }

    /// Label counts of one rule, in label order
    pub fn labels(&self, rule: &str) -> Option<&BTreeMap<String, usize>> {
        self.rules.get(rule)
    }

    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Steps counted across every rule
    pub fn total(&self) -> usize {
        self.rules.values().flat_map(|labels| labels.values()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Display for OutcomeCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (rule, labels)) in self.rules.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            let total: usize = labels.values().sum();
            write!(f, "{}:", rule)?;
            for (pos, (label, count)) in labels.iter().enumerate() {
                let separator = if pos == 0 { " " } else { ", " };
                let percentage = *count as f64 / total as f64 * 100.0;
                write!(f, "{}{} {} ({:.1}%)", separator, label, count, percentage)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CounterError;
    use crate::operations::Step;
    use crate::outcome::Unavailable;
    use stateprobe::Value;

    #[test]
    fn test_labels() {
        assert_eq!(outcome_label::<CounterError>(&Outcome::ok()), "ok");
        assert_eq!(outcome_label::<CounterError>(&Outcome::success(3i64)), "ok");
        assert_eq!(
            outcome_label(&Outcome::failure(CounterError::AddMustExceedOne)),
            "ADD_MUST_EXCEED_ONE"
        );
        assert_eq!(
            outcome_label::<CounterError>(&Outcome::Unavailable(Unavailable::Timeout)),
            "SUBJECT_TIMEOUT"
        );
    }

    #[test]
    fn test_record_run_and_merge() {
        let sequence = Sequence::from_vec(vec![
            Step::bare("decrement"),
            Step::bare("increment"),
            Step::bare("decrement"),
            Step::new("add", vec![Value::Int(1)]),
        ]);
        let outcomes = vec![
            Outcome::failure(CounterError::CounterMustBePositive),
            Outcome::ok(),
            Outcome::ok(),
        ];

        let mut coverage = OutcomeCoverage::new();
        coverage.record_run(&sequence, &outcomes);
        // Steps without an agreed outcome are not counted
        assert_eq!(coverage.total(), 3);
        assert_eq!(coverage.count("add", "ok"), 0);
        assert_eq!(coverage.count("decrement", "COUNTER_MUST_BE_POSITIVE"), 1);

        let mut merged = coverage.clone();
        merged.merge(&coverage);
        assert_eq!(merged.count("decrement", "ok"), 2);
        assert_eq!(merged.count("increment", "ok"), 2);
        assert_eq!(merged.rules().collect::<Vec<_>>(), vec!["decrement", "increment"]);
        assert_eq!(
            merged.to_string(),
            "decrement: COUNTER_MUST_BE_POSITIVE 2 (50.0%), ok 2 (50.0%)\nincrement: ok 2 (100.0%)"
        );
    }

    #[test]
    fn test_serializes_as_nested_map() {
        let mut coverage = OutcomeCoverage::new();
        coverage.record::<CounterError>("increment", &Outcome::ok());
        let json = serde_json::to_string(&coverage).unwrap();
        assert_eq!(json, r#"{"increment":{"ok":1}}"#);
        assert_eq!(serde_json::from_str::<OutcomeCoverage>(&json).unwrap(), coverage);
        assert!(OutcomeCoverage::new().is_empty());
    }
}
