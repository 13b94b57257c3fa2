//! Steps, sequences, rules and sequence shrinking

pub mod rule;
pub mod shrinking;
pub mod weighted;

use serde::{Deserialize, Serialize};
use stateprobe::Value;
use std::fmt;
use std::ops::Range;

pub use rule::{ArgSpec, Args, Rule, RuleRegistry};
pub use shrinking::{ShrinkOutcome, ShrinkStats, Shrinker};
pub use weighted::WeightedIndex;

/// One rule application with concrete arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub rule: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl Step {
    pub fn new(rule: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            rule: rule.into(),
            args,
        }
    }

    /// A step whose rule takes no arguments
    pub fn bare(rule: impl Into<String>) -> Self {
        Self::new(rule, Vec::new())
    }

    /// Sum of the argument complexities
    pub fn complexity(&self) -> u128 {
        self.args.iter().map(Value::complexity).sum()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// A sequence of steps to be executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence {
    steps: Vec<Step>,
}

impl Sequence {
    /// Create a new empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a vector of steps
    pub fn from_vec(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Add a step to the sequence
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Get the steps
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    /// The prefix reproducing a failure found at `checkpoint`
    pub fn truncated(&self, checkpoint: usize) -> Self {
        Self::from_vec(self.steps[..checkpoint.min(self.steps.len())].to_vec())
    }

    /// A copy with the steps in `range` removed
    pub fn without(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.steps.len());
        let start = range.start.min(end);
        let mut steps = Vec::with_capacity(self.steps.len() - (end - start));
        steps.extend_from_slice(&self.steps[..start]);
        steps.extend_from_slice(&self.steps[end..]);
        Self::from_vec(steps)
    }

    /// A copy with one argument of one step replaced
    pub fn with_arg(&self, step: usize, arg: usize, value: Value) -> Self {
        let mut copy = self.clone();
        if let Some(slot) = copy.steps.get_mut(step).and_then(|s| s.args.get_mut(arg)) {
            *slot = value;
        }
        copy
    }

    /// Total argument complexity across all steps
    pub fn complexity(&self) -> u128 {
        self.steps.iter().map(Step::complexity).sum()
    }

    /// Shortlex order: fewer steps first, then lower argument complexity
    pub fn is_simpler_than(&self, other: &Sequence) -> bool {
        (self.len(), self.complexity()) < (other.len(), other.complexity())
    }
}

impl FromIterator<Step> for Sequence {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", steps.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sequence {
        vec![
            Step::bare("increment"),
            Step::new("add", vec![Value::Int(5)]),
            Step::bare("decrement"),
            Step::new("add", vec![Value::Int(-3)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_display() {
        assert_eq!(
            sample().to_string(),
            "[increment, add(5), decrement, add(-3)]"
        );
        assert_eq!(Sequence::new().to_string(), "[]");
    }

    #[test]
    fn test_truncated_and_without() {
        let seq = sample();
        assert_eq!(seq.truncated(2).steps(), &seq.steps()[..2]);
        assert_eq!(seq.truncated(0), Sequence::new());
        assert_eq!(seq.truncated(99), seq);

        let removed = seq.without(1..3);
        assert_eq!(removed.to_string(), "[increment, add(-3)]");
        assert_eq!(seq.without(3..10).len(), 3);
    }

    #[test]
    fn test_with_arg() {
        let seq = sample().with_arg(1, 0, Value::Int(2));
        assert_eq!(seq.steps()[1].args, vec![Value::Int(2)]);
        // Out-of-range positions leave the sequence untouched
        assert_eq!(sample().with_arg(0, 0, Value::Int(1)), sample());
    }

    #[test]
    fn test_simplicity_order() {
        let seq = sample();
        assert!(seq.without(0..1).is_simpler_than(&seq));
        assert!(seq.with_arg(1, 0, Value::Int(2)).is_simpler_than(&seq));
        assert!(!seq.is_simpler_than(&seq));
        assert!(!seq.with_arg(1, 0, Value::Int(50)).is_simpler_than(&seq));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&sample().truncated(2)).unwrap();
        assert_eq!(json, r#"[{"rule":"increment"},{"rule":"add","args":[{"int":5}]}]"#);
        let back: Sequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample().truncated(2));
    }
}
