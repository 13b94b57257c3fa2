//! Invariant checking for stateful properties
//!
//! Invariants are evaluated at every checkpoint: once on the initial state and
//! again after each committed step. They see the reference model and, for
//! invariants that ask for it, a snapshot observed from the subject.

use std::fmt::{self, Debug};
use std::marker::PhantomData;

use crate::error::EngineError;
use crate::failure::Violation;
use crate::model::Model;

/// Verdict of a single invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Holds,
    Violated { expected: String, actual: String },
}

impl Check {
    /// Holds when both sides are equal; otherwise records both
    pub fn equal<T: PartialEq + Debug>(expected: T, actual: T) -> Self {
        if expected == actual {
            Check::Holds
        } else {
            Check::Violated {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            }
        }
    }

    pub fn holds(&self) -> bool {
        matches!(self, Check::Holds)
    }
}

impl From<bool> for Check {
    fn from(holds: bool) -> Self {
        if holds {
            Check::Holds
        } else {
            Check::Violated {
                expected: "true".to_string(),
                actual: "false".to_string(),
            }
        }
    }
}

/// An invariant that must hold at every checkpoint
pub trait Invariant<M: Model>: Send + Sync {
    /// Tag identifying this invariant in reports and failure classes
    fn tag(&self) -> &str;

    /// Whether [`check`](Invariant::check) needs the subject snapshot
    fn reads_snapshot(&self) -> bool {
        false
    }

    fn check(&self, model: &M, snapshot: Option<&M::Snapshot>) -> Result<Check, EngineError>;
}

/// A simple function-based invariant over the model alone
pub struct FnInvariant<M, F, C> {
    tag: String,
    check_fn: F,
    _phantom: PhantomData<fn(&M) -> C>,
}

impl<M, F, C> FnInvariant<M, F, C>
where
    M: Model,
    F: Fn(&M) -> C,
    C: Into<Check>,
{
    pub fn new(tag: impl Into<String>, check_fn: F) -> Self {
        Self {
            tag: tag.into(),
            check_fn,
            _phantom: PhantomData,
        }
    }
}

impl<M, F, C> Invariant<M> for FnInvariant<M, F, C>
where
    M: Model,
    F: Fn(&M) -> C + Send + Sync,
    C: Into<Check>,
{
    fn tag(&self) -> &str {
        &self.tag
    }

    fn check(&self, model: &M, _snapshot: Option<&M::Snapshot>) -> Result<Check, EngineError> {
        Ok((self.check_fn)(model).into())
    }
}

/// An invariant relating the model to what the subject exposes
pub struct ObservedInvariant<M, F, C> {
    tag: String,
    check_fn: F,
    _phantom: PhantomData<fn(&M) -> C>,
}

impl<M, F, C> ObservedInvariant<M, F, C>
where
    M: Model,
    F: Fn(&M, &M::Snapshot) -> C,
    C: Into<Check>,
{
    pub fn new(tag: impl Into<String>, check_fn: F) -> Self {
        Self {
            tag: tag.into(),
            check_fn,
            _phantom: PhantomData,
        }
    }
}

impl<M, F, C> Invariant<M> for ObservedInvariant<M, F, C>
where
    M: Model,
    F: Fn(&M, &M::Snapshot) -> C + Send + Sync,
    C: Into<Check>,
{
    fn tag(&self) -> &str {
        &self.tag
    }

    fn reads_snapshot(&self) -> bool {
        true
    }

    fn check(&self, model: &M, snapshot: Option<&M::Snapshot>) -> Result<Check, EngineError> {
        let snapshot = snapshot.ok_or_else(|| EngineError::ObservationUnavailable {
            tag: self.tag.clone(),
        })?;
        Ok((self.check_fn)(model, snapshot).into())
    }
}

/// A collection of invariants to check, in registration order
pub struct InvariantSet<M: Model> {
    invariants: Vec<Box<dyn Invariant<M>>>,
}

impl<M: Model> InvariantSet<M> {
    /// Create a new empty invariant set
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    /// Add an invariant
    pub fn add<I: Invariant<M> + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Add a function-based invariant over the model
    pub fn add_fn<F, C>(&mut self, tag: impl Into<String>, check_fn: F)
    where
        F: Fn(&M) -> C + Send + Sync + 'static,
        C: Into<Check> + 'static,
    {
        self.add(FnInvariant::new(tag, check_fn));
    }

    /// Add an invariant over the model and the subject snapshot
    pub fn add_observed<F, C>(&mut self, tag: impl Into<String>, check_fn: F)
    where
        F: Fn(&M, &M::Snapshot) -> C + Send + Sync + 'static,
        C: Into<Check> + 'static,
    {
        self.add(ObservedInvariant::new(tag, check_fn));
    }

    /// Whether any invariant needs the subject to be observed
    pub fn reads_snapshot(&self) -> bool {
        self.invariants.iter().any(|inv| inv.reads_snapshot())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.invariants.iter().map(|inv| inv.tag()).collect()
    }

    /// Check all invariants, returning every violation in registration order
    pub fn check_all(
        &self,
        model: &M,
        snapshot: Option<&M::Snapshot>,
    ) -> Result<Vec<InvariantViolation>, EngineError> {
        let mut violations = Vec::new();
        for inv in &self.invariants {
            if let Check::Violated { expected, actual } = inv.check(model, snapshot)? {
                violations.push(InvariantViolation {
                    tag: inv.tag().to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(violations)
    }

    /// Get the number of invariants
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if there are no invariants
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

impl<M: Model> Default for InvariantSet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Debug for InvariantSet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tags()).finish()
    }
}

/// Represents a violation of an invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub tag: String,
    pub expected: String,
    pub actual: String,
}

impl InvariantViolation {
    pub fn into_violation<R>(self) -> Violation<R> {
        Violation::Invariant {
            tag: self.tag,
            expected: self.expected,
            actual: self.actual,
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invariant `{}` violated: expected {}, found {}",
            self.tag, self.expected, self.actual
        )
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone)]
    struct Counter {
        value: i32,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    enum Never {}

    impl Model for Counter {
        type Reason = Never;
        type Snapshot = i32;
    }

    #[test]
    fn test_fn_invariant() {
        let inv = FnInvariant::new("non_negative", |state: &Counter| state.value >= 0);

        assert_eq!(inv.check(&Counter { value: 5 }, None), Ok(Check::Holds));
        assert!(!inv.check(&Counter { value: -1 }, None).unwrap().holds());
        assert!(!inv.reads_snapshot());
    }

    #[test]
    fn test_observed_invariant() {
        let inv = ObservedInvariant::new("matches", |state: &Counter, seen: &i32| {
            Check::equal(state.value, *seen)
        });
        assert!(inv.reads_snapshot());
        assert_eq!(inv.check(&Counter { value: 2 }, Some(&2)), Ok(Check::Holds));
        assert_eq!(
            inv.check(&Counter { value: 2 }, Some(&3)),
            Ok(Check::Violated {
                expected: "2".to_string(),
                actual: "3".to_string()
            })
        );
        assert_eq!(
            inv.check(&Counter { value: 2 }, None),
            Err(EngineError::ObservationUnavailable {
                tag: "matches".to_string()
            })
        );
    }

    #[test]
    fn test_invariant_set_reports_every_violation() {
        let mut set = InvariantSet::new();
        set.add_fn("non_negative", |state: &Counter| state.value >= 0);
        set.add_fn("less_than_100", |state: &Counter| state.value < 100);
        set.add_fn("even", |state: &Counter| state.value % 2 == 0);
        assert!(!set.reads_snapshot());
        assert_eq!(set.len(), 3);

        assert!(set.check_all(&Counter { value: 50 }, None).unwrap().is_empty());

        let tags: Vec<String> = set
            .check_all(&Counter { value: -5 }, None)
            .unwrap()
            .into_iter()
            .map(|v| v.tag)
            .collect();
        assert_eq!(tags, vec!["non_negative", "even"]);
    }

    #[test]
    fn test_violation_display() {
        let violation = InvariantViolation {
            tag: "counter_matches".to_string(),
            expected: "0".to_string(),
            actual: "-1".to_string(),
        };
        assert_eq!(
            violation.to_string(),
            "Invariant `counter_matches` violated: expected 0, found -1"
        );
    }
}
