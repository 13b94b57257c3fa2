//! Domain-specific language for describing a state machine under test

use std::fmt::{self, Debug};

use crate::error::EngineError;
use crate::invariants::{Check, InvariantSet};
use crate::model::Model;
use crate::operations::{Rule, RuleRegistry};

/// The reference side of a stateful property: an initial model, the rules
/// that evolve it and the invariants that must hold along the way
///
/// ```
/// use stateprobe_stateful::prelude::*;
///
/// let machine = counter_machine().unwrap();
/// assert!(machine.validate().is_ok());
/// assert_eq!(machine.rules().len(), 3);
/// ```
pub struct StateMachine<M: Model> {
    initial: M,
    rules: RuleRegistry<M>,
    invariants: InvariantSet<M>,
    duplicates: Vec<String>,
}

impl<M: Model> StateMachine<M> {
    /// Create a new machine starting from `initial`
    pub fn new(initial: M) -> Self {
        Self {
            initial,
            rules: RuleRegistry::new(),
            invariants: InvariantSet::new(),
            duplicates: Vec::new(),
        }
    }

    /// Register a rule; name clashes are reported by [`validate`](Self::validate)
    pub fn rule(mut self, rule: Rule<M>) -> Self {
        let name = rule.name().to_string();
        if self.rules.register(rule).is_err() {
            self.duplicates.push(name);
        }
        self
    }

    /// Add an invariant over the model, checked at every checkpoint
    pub fn invariant<F, C>(mut self, tag: impl Into<String>, check_fn: F) -> Self
    where
        F: Fn(&M) -> C + Send + Sync + 'static,
        C: Into<Check> + 'static,
    {
        self.invariants.add_fn(tag, check_fn);
        self
    }

    /// Add an invariant relating the model to the subject snapshot
    pub fn observed_invariant<F, C>(mut self, tag: impl Into<String>, check_fn: F) -> Self
    where
        F: Fn(&M, &M::Snapshot) -> C + Send + Sync + 'static,
        C: Into<Check> + 'static,
    {
        self.invariants.add_observed(tag, check_fn);
        self
    }

    pub fn initial_model(&self) -> &M {
        &self.initial
    }

    pub fn rules(&self) -> &RuleRegistry<M> {
        &self.rules
    }

    pub fn invariants(&self) -> &InvariantSet<M> {
        &self.invariants
    }

    /// Setup checks: a non-empty registry of distinct rules, at least one of
    /// which is eligible in the initial state
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some(name) = self.duplicates.first() {
            return Err(EngineError::DuplicateRule(name.clone()));
        }
        if self.rules.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }
        if self.rules.eligible(&self.initial).is_empty() {
            return Err(EngineError::NoEligibleRuleAtStart);
        }
        Ok(())
    }
}

impl<M: Model> Debug for StateMachine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("initial", &self.initial)
            .field("rules", &self.rules)
            .field("invariants", &self.invariants)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Outcome;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default)]
    struct Queue {
        len: usize,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    enum QueueError {
        Empty,
    }

    impl Model for Queue {
        type Reason = QueueError;
        type Snapshot = usize;
    }

    fn enqueue() -> Rule<Queue> {
        Rule::new("enqueue", |q: &mut Queue, _| {
            q.len += 1;
            Ok(Outcome::ok())
        })
    }

    fn dequeue() -> Rule<Queue> {
        Rule::new("dequeue", |q: &mut Queue, _| {
            q.len -= 1;
            Ok(Outcome::ok())
        })
        .precondition(|q: &Queue| q.len > 0)
    }

    #[test]
    fn test_valid_machine() {
        let machine = StateMachine::new(Queue::default())
            .rule(enqueue())
            .rule(dequeue())
            .observed_invariant("len_matches", |q: &Queue, seen: &usize| Check::equal(q.len, *seen));
        assert_eq!(machine.validate(), Ok(()));
        assert!(machine.invariants().reads_snapshot());
    }

    #[test]
    fn test_empty_registry() {
        let machine = StateMachine::new(Queue::default());
        assert_eq!(machine.validate(), Err(EngineError::EmptyRegistry));
    }

    #[test]
    fn test_duplicate_rule() {
        let machine = StateMachine::new(Queue::default()).rule(enqueue()).rule(enqueue());
        assert_eq!(
            machine.validate(),
            Err(EngineError::DuplicateRule("enqueue".to_string()))
        );
    }

    #[test]
    fn test_no_eligible_rule_at_start() {
        let machine = StateMachine::new(Queue::default()).rule(dequeue());
        assert_eq!(machine.validate(), Err(EngineError::NoEligibleRuleAtStart));

        // Eligible once the initial state allows it
        let machine = StateMachine::new(Queue { len: 1 }).rule(dequeue());
        assert_eq!(machine.validate(), Ok(()));
    }
}
