//! The bounded counter: a reference machine and an in-process subject
//!
//! The counter starts at zero. `increment` always succeeds, `decrement`
//! fails with [`CounterError::CounterMustBePositive`] at zero, and `add(n)`
//! fails with [`CounterError::AddMustExceedOne`] unless `n >= 2`. Failed
//! calls leave the counter unchanged.
//!
//! [`CounterSubject`] can be built with a [`Flaw`] that injects a known bug,
//! which is how the engine's detection and shrinking are exercised.

use serde::{Deserialize, Serialize};
use stateprobe::{IntGenerator, Value, ValueGenerator};
use std::fmt;

use crate::dsl::StateMachine;
use crate::error::{EngineError, SubjectError};
use crate::invariants::Check;
use crate::model::{Model, Subject};
use crate::operations::Rule;
use crate::outcome::Outcome;

pub const INCREMENT: &str = "increment";
pub const DECREMENT: &str = "decrement";
pub const ADD: &str = "add";

/// Bound on the magnitude of generated `add` amounts
pub const ADD_LIMIT: i64 = 1000;

/// Domain errors of the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CounterError {
    CounterMustBePositive,
    AddMustExceedOne,
}

/// Reference model of the counter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterModel {
    pub value: i64,
}

impl Model for CounterModel {
    type Reason = CounterError;
    type Snapshot = i64;
}

/// Generator for `add` amounts, covering both sides of the `n >= 2` boundary
pub fn add_amounts() -> Result<ValueGenerator<IntGenerator<i64>, i64>, EngineError> {
    Ok(ValueGenerator::new(IntGenerator::new(-ADD_LIMIT, ADD_LIMIT)?))
}

/// The counter state machine: three rules and two invariants
pub fn counter_machine() -> Result<StateMachine<CounterModel>, EngineError> {
    let increment = Rule::new(INCREMENT, |model: &mut CounterModel, _| {
        model.value = model.value.saturating_add(1);
        Ok(Outcome::ok())
    });

    let decrement = Rule::new(DECREMENT, |model: &mut CounterModel, _| {
        if model.value > 0 {
            model.value -= 1;
            Ok(Outcome::ok())
        } else {
            Ok(Outcome::failure(CounterError::CounterMustBePositive))
        }
    });

    let add = Rule::new(ADD, |model: &mut CounterModel, args| {
        let n = args.int(0)?;
        if n >= 2 {
            model.value = model.value.saturating_add(n);
            Ok(Outcome::ok())
        } else {
            Ok(Outcome::failure(CounterError::AddMustExceedOne))
        }
    })
    .arg("n", add_amounts()?);

    Ok(StateMachine::new(CounterModel::default())
        .rule(increment)
        .rule(decrement)
        .rule(add)
        .invariant("non_negative", |model: &CounterModel| model.value >= 0)
        .observed_invariant("counter_matches", |model: &CounterModel, counter: &i64| {
            Check::equal(model.value, *counter)
        }))
}

/// A known bug to inject into [`CounterSubject`]
///
/// The two decrement flaws are found by different checks. A lenient
/// decrement answers `ok` where the model predicts `CounterMustBePositive`,
/// so the step executor reports a divergence before any invariant runs. A
/// leaky decrement answers with the expected error, so the outcomes agree and
/// only the `counter_matches` invariant sees the counter at `-1` after the
/// step. That is the flaw to use when exercising the invariant checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flaw {
    /// Correct behavior
    #[default]
    None,
    /// Decrement at zero succeeds and goes negative; caught as a divergence
    LenientDecrement,
    /// Decrement at zero reports the error but decrements anyway; caught by
    /// the `counter_matches` invariant at checkpoint 1
    LeakyDecrement,
    /// `add(1)` is accepted
    UncheckedAdd,
}

impl Flaw {
    pub const ALL: [Flaw; 4] = [
        Flaw::None,
        Flaw::LenientDecrement,
        Flaw::LeakyDecrement,
        Flaw::UncheckedAdd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Flaw::None => "reference",
            Flaw::LenientDecrement => "lenient-decrement",
            Flaw::LeakyDecrement => "leaky-decrement",
            Flaw::UncheckedAdd => "unchecked-add",
        }
    }
}

impl fmt::Display for Flaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// In-process counter behind the subject interface
#[derive(Debug, Clone, Default)]
pub struct CounterSubject {
    counter: i64,
    flaw: Flaw,
}

impl CounterSubject {
    pub fn new(flaw: Flaw) -> Self {
        Self { counter: 0, flaw }
    }

    pub fn value(&self) -> i64 {
        self.counter
    }

    fn decrement(&mut self) -> Outcome<CounterError> {
        if self.counter > 0 {
            self.counter -= 1;
            return Outcome::ok();
        }
        match self.flaw {
            Flaw::LenientDecrement => {
                self.counter -= 1;
                Outcome::ok()
            }
            Flaw::LeakyDecrement => {
                self.counter -= 1;
                Outcome::failure(CounterError::CounterMustBePositive)
            }
            Flaw::None | Flaw::UncheckedAdd => Outcome::failure(CounterError::CounterMustBePositive),
        }
    }

    fn add(&mut self, n: i64) -> Outcome<CounterError> {
        let smallest = if self.flaw == Flaw::UncheckedAdd { 1 } else { 2 };
        if n >= smallest {
            self.counter = self.counter.saturating_add(n);
            Outcome::ok()
        } else {
            Outcome::failure(CounterError::AddMustExceedOne)
        }
    }
}

impl Subject<CounterModel> for CounterSubject {
    fn apply(&mut self, rule: &str, args: &[Value]) -> Result<Outcome<CounterError>, SubjectError> {
        match rule {
            INCREMENT => {
                self.counter = self.counter.saturating_add(1);
                Ok(Outcome::ok())
            }
            DECREMENT => Ok(self.decrement()),
            ADD => {
                let n = args
                    .first()
                    .and_then(Value::as_int)
                    .ok_or_else(|| SubjectError::Transport("add expects one integer".to_string()))?;
                Ok(self.add(n))
            }
            other => Err(SubjectError::Unsupported(other.to_string())),
        }
    }

    fn observe(&self) -> Option<i64> {
        Some(self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_shape() {
        let machine = counter_machine().unwrap();
        assert_eq!(machine.validate(), Ok(()));
        let names: Vec<&str> = machine.rules().rules().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec![INCREMENT, DECREMENT, ADD]);
        assert_eq!(machine.invariants().tags(), vec!["non_negative", "counter_matches"]);
        // Decrement stays eligible at zero so its error branch gets exercised
        assert_eq!(machine.rules().eligible(&CounterModel::default()).len(), 3);
    }

    #[test]
    fn test_model_effects() {
        let machine = counter_machine().unwrap();
        let rules = machine.rules();
        let mut model = CounterModel::default();

        let add = rules.get(ADD).unwrap();
        assert_eq!(
            add.apply(&mut model, &[Value::Int(1)]),
            Ok(Outcome::failure(CounterError::AddMustExceedOne))
        );
        assert_eq!(model.value, 0);
        assert_eq!(add.apply(&mut model, &[Value::Int(2)]), Ok(Outcome::ok()));
        assert_eq!(model.value, 2);

        let decrement = rules.get(DECREMENT).unwrap();
        assert_eq!(decrement.apply(&mut model, &[]), Ok(Outcome::ok()));
        assert_eq!(decrement.apply(&mut model, &[]), Ok(Outcome::ok()));
        assert_eq!(
            decrement.apply(&mut model, &[]),
            Ok(Outcome::failure(CounterError::CounterMustBePositive))
        );
        assert_eq!(model.value, 0);
    }

    #[test]
    fn test_saturating_add() {
        let machine = counter_machine().unwrap();
        let mut model = CounterModel { value: i64::MAX - 1 };
        let add = machine.rules().get(ADD).unwrap();
        assert_eq!(add.apply(&mut model, &[Value::Int(1000)]), Ok(Outcome::ok()));
        assert_eq!(model.value, i64::MAX);
    }

    #[test]
    fn test_flaws() {
        let mut lenient = CounterSubject::new(Flaw::LenientDecrement);
        assert_eq!(lenient.apply(DECREMENT, &[]), Ok(Outcome::ok()));
        assert_eq!(lenient.value(), -1);

        let mut leaky = CounterSubject::new(Flaw::LeakyDecrement);
        assert_eq!(
            leaky.apply(DECREMENT, &[]),
            Ok(Outcome::failure(CounterError::CounterMustBePositive))
        );
        assert_eq!(leaky.observe(), Some(-1));

        let mut unchecked = CounterSubject::new(Flaw::UncheckedAdd);
        assert_eq!(unchecked.apply(ADD, &[Value::Int(1)]), Ok(Outcome::ok()));
        assert_eq!(
            unchecked.apply(ADD, &[Value::Int(0)]),
            Ok(Outcome::failure(CounterError::AddMustExceedOne))
        );

        let mut reference = CounterSubject::new(Flaw::None);
        assert_eq!(
            reference.apply(ADD, &[]),
            Err(SubjectError::Transport("add expects one integer".to_string()))
        );
        assert_eq!(
            reference.apply("reset", &[]),
            Err(SubjectError::Unsupported("reset".to_string()))
        );
    }

    #[test]
    fn test_decrement_flaws_hit_different_checks() {
        use crate::failure::FailureClass;
        use crate::operations::{Sequence, Step};
        use crate::runner::SequenceRunner;

        let machine = counter_machine().unwrap();
        let sequence = Sequence::from_vec(vec![Step::bare(DECREMENT)]);
        let class_of = |flaw: Flaw| {
            let factory = move || CounterSubject::new(flaw);
            let replay = SequenceRunner::new(&machine, &factory).replay(&sequence).unwrap();
            replay.failure().map(|failure| (failure.checkpoint, failure.class()))
        };

        assert_eq!(class_of(Flaw::LenientDecrement), Some((1, FailureClass::Divergence)));
        assert_eq!(
            class_of(Flaw::LeakyDecrement),
            Some((1, FailureClass::Invariant("counter_matches".to_string())))
        );
        assert_eq!(class_of(Flaw::None), None);
    }

    #[test]
    fn test_flaw_names() {
        let names: Vec<String> = Flaw::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["reference", "lenient-decrement", "leaky-decrement", "unchecked-add"]
        );
    }

    #[test]
    fn test_error_codes_serialize() {
        assert_eq!(
            serde_json::to_string(&CounterError::CounterMustBePositive).unwrap(),
            r#""COUNTER_MUST_BE_POSITIVE""#
        );
    }
}
