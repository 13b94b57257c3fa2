//! What went wrong, and where

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::outcome::{Outcome, Unavailable};

/// A property violation observed at one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation<R> {
    /// The subject's outcome differs from the model's prediction
    Divergence {
        rule: String,
        expected: Outcome<R>,
        actual: Outcome<R>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A registered invariant does not hold
    Invariant {
        tag: String,
        expected: String,
        actual: String,
    },
    /// The subject could not be observed for snapshot invariants
    Unobservable {
        unavailable: Unavailable,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

/// Failure class the shrinker must preserve
///
/// Two failures are "the same bug" when their classes are equal: any
/// divergence on a reachable outcome, the same violated invariant, or the same
/// kind of unavailability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Divergence,
    Invariant(String),
    Unavailable(Unavailable),
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Divergence => write!(f, "divergence"),
            FailureClass::Invariant(tag) => write!(f, "invariant `{}`", tag),
            FailureClass::Unavailable(kind) => write!(f, "{}", kind),
        }
    }
}

impl<R> Violation<R> {
    pub fn class(&self) -> FailureClass {
        match self {
            Violation::Divergence { actual, .. } => match actual.unavailable() {
                Some(kind) => FailureClass::Unavailable(kind),
                None => FailureClass::Divergence,
            },
            Violation::Invariant { tag, .. } => FailureClass::Invariant(tag.clone()),
            Violation::Unobservable { unavailable, .. } => FailureClass::Unavailable(*unavailable),
        }
    }
}

impl<R: Debug> fmt::Display for Violation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Divergence {
                rule,
                expected,
                actual,
                detail,
            } => {
                write!(f, "`{}` diverged: model expected {}, subject returned {}", rule, expected, actual)?;
                if let Some(detail) = detail {
                    write!(f, " ({})", detail)?;
                }
                Ok(())
            }
            Violation::Invariant { tag, expected, actual } => {
                write!(f, "invariant `{}` violated: expected {}, found {}", tag, expected, actual)
            }
            Violation::Unobservable { unavailable, detail } => {
                write!(f, "subject could not be observed: {}", unavailable)?;
                if let Some(detail) = detail {
                    write!(f, " ({})", detail)?;
                }
                Ok(())
            }
        }
    }
}

/// A violation together with the checkpoint it was found at
///
/// Checkpoint 0 is the initial state; checkpoint `k` is the state after the
/// `k`-th step. The steps up to and including the checkpoint reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure<R> {
    pub checkpoint: usize,
    pub violation: Violation<R>,
}

impl<R> Failure<R> {
    pub fn new(checkpoint: usize, violation: Violation<R>) -> Self {
        Self { checkpoint, violation }
    }

    pub fn class(&self) -> FailureClass {
        self.violation.class()
    }
}

impl<R: Debug> fmt::Display for Failure<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at checkpoint {}: {}", self.checkpoint, self.violation)
    }
}
