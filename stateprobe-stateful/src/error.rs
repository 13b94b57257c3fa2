//! Engine and subject error types

use stateprobe::{ConfigError, ValueKind};

/// Errors that abort a run instead of being reported as a property failure
///
/// A property failure (divergence, violated invariant, unavailable subject) is
/// data carried by [`crate::failure::Failure`]. These errors mean the machine
/// or its configuration is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("rule registry is empty")]
    EmptyRegistry,

    #[error("rule `{0}` is registered more than once")]
    DuplicateRule(String),

    #[error("no rule is eligible in the initial model state")]
    NoEligibleRuleAtStart,

    #[error("unknown rule `{0}`")]
    UnknownRule(String),

    #[error("malformed arguments for rule `{rule}`: {detail}")]
    MalformedArguments { rule: String, detail: String },

    #[error("invariant `{tag}` reads the subject snapshot, but the subject cannot be observed")]
    ObservationUnavailable { tag: String },

    #[error("failed to start subject worker: {0}")]
    SubjectSpawn(String),

    #[error("campaign worker panicked")]
    WorkerPanicked,
}

impl EngineError {
    pub(crate) fn wrong_kind(rule: &str, index: usize, expected: ValueKind, found: Option<ValueKind>) -> Self {
        let detail = match found {
            Some(found) => format!("argument {} should be {}, found {}", index, expected, found),
            None => format!("argument {} ({}) is missing", index, expected),
        };
        EngineError::MalformedArguments {
            rule: rule.to_string(),
            detail,
        }
    }
}

/// Error reported by a subject adapter while serving a call
///
/// Both variants surface as an `Unavailable(Transport)` outcome; the message
/// travels along as the divergence detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("subject does not implement rule `{0}`")]
    Unsupported(String),
}
