//! Outcomes compared between the reference model and the subject

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use stateprobe::Value;
use std::fmt::{self, Debug};

/// Bound for the domain error reasons a model can predict
///
/// Reasons are compared for equality with what the subject reports, printed in
/// failure reports and written to failure records.
pub trait Reason: Clone + Debug + Eq + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Reason for T where T: Clone + Debug + Eq + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Why the subject produced no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    /// The call did not complete within the subject timeout
    Timeout,
    /// The adapter failed to deliver the call or read the answer
    Transport,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Timeout => write!(f, "SUBJECT_TIMEOUT"),
            Unavailable::Transport => write!(f, "SUBJECT_UNAVAILABLE"),
        }
    }
}

/// Result of applying one step, either predicted by the model or observed on
/// the subject
///
/// The model never predicts `Unavailable`, so any unavailable answer from the
/// subject is a divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<R> {
    Success(Value),
    Failure(R),
    Unavailable(Unavailable),
}

impl<R> Outcome<R> {
    /// Success with no payload
    pub fn ok() -> Self {
        Outcome::Success(Value::Unit)
    }

    /// Success carrying a payload
    pub fn success(value: impl Into<Value>) -> Self {
        Outcome::Success(value.into())
    }

    pub fn failure(reason: R) -> Self {
        Outcome::Failure(reason)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn unavailable(&self) -> Option<Unavailable> {
        match self {
            Outcome::Unavailable(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl<R: Debug> fmt::Display for Outcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(Value::Unit) => write!(f, "ok"),
            Outcome::Success(value) => write!(f, "ok({})", value),
            Outcome::Failure(reason) => write!(f, "error({:?})", reason),
            Outcome::Unavailable(kind) => write!(f, "{}", kind),
        }
    }
}
