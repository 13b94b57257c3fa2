//! Model-based testing - the reference model and the subject it is compared against

pub(crate) mod worker;

use stateprobe::Value;
use std::fmt::Debug;

use crate::error::SubjectError;
use crate::outcome::{Outcome, Reason};

/// A reference model: a pure value describing the expected state of the system
///
/// The model itself carries no behavior; rule effects registered on the
/// [`StateMachine`](crate::dsl::StateMachine) compute the next model and the
/// expected outcome. Models are cloned before every step so a rejected step
/// never leaves a partial update behind.
pub trait Model: Clone + Debug + Send + Sync + 'static {
    /// Domain error reasons both the model and the subject can report
    type Reason: Reason;

    /// What the subject exposes for snapshot invariants
    type Snapshot: Debug + Send + 'static;
}

/// The system under test, reached through an adapter
///
/// A fresh subject is built for every sequence and every replay, so an
/// implementation only has to reset to its initial state on construction.
pub trait Subject<M: Model>: Send + 'static {
    /// Apply the named rule with its arguments and report what happened
    ///
    /// Domain errors are `Ok(Outcome::Failure(..))`. An `Err` means the call
    /// could not be carried out at all and surfaces as an unavailable outcome.
    fn apply(&mut self, rule: &str, args: &[Value]) -> Result<Outcome<M::Reason>, SubjectError>;

    /// Current externally visible state, if the subject can be observed
    fn observe(&self) -> Option<M::Snapshot> {
        None
    }
}

impl<M: Model> Subject<M> for Box<dyn Subject<M>> {
    fn apply(&mut self, rule: &str, args: &[Value]) -> Result<Outcome<M::Reason>, SubjectError> {
        (**self).apply(rule, args)
    }

    fn observe(&self) -> Option<M::Snapshot> {
        (**self).observe()
    }
}
