//! Subject dispatch, either inline or on a worker thread with a per-call deadline

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use stateprobe::Value;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Model, Subject};
use crate::error::{EngineError, SubjectError};
use crate::outcome::{Outcome, Unavailable};

/// The subject did not answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outage {
    pub kind: Unavailable,
    pub detail: Option<String>,
}

impl Outage {
    fn timeout() -> Self {
        Self {
            kind: Unavailable::Timeout,
            detail: None,
        }
    }

    fn transport(detail: &str) -> Self {
        Self {
            kind: Unavailable::Transport,
            detail: Some(detail.to_string()),
        }
    }
}

impl From<SubjectError> for Outage {
    fn from(err: SubjectError) -> Self {
        Self {
            kind: Unavailable::Transport,
            detail: Some(err.to_string()),
        }
    }
}

/// One live subject for the duration of a sequence or replay
pub(crate) enum SubjectHandle<M: Model, S> {
    Inline(S),
    Worker(SubjectWorker<M>),
}

impl<M: Model, S: Subject<M>> SubjectHandle<M, S> {
    /// Without a timeout the subject is called on the current thread
    pub(crate) fn start(subject: S, timeout: Option<Duration>) -> Result<Self, EngineError> {
        match timeout {
            None => Ok(SubjectHandle::Inline(subject)),
            Some(timeout) => SubjectWorker::spawn(subject, timeout).map(SubjectHandle::Worker),
        }
    }

    /// Apply a step; failures to answer become an unavailable outcome plus detail
    pub(crate) fn apply(&mut self, rule: &str, args: &[Value]) -> (Outcome<M::Reason>, Option<String>) {
        let answer = match self {
            SubjectHandle::Inline(subject) => {
                catch_panic(|| subject.apply(rule, args)).and_then(|result| result.map_err(Outage::from))
            }
            SubjectHandle::Worker(worker) => worker.apply(rule, args),
        };
        match answer {
            Ok(outcome) => (outcome, None),
            Err(outage) => {
                debug!(
                    target: "stateprobe::subject",
                    rule,
                    kind = %outage.kind,
                    detail = outage.detail.as_deref().unwrap_or(""),
                    "subject did not answer"
                );
                (Outcome::Unavailable(outage.kind), outage.detail)
            }
        }
    }

    pub(crate) fn observe(&mut self) -> Result<Option<M::Snapshot>, Outage> {
        match self {
            SubjectHandle::Inline(subject) => catch_panic(|| subject.observe()),
            SubjectHandle::Worker(worker) => worker.observe(),
        }
    }
}

/// A panicking inline subject is a transport failure, as it is on a worker
fn catch_panic<T>(call: impl FnOnce() -> T) -> Result<T, Outage> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|_| Outage::transport("subject panicked"))
}

enum Request {
    Apply { rule: String, args: Vec<Value> },
    Observe,
}

enum Reply<M: Model> {
    Applied(Result<Outcome<M::Reason>, SubjectError>),
    Observed(Option<M::Snapshot>),
}

/// A subject owned by a dedicated thread
///
/// Every call waits at most `timeout` for its reply. After the first timeout
/// the worker is considered stalled: later calls fail immediately and the
/// thread is detached on drop instead of joined.
pub(crate) struct SubjectWorker<M: Model> {
    requests: Option<Sender<Request>>,
    replies: Receiver<Reply<M>>,
    timeout: Duration,
    thread: Option<JoinHandle<()>>,
    stalled: bool,
}

impl<M: Model> SubjectWorker<M> {
    fn spawn<S: Subject<M>>(mut subject: S, timeout: Duration) -> Result<Self, EngineError> {
        let (request_tx, request_rx) = channel::unbounded::<Request>();
        let (reply_tx, reply_rx) = channel::unbounded::<Reply<M>>();

        let thread = thread::Builder::new()
            .name("stateprobe-subject".to_string())
            .spawn(move || {
                for request in request_rx {
                    let reply = match request {
                        Request::Apply { rule, args } => Reply::Applied(subject.apply(&rule, &args)),
                        Request::Observe => Reply::Observed(subject.observe()),
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| EngineError::SubjectSpawn(err.to_string()))?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            timeout,
            thread: Some(thread),
            stalled: false,
        })
    }

    fn call(&mut self, request: Request) -> Result<Reply<M>, Outage> {
        if self.stalled {
            return Err(Outage::timeout());
        }
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|requests| requests.send(request).is_ok());
        if !sent {
            return Err(Outage::transport("subject worker has exited"));
        }

        match self.replies.recv_timeout(self.timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                self.stalled = true;
                warn!(
                    target: "stateprobe::subject",
                    timeout_ms = self.timeout.as_millis() as u64,
                    "subject call timed out, abandoning worker"
                );
                Err(Outage::timeout())
            }
            Err(RecvTimeoutError::Disconnected) => Err(Outage::transport("subject worker exited mid-call")),
        }
    }

    fn apply(&mut self, rule: &str, args: &[Value]) -> Result<Outcome<M::Reason>, Outage> {
        let request = Request::Apply {
            rule: rule.to_string(),
            args: args.to_vec(),
        };
        match self.call(request)? {
            Reply::Applied(result) => result.map_err(Outage::from),
            Reply::Observed(_) => Err(Outage::transport("out-of-order reply from subject worker")),
        }
    }

    fn observe(&mut self) -> Result<Option<M::Snapshot>, Outage> {
        match self.call(Request::Observe)? {
            Reply::Observed(snapshot) => Ok(snapshot),
            Reply::Applied(_) => Err(Outage::transport("out-of-order reply from subject worker")),
        }
    }
}

impl<M: Model> Drop for SubjectWorker<M> {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        drop(self.requests.take());
        if self.stalled {
            return;
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone)]
    struct Tally;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    enum TallyError {}

    impl Model for Tally {
        type Reason = TallyError;
        type Snapshot = i64;
    }

    struct SlowTally {
        count: i64,
        delay: Duration,
    }

    impl Subject<Tally> for SlowTally {
        fn apply(&mut self, rule: &str, _args: &[Value]) -> Result<Outcome<TallyError>, SubjectError> {
            match rule {
                "bump" => {
                    self.count += 1;
                    Ok(Outcome::ok())
                }
                "stall" => {
                    thread::sleep(self.delay);
                    Ok(Outcome::ok())
                }
                "crash" => panic!("subject crashed"),
                other => Err(SubjectError::Unsupported(other.to_string())),
            }
        }

        fn observe(&self) -> Option<i64> {
            Some(self.count)
        }
    }

    fn slow(delay_ms: u64) -> SlowTally {
        SlowTally {
            count: 0,
            delay: Duration::from_millis(delay_ms),
        }
    }

    #[test]
    fn test_inline_dispatch() {
        let mut handle = SubjectHandle::<Tally, _>::start(slow(0), None).unwrap();
        assert!(matches!(handle, SubjectHandle::Inline(_)));
        assert_eq!(handle.apply("bump", &[]), (Outcome::ok(), None));
        assert_eq!(handle.observe(), Ok(Some(1)));

        let (outcome, detail) = handle.apply("reset", &[]);
        assert_eq!(outcome, Outcome::Unavailable(Unavailable::Transport));
        assert_eq!(detail.as_deref(), Some("subject does not implement rule `reset`"));
    }

    #[test]
    fn test_worker_dispatch() {
        let mut handle = SubjectHandle::<Tally, _>::start(slow(0), Some(Duration::from_secs(5))).unwrap();
        assert_eq!(handle.apply("bump", &[]), (Outcome::ok(), None));
        assert_eq!(handle.apply("bump", &[]), (Outcome::ok(), None));
        assert_eq!(handle.observe(), Ok(Some(2)));
    }

    #[test]
    fn test_worker_timeout_stalls_handle() {
        let mut handle = SubjectHandle::<Tally, _>::start(slow(500), Some(Duration::from_millis(20))).unwrap();
        let (outcome, _) = handle.apply("stall", &[]);
        assert_eq!(outcome, Outcome::Unavailable(Unavailable::Timeout));

        // Later calls fail without waiting for the stuck worker
        let started = std::time::Instant::now();
        assert_eq!(handle.observe(), Err(Outage::timeout()));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_worker_panic_is_transport_failure() {
        let mut handle = SubjectHandle::<Tally, _>::start(slow(0), Some(Duration::from_secs(5))).unwrap();
        let (outcome, detail) = handle.apply("crash", &[]);
        assert_eq!(outcome, Outcome::Unavailable(Unavailable::Transport));
        assert!(detail.is_some());
    }

    #[test]
    fn test_inline_panic_is_transport_failure() {
        let mut handle = SubjectHandle::<Tally, _>::start(slow(0), None).unwrap();
        assert_eq!(handle.apply("bump", &[]), (Outcome::ok(), None));

        let (outcome, detail) = handle.apply("crash", &[]);
        assert_eq!(outcome, Outcome::Unavailable(Unavailable::Transport));
        assert_eq!(detail.as_deref(), Some("subject panicked"));
    }
}
