use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::cause::Cause;
use crate::request::Request;

/// Opaque correlation handle for an exchange, used only for log lines.
///
/// Everything else about "the conversation" between request and response
/// readers is a collaborator concern outside this crate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Conversation(u64);

impl Conversation {
    pub fn new(id: u64) -> Conversation {
        Conversation(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Conversation({})", self.0)
    }
}

/// Terminal summary of an exchange: success, or the cause that failed it.
/// Produced only once both the request and response sides are complete.
#[derive(Debug, Clone)]
pub struct ExchangeResult {
    pub failure: Option<Cause>,
}

impl ExchangeResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// The conjoined request and response in flight.
///
/// Each side transitions to complete exactly once; `terminate_request` and
/// `terminate_response` yield `Some(result)` the instant both sides have
/// gone terminal — to whichever caller observes that second transition.
pub struct Exchange<T: Request> {
    request: T,
    conversation: Conversation,
    request_done: AtomicBool,
    response_done: AtomicBool,
    request_cause: OnceLock<Cause>,
    response_cause: OnceLock<Cause>,
    result: OnceLock<ExchangeResult>,
}

impl<T: Request> Exchange<T> {
    pub fn new(request: T, conversation: Conversation) -> Exchange<T> {
        Exchange {
            request,
            conversation,
            request_done: AtomicBool::new(false),
            response_done: AtomicBool::new(false),
            request_cause: OnceLock::new(),
            response_cause: OnceLock::new(),
            result: OnceLock::new(),
        }
    }

    pub fn request(&self) -> &T {
        &self.request
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Atomically marks the request side complete. Returns true the first
    /// time only.
    pub fn request_complete(&self) -> bool {
        !self.request_done.swap(true, Ordering::SeqCst)
    }

    /// Atomically marks the response side complete. Returns true the first
    /// time only.
    pub fn response_complete(&self) -> bool {
        !self.response_done.swap(true, Ordering::SeqCst)
    }

    pub fn terminate_request(&self, cause: Option<Cause>) -> Option<ExchangeResult> {
        if let Some(c) = cause {
            let _ = self.request_cause.set(c);
        }
        self.finalize_if_both_done()
    }

    pub fn terminate_response(&self, cause: Option<Cause>) -> Option<ExchangeResult> {
        if let Some(c) = cause {
            let _ = self.response_cause.set(c);
        }
        self.finalize_if_both_done()
    }

    fn finalize_if_both_done(&self) -> Option<ExchangeResult> {
        if !self.request_done.load(Ordering::SeqCst) || !self.response_done.load(Ordering::SeqCst)
        {
            return None;
        }
        let failure = self.request_cause.get().or(self.response_cause.get()).cloned();
        let result = ExchangeResult { failure };
        match self.result.set(result.clone()) {
            Ok(()) => Some(result),
            // Another thread already finalized this exchange; only the
            // caller that actually performed the finalizing transition
            // gets to act on the result.
            Err(_) => None,
        }
    }
}
