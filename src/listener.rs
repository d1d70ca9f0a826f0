use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::cause::Cause;
use crate::exchange::{Conversation, ExchangeResult};

/// Lifecycle events fired by the sender engine.
///
/// Callbacks are invoked synchronously on the thread performing the
/// triggering state transition. They must not block indefinitely, and may
/// call back into the sender (e.g. `abort`) — every transition is complete
/// before its listener fires, so a reentrant call observes a consistent
/// state.
///
/// All methods default to no-ops; implement only the ones you need.
pub trait SenderListener: Send + Sync {
    fn on_begin(&self, _conversation: &Conversation) {}
    fn on_headers(&self, _conversation: &Conversation) {}
    fn on_commit(&self, _conversation: &Conversation) {}
    fn on_content(&self, _conversation: &Conversation, _chunk: &Bytes) {}
    fn on_success(&self, _conversation: &Conversation) {}
    fn on_failure(&self, _conversation: &Conversation, _cause: &Cause) {}
    fn on_complete(&self, _conversation: &Conversation, _result: &ExchangeResult) {}
}

/// Fan-out registry of listeners.
///
/// The listener list is snapshotted before any callback is invoked, so a
/// listener reentering the sender from inside a callback can never
/// deadlock on the registry's own lock.
pub struct NotifierBus {
    listeners: Mutex<Vec<Arc<dyn SenderListener>>>,
}

impl NotifierBus {
    pub fn new() -> NotifierBus {
        NotifierBus { listeners: Mutex::new(Vec::new()) }
    }

    pub fn register(&self, listener: Arc<dyn SenderListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn snapshot(&self) -> Vec<Arc<dyn SenderListener>> {
        self.listeners.lock().unwrap().clone()
    }

    pub fn notify_begin(&self, conv: &Conversation) {
        trace!("{:?}: begin", conv);
        for l in self.snapshot() {
            l.on_begin(conv);
        }
    }

    pub fn notify_headers(&self, conv: &Conversation) {
        trace!("{:?}: headers", conv);
        for l in self.snapshot() {
            l.on_headers(conv);
        }
    }

    pub fn notify_commit(&self, conv: &Conversation) {
        trace!("{:?}: commit", conv);
        for l in self.snapshot() {
            l.on_commit(conv);
        }
    }

    pub fn notify_content(&self, conv: &Conversation, chunk: &Bytes) {
        trace!("{:?}: content ({} bytes)", conv, chunk.len());
        for l in self.snapshot() {
            l.on_content(conv, chunk);
        }
    }

    pub fn notify_success(&self, conv: &Conversation) {
        debug!("{:?}: success", conv);
        for l in self.snapshot() {
            l.on_success(conv);
        }
    }

    pub fn notify_failure(&self, conv: &Conversation, cause: &Cause) {
        debug!("{:?}: failure: {}", conv, cause);
        for l in self.snapshot() {
            l.on_failure(conv, cause);
        }
    }

    pub fn notify_complete(&self, conv: &Conversation, result: &ExchangeResult) {
        debug!("{:?}: complete (failure={:?})", conv, result.failure.is_some());
        for l in self.snapshot() {
            l.on_complete(conv, result);
        }
    }
}

impl Default for NotifierBus {
    fn default() -> Self {
        NotifierBus::new()
    }
}
