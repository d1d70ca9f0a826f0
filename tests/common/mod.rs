#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;

use reqsend::{
    Cause, ChunkPoll, Completion, Conversation, ContentListener, ContentProvider, Exchange,
    ExchangeResult, Request, Sender, SenderListener, Transport,
};

/// Mirrors `tk-http`'s own examples, which init `env_logger` before doing
/// anything interesting; here so `trace!`/`debug!` transition logging is
/// visible with `--nocapture` when a test fails.
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::init();
    });
}

/// Content provider driven by a queue the test pushes into, standing in for
/// both synchronous providers (queue preloaded, never touched again) and
/// asynchronous ones (queue empty, then later pushed to from another
/// "thread", notifying whatever listener the cursor registered).
pub struct QueueProvider {
    length: Option<u64>,
    queue: Mutex<VecDeque<ChunkPoll>>,
    listener: Mutex<Option<Weak<dyn ContentListener>>>,
    released: Mutex<bool>,
}

impl QueueProvider {
    pub fn new(length: Option<u64>, preloaded: Vec<ChunkPoll>) -> Arc<QueueProvider> {
        Arc::new(QueueProvider {
            length,
            queue: Mutex::new(preloaded.into_iter().collect()),
            listener: Mutex::new(None),
            released: Mutex::new(false),
        })
    }

    /// Queue an item without waking the registered listener.
    pub fn push(&self, item: ChunkPoll) {
        self.queue.lock().unwrap().push_back(item);
    }

    /// Wake whatever listener the sender registered for deferred content.
    pub fn notify_listener(&self) {
        let listener = self.listener.lock().unwrap().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.content_available();
        }
    }

    pub fn is_released(&self) -> bool {
        *self.released.lock().unwrap()
    }
}

impl ContentProvider for QueueProvider {
    fn content_length(&self) -> Option<u64> {
        self.length
    }

    fn poll_next(&self) -> ChunkPoll {
        self.queue.lock().unwrap().pop_front().unwrap_or(ChunkPoll::NotReady)
    }

    fn register_listener(&self, listener: Weak<dyn ContentListener>) {
        *self.listener.lock().unwrap() = Some(listener);
    }

    fn release(&self) {
        *self.released.lock().unwrap() = true;
    }
}

pub fn empty_provider() -> Arc<QueueProvider> {
    QueueProvider::new(Some(0), vec![])
}

pub fn single_chunk_provider(bytes: &'static [u8]) -> Arc<QueueProvider> {
    QueueProvider::new(
        Some(bytes.len() as u64),
        vec![ChunkPoll::Ready(Bytes::from_static(bytes)), ChunkPoll::Done],
    )
}

/// The consumed `Request` implementation driving the engine under test.
pub struct TestRequest {
    headers: HeaderMap,
    abort_cause: Mutex<Option<Cause>>,
    provider: Arc<dyn ContentProvider>,
}

impl TestRequest {
    pub fn new(provider: Arc<dyn ContentProvider>) -> TestRequest {
        TestRequest { headers: HeaderMap::new(), abort_cause: Mutex::new(None), provider }
    }

    pub fn expecting_continue(provider: Arc<dyn ContentProvider>) -> TestRequest {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::EXPECT, "100-continue".parse().unwrap());
        TestRequest { headers, abort_cause: Mutex::new(None), provider }
    }

    pub fn preset_abort(cause: Cause) -> TestRequest {
        TestRequest {
            headers: HeaderMap::new(),
            abort_cause: Mutex::new(Some(cause)),
            provider: empty_provider(),
        }
    }
}

impl Request for TestRequest {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn abort_cause(&self) -> Option<Cause> {
        self.abort_cause.lock().unwrap().clone()
    }

    fn content_provider(&self) -> Arc<dyn ContentProvider> {
        self.provider.clone()
    }
}

struct MockTransportInner {
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    released: AtomicUsize,
}

/// A transport whose callbacks fire from a spawned thread rather than
/// inline, so tests exercise real cross-thread reentrancy into the sender.
/// Tracks how many `send_headers`/`send_body_chunk` calls are outstanding
/// at once, for the "at most one in flight" invariant.
#[derive(Clone)]
pub struct MockTransport(Arc<MockTransportInner>);

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport(Arc::new(MockTransportInner {
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }))
    }

    pub fn max_outstanding(&self) -> usize {
        self.0.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.0.released.load(Ordering::SeqCst)
    }

    fn run(&self, callback: Completion) {
        let inner = self.0.clone();
        thread::spawn(move || {
            let prev = inner.outstanding.fetch_add(1, Ordering::SeqCst);
            inner.max_outstanding.fetch_max(prev + 1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            inner.outstanding.fetch_sub(1, Ordering::SeqCst);
            callback(Ok(()));
        });
    }
}

impl<T: Request> Transport<T> for MockTransport {
    fn send_headers(&self, _exchange: &Arc<Exchange<T>>, _cursor: &Arc<reqsend::ContentCursor>, callback: Completion) {
        self.run(callback);
    }

    fn send_body_chunk(&self, _exchange: &Arc<Exchange<T>>, _cursor: &Arc<reqsend::ContentCursor>, callback: Completion) {
        self.run(callback);
    }

    fn release(&self, _exchange: &Arc<Exchange<T>>) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every lifecycle event in the order it fired, and lets a test
/// thread block until `complete` has been delivered.
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
    done: Mutex<bool>,
    condvar: Condvar,
}

impl RecordingListener {
    pub fn new() -> Arc<RecordingListener> {
        Arc::new(RecordingListener {
            events: Mutex::new(Vec::new()),
            done: Mutex::new(false),
            condvar: Condvar::new(),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    /// Blocks until `on_complete` has fired, or panics after a generous
    /// timeout (these tests never legitimately take anywhere near this
    /// long; a timeout means the engine deadlocked or lost an event).
    pub fn wait_for_complete(&self) {
        let guard = self.done.lock().unwrap();
        let (guard, timed_out) = self
            .condvar
            .wait_timeout_while(guard, Duration::from_secs(5), |done| !*done)
            .unwrap();
        if timed_out.timed_out() {
            panic!("timed out waiting for complete; events so far: {:?}", guard);
        }
    }
}

impl SenderListener for RecordingListener {
    fn on_begin(&self, _conversation: &Conversation) {
        self.record("begin".into());
    }
    fn on_headers(&self, _conversation: &Conversation) {
        self.record("headers".into());
    }
    fn on_commit(&self, _conversation: &Conversation) {
        self.record("commit".into());
    }
    fn on_content(&self, _conversation: &Conversation, chunk: &Bytes) {
        self.record(format!("content({})", String::from_utf8_lossy(chunk)));
    }
    fn on_success(&self, _conversation: &Conversation) {
        self.record("success".into());
    }
    fn on_failure(&self, _conversation: &Conversation, cause: &Cause) {
        self.record(format!("failure({})", cause));
    }
    fn on_complete(&self, _conversation: &Conversation, result: &ExchangeResult) {
        self.record(format!("complete(failure={})", result.failure.is_some()));
        *self.done.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

/// Calls `abort` back into the sender from inside `on_commit`, exercising
/// the listener-reentrancy guarantee: every state transition is complete
/// before the listener fires, so the abort's own CAS sees a consistent
/// state.
///
/// Since the request had already committed, `any_to_failure` does not
/// synthesize a response-side failure (the peer may still answer); this
/// also drives `response_terminated` with the same cause, standing in for
/// the out-of-scope response reader independently detecting the same
/// connection failure.
pub struct AbortOnCommit<T: Request> {
    sender: Mutex<Option<Arc<Sender<T>>>>,
    exchange: Mutex<Option<Arc<Exchange<T>>>>,
    cause: Mutex<Option<Cause>>,
}

impl<T: Request> AbortOnCommit<T> {
    pub fn new(cause: Cause) -> Arc<AbortOnCommit<T>> {
        Arc::new(AbortOnCommit {
            sender: Mutex::new(None),
            exchange: Mutex::new(None),
            cause: Mutex::new(Some(cause)),
        })
    }

    pub fn arm(&self, sender: Arc<Sender<T>>, exchange: Arc<Exchange<T>>) {
        *self.sender.lock().unwrap() = Some(sender);
        *self.exchange.lock().unwrap() = Some(exchange);
    }
}

impl<T: Request> SenderListener for AbortOnCommit<T> {
    fn on_commit(&self, _conversation: &Conversation) {
        if let Some(cause) = self.cause.lock().unwrap().take() {
            if let Some(sender) = self.sender.lock().unwrap().as_ref() {
                sender.abort(cause.clone());
            }
            if let Some(sender) = self.sender.lock().unwrap().as_ref() {
                if let Some(exchange) = self.exchange.lock().unwrap().as_ref() {
                    sender.response_terminated(exchange, Some(cause));
                }
            }
        }
    }
}
