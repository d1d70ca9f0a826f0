use std::sync::{Arc, Mutex, Weak};

use crate::cause::Cause;
use crate::config::Config;
use crate::content::{ContentCursor, ContentListener};
use crate::error::SenderError;
use crate::exchange::{Exchange, ExchangeResult};
use crate::listener::{NotifierBus, SenderListener};
use crate::request::Request;
use crate::request_state::RequestStateCell;
use crate::sender_state::{DeferredOutcome, ProceedOutcome, SenderState, SenderStateCell};
use crate::transport::Transport;

/// Notified when the content provider registered on the current cursor
/// yields a buffer after the sender went idle waiting for it.
///
/// Holds only a weak reference to the sender: the provider (reachable from
/// the sender's own cursor) must not keep the sender alive, or the two
/// would form a reference cycle.
struct DeferredListener<T: Request> {
    sender: Weak<Sender<T>>,
}

impl<T: Request> ContentListener for DeferredListener<T> {
    fn content_available(&self) {
        if let Some(sender) = self.sender.upgrade() {
            sender.on_deferred_content();
        }
    }
}

/// Drives a single outbound HTTP request through its lifecycle: queued,
/// header emission, (possibly deferred or 100-continue-gated) body
/// transmission, to terminal success or failure.
///
/// Instantiated once per logical channel and reused across successive
/// requests on it. The two state machines (`RequestStateCell`,
/// `SenderStateCell`) are the only state mutated without a lock; the
/// cursor and current-exchange slots are `Mutex`-protected purely to
/// satisfy `Sync`, since the state machines already guarantee at most one
/// thread touches them at a time.
pub struct Sender<T: Request> {
    config: Arc<Config>,
    transport: Arc<dyn Transport<T>>,
    notifier: NotifierBus,
    rsm: RequestStateCell,
    ssm: SenderStateCell,
    cursor: Mutex<Option<Arc<ContentCursor>>>,
    exchange: Mutex<Option<Arc<Exchange<T>>>>,
    deferred_listener: Mutex<Option<Arc<DeferredListener<T>>>>,
    self_weak: Weak<Sender<T>>,
}

impl<T: Request> Sender<T> {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport<T>>) -> Arc<Sender<T>> {
        Arc::new_cyclic(|weak| Sender {
            config,
            transport,
            notifier: NotifierBus::new(),
            rsm: RequestStateCell::new(),
            ssm: SenderStateCell::new(),
            cursor: Mutex::new(None),
            exchange: Mutex::new(None),
            deferred_listener: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    /// Upgrades the sender's own weak self-reference, for handing an owned
    /// `Arc<Self>` into a `'static` transport completion closure.
    ///
    /// Can only fail if the sender has been dropped while one of its own
    /// callbacks is still outstanding, which never happens: the `Arc` held
    /// by the caller of `send`/`proceed`/etc. is always still alive for the
    /// duration of the call that schedules the callback.
    fn arc(&self) -> Arc<Self> {
        self.self_weak.upgrade().expect("sender dropped with a callback still outstanding")
    }

    pub fn register_listener(&self, listener: Arc<dyn SenderListener>) {
        self.notifier.register(listener);
    }

    fn current_exchange(&self) -> Option<Arc<Exchange<T>>> {
        self.exchange.lock().unwrap().clone()
    }

    fn current_cursor(&self) -> Option<Arc<ContentCursor>> {
        self.cursor.lock().unwrap().clone()
    }

    /// Begin processing a freshly queued exchange. Returns immediately;
    /// all further progress happens via transport/content/100-continue
    /// callbacks re-entering the sender.
    ///
    /// # Panics
    ///
    /// If called on a sender that is not in the `Queued` state — no other
    /// caller may touch a fresh sender concurrently with `send`.
    pub fn send(&self, exchange: Arc<Exchange<T>>) {
        if let Some(cause) = exchange.request().abort_cause() {
            self.any_to_failure(&exchange, cause, false);
            return;
        }
        if !self.rsm.queued_to_begin() {
            panic!("{}", SenderError::NotQueued);
        }
        self.notifier.notify_begin(exchange.conversation());

        let provider = exchange.request().content_provider();
        let cursor = Arc::new(ContentCursor::new(provider));
        *self.cursor.lock().unwrap() = Some(cursor.clone());
        *self.exchange.lock().unwrap() = Some(exchange.clone());

        let expects_continue = exchange.request().expects_continue();
        if !self.ssm.enter(expects_continue, cursor.has_content()) {
            unreachable!("SSM entry CAS failed on a freshly queued sender");
        }

        // Register as listener only after the SSM has been set, so a
        // racing on_deferred_content can never observe IDLE and
        // double-initiate a send.
        let listener = Arc::new(DeferredListener { sender: self.self_weak.clone() });
        cursor.register_listener(Arc::downgrade(&listener) as Weak<dyn ContentListener>);
        *self.deferred_listener.lock().unwrap() = Some(listener);

        if !self.rsm.begin_to_headers() {
            // Aborted between notify_begin and here; do not touch the
            // transport.
            return;
        }
        self.notifier.notify_headers(exchange.conversation());

        let sender = self.arc();
        let exchange_for_cb = exchange.clone();
        self.transport.send_headers(
            &exchange,
            &cursor,
            Box::new(move |result| match result {
                Ok(()) => sender.handle_commit_succeeded(exchange_for_cb),
                Err(cause) => {
                    sender.any_to_failure(&exchange_for_cb, cause, false);
                }
            }),
        );
    }

    /// 100-continue arrived (or failed to) for the current exchange.
    /// `cause` non-`None` means the wait for 100-continue itself failed.
    pub fn proceed(&self, cause: Option<Cause>) {
        let exchange = match self.current_exchange() {
            Some(e) => e,
            None => return,
        };
        if !exchange.request().expects_continue() {
            return;
        }
        if let Some(cause) = cause {
            self.any_to_failure(&exchange, cause, false);
            return;
        }
        let cursor = match self.current_cursor() {
            Some(c) => c,
            None => return,
        };
        // Only touch the cursor if the SSM is actually WAITING — the
        // Expecting(_WithContent) branches must leave it untouched, since a
        // racing commit callback may still be the one responsible for
        // advancing it (see sender_state::SenderStateCell::proceed).
        let outcome = self.ssm.proceed(|| cursor.advance() || cursor.is_consumed());
        match outcome {
            ProceedOutcome::KickSend => self.continue_with_current(exchange, cursor),
            ProceedOutcome::Proceeding
            | ProceedOutcome::ProceedingWithContent
            | ProceedOutcome::AwaitDeferred => {}
        }
    }

    /// Listener callback registered with asynchronous content providers:
    /// more content became available after the sender went idle.
    pub fn on_deferred_content(&self) {
        let exchange = match self.current_exchange() {
            Some(e) => e,
            None => return,
        };
        let cursor = match self.current_cursor() {
            Some(c) => c,
            None => return,
        };
        match self.ssm.mark_deferred_content() {
            DeferredOutcome::KickSend => self.drive_sending(exchange, cursor),
            DeferredOutcome::MarkedSticky | DeferredOutcome::NoTransition => {}
        }
    }

    /// Attempt to cancel the request in flight. Succeeds only while the
    /// request is still abortable (before-commit or sending); once
    /// terminal, returns false.
    pub fn abort(&self, cause: Cause) -> bool {
        let exchange = match self.current_exchange() {
            Some(e) => e,
            None => return false,
        };
        self.any_to_failure(&exchange, cause, true)
    }

    /// Reported by the (out-of-scope) response reader once it
    /// independently reaches a terminal state, so whichever side finishes
    /// second is the one that fires `complete` and releases the channel.
    pub fn response_terminated(&self, exchange: &Arc<Exchange<T>>, cause: Option<Cause>) {
        if !exchange.response_complete() {
            return;
        }
        if let Some(result) = exchange.terminate_response(cause) {
            self.dispatch_completion(exchange, result);
        }
    }

    fn handle_commit_succeeded(&self, exchange: Arc<Exchange<T>>) {
        if !self.rsm.headers_to_commit() {
            // Aborted between send_headers and this callback.
            return;
        }
        self.notifier.notify_commit(exchange.conversation());

        let cursor = match self.current_cursor() {
            Some(c) => c,
            None => return,
        };

        if !cursor.has_content() {
            self.some_to_success(&exchange);
            return;
        }

        // The transport may have piggybacked inline content onto the
        // header write; if so the cursor is already positioned on it.
        if let Some(buf) = cursor.current() {
            self.some_to_content(&exchange, &buf);
        }

        self.drive_from_sending_family(exchange, cursor);
    }

    fn drive_from_sending_family(&self, exchange: Arc<Exchange<T>>, cursor: Arc<ContentCursor>) {
        loop {
            match self.ssm.load() {
                SenderState::Sending => {
                    self.drive_sending(exchange, cursor);
                    return;
                }
                SenderState::SendingWithContent => {
                    if self.ssm.cas(SenderState::SendingWithContent, SenderState::Sending) {
                        continue;
                    }
                }
                SenderState::Expecting => {
                    if self.ssm.cas(SenderState::Expecting, SenderState::Waiting) {
                        return;
                    }
                }
                SenderState::ExpectingWithContent => {
                    if self.ssm.cas(SenderState::ExpectingWithContent, SenderState::Waiting) {
                        return;
                    }
                }
                SenderState::Proceeding => {
                    if self.ssm.cas(SenderState::Proceeding, SenderState::Idle) {
                        return;
                    }
                }
                SenderState::ProceedingWithContent => {
                    if self.ssm.cas(SenderState::ProceedingWithContent, SenderState::Sending) {
                        continue;
                    }
                }
                other => unreachable!("unexpected sender state after commit: {:?}", other),
            }
        }
    }

    /// Content-iteration entry point: loads the next buffer via
    /// `cursor.advance()` and drives it, or goes idle/terminal.
    ///
    /// Unifies what the source marks as two "old style" direct kicks
    /// (`on_deferred_content`'s IDLE->SENDING, `proceed`'s
    /// WAITING->SENDING) with the main commit-driven iteration, per the
    /// source's own note that a clean reimplementation should do so.
    fn drive_sending(&self, exchange: Arc<Exchange<T>>, cursor: Arc<ContentCursor>) {
        if cursor.advance() || cursor.is_consumed() {
            self.continue_with_current(exchange, cursor);
        } else {
            self.go_idle_or_retry(exchange, cursor);
        }
    }

    /// Sends whatever `cursor.current()` already holds (loaded by a prior
    /// `advance()`, possibly performed by the caller rather than here —
    /// see `proceed`'s predicate check).
    fn continue_with_current(&self, exchange: Arc<Exchange<T>>, cursor: Arc<ContentCursor>) {
        if let Some(buf) = cursor.current() {
            self.some_to_content(&exchange, &buf);
            self.send_chunk(exchange, cursor, false);
        } else if cursor.is_consumed() {
            self.send_chunk(exchange, cursor, true);
        } else {
            self.go_idle_or_retry(exchange, cursor);
        }
    }

    fn go_idle_or_retry(&self, exchange: Arc<Exchange<T>>, cursor: Arc<ContentCursor>) {
        loop {
            match self.ssm.load() {
                SenderState::Sending => {
                    if self.ssm.cas(SenderState::Sending, SenderState::Idle) {
                        return;
                    }
                }
                SenderState::SendingWithContent => {
                    if self.ssm.cas(SenderState::SendingWithContent, SenderState::Sending) {
                        self.drive_sending(exchange, cursor);
                        return;
                    }
                }
                other => unreachable!("go_idle_or_retry: unexpected sender state {:?}", other),
            }
        }
    }

    fn send_chunk(&self, exchange: Arc<Exchange<T>>, cursor: Arc<ContentCursor>, end: bool) {
        let sender = self.arc();
        let exchange_for_cb = exchange.clone();
        let cursor_for_cb = cursor.clone();
        self.transport.send_body_chunk(
            &exchange,
            &cursor,
            Box::new(move |result| match result {
                Ok(()) => {
                    if end {
                        sender.some_to_success(&exchange_for_cb);
                    } else {
                        sender.drive_sending(exchange_for_cb, cursor_for_cb);
                    }
                }
                Err(cause) => {
                    sender.any_to_failure(&exchange_for_cb, cause, false);
                }
            }),
        );
    }

    fn some_to_content(&self, exchange: &Arc<Exchange<T>>, buf: &bytes::Bytes) {
        if self.rsm.ensure_content() {
            self.notifier.notify_content(exchange.conversation(), buf);
        }
    }

    fn some_to_success(&self, exchange: &Arc<Exchange<T>>) {
        let cur = self.rsm.load();
        if cur == crate::request_state::RequestState::Failure {
            return;
        }
        if !cur.is_sending() {
            unreachable!("some_to_success called while RSM in {:?}", cur);
        }
        if !exchange.request_complete() {
            return;
        }

        if let Some(cursor) = self.cursor.lock().unwrap().take() {
            cursor.close();
        }
        *self.exchange.lock().unwrap() = None;
        *self.deferred_listener.lock().unwrap() = None;
        self.rsm.reset_for_reuse();
        self.ssm.store(SenderState::Idle);

        let result = exchange.terminate_request(None);
        self.notifier.notify_success(exchange.conversation());
        if let Some(result) = result {
            self.dispatch_completion(exchange, result);
        }
    }

    fn any_to_failure(&self, exchange: &Arc<Exchange<T>>, cause: Cause, via_explicit_abort: bool) -> bool {
        if !exchange.request_complete() {
            return false;
        }
        let prior = self.rsm.dispose();

        if let Some(cursor) = self.cursor.lock().unwrap().take() {
            cursor.close();
        }
        *self.exchange.lock().unwrap() = None;
        *self.deferred_listener.lock().unwrap() = None;

        let mut result = exchange.terminate_request(Some(cause.clone()));
        self.notifier.notify_failure(exchange.conversation(), &cause);

        if result.is_none() && !via_explicit_abort {
            if let Some(prior_state) = prior {
                if prior_state.is_before_commit() {
                    exchange.response_complete();
                    result = exchange.terminate_response(Some(cause));
                }
            }
        }

        if let Some(result) = result {
            self.dispatch_completion(exchange, result);
        }
        true
    }

    fn dispatch_completion(&self, exchange: &Arc<Exchange<T>>, result: ExchangeResult) {
        if self.config.is_strict_event_ordering() {
            self.notifier.notify_complete(exchange.conversation(), &result);
            self.transport.release(exchange);
        } else {
            self.transport.release(exchange);
            self.notifier.notify_complete(exchange.conversation(), &result);
        }
    }
}
