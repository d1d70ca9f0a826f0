use std::sync::Arc;

use crate::cause::Cause;
use crate::content::ContentCursor;
use crate::exchange::Exchange;
use crate::request::Request;

/// Invoked by the transport exactly once per `send_headers`/`send_body_chunk`
/// call, reporting success or the cause of failure.
pub type Completion = Box<dyn FnOnce(Result<(), Cause>) + Send>;

/// The abstract operation the sender engine consumes from the transport
/// layer. Out of scope here is everything about how bytes actually reach a
/// socket — parsing, pooling, DNS, TLS, redirects.
///
/// The invariant the engine maintains on the caller's behalf: at most one
/// of `send_headers`/`send_body_chunk` is ever outstanding at a time. Every
/// call site that invokes one of these has just CAS'd the sender state
/// machine into a sending state, and the matching completion is the sole
/// path back out of it.
pub trait Transport<T: Request>: Send + Sync {
    /// Write request headers, possibly peeking `cursor.current()` to write
    /// inline content opportunistically. Invoke `callback` exactly once.
    fn send_headers(
        &self,
        exchange: &Arc<Exchange<T>>,
        cursor: &Arc<ContentCursor>,
        callback: Completion,
    );

    /// Write `cursor`'s current buffer. Invoked once more with
    /// `cursor.is_consumed() == true` and no current buffer, so the
    /// transport can emit protocol terminators (e.g. the final chunk of a
    /// chunked encoding).
    fn send_body_chunk(
        &self,
        exchange: &Arc<Exchange<T>>,
        cursor: &Arc<ContentCursor>,
        callback: Completion,
    );

    /// Hook fired when the channel is released back to its pool. Ordering
    /// relative to `complete` is governed by `Config::strict_event_ordering`.
    fn release(&self, _exchange: &Arc<Exchange<T>>) {}
}
