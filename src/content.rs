use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;

/// Result of asking a content provider for its next buffer.
#[derive(Debug, Clone)]
pub enum ChunkPoll {
    /// A buffer is available right now.
    Ready(Bytes),
    /// No buffer right now, but the provider is not exhausted — it may
    /// yield more later (asynchronous providers only).
    NotReady,
    /// The provider is exhausted; no further buffers will ever arrive.
    Done,
}

/// Notified exactly once per available buffer by an asynchronous content
/// provider. Registered via [`ContentProvider::register_listener`].
pub trait ContentListener: Send + Sync {
    fn content_available(&self);
}

/// A lazy finite sequence of byte buffers, with an optional known total
/// length. Synchronous providers never return `NotReady`; asynchronous ones
/// may, and must notify a registered listener when more becomes available.
///
/// A provider may be resource-bearing; `release` is called exactly once on
/// request termination, whether success or failure.
pub trait ContentProvider: Send + Sync {
    /// Known total length, if any. `None` mirrors the "-1 means unknown"
    /// convention from the source protocol.
    fn content_length(&self) -> Option<u64>;

    fn poll_next(&self) -> ChunkPoll;

    /// Register the single listener notified when deferred content
    /// becomes available. Synchronous providers can ignore this.
    fn register_listener(&self, _listener: Weak<dyn ContentListener>) {}

    fn release(&self);
}

struct CursorInner {
    current: Option<Bytes>,
    consumed: bool,
    closed: bool,
}

/// Holds a reference to the provider's iterator and exposes the
/// has-current-chunk / advanceable / consumed protocol the sender engine
/// drives.
///
/// `close()` is idempotent; once called, all further methods are no-ops.
/// `is_consumed()` only ever becomes true after an `advance()` that
/// returned false.
pub struct ContentCursor {
    provider: Arc<dyn ContentProvider>,
    has_content: bool,
    inner: Mutex<CursorInner>,
}

impl ContentCursor {
    pub fn new(provider: Arc<dyn ContentProvider>) -> ContentCursor {
        let has_content = provider.content_length() != Some(0);
        ContentCursor {
            provider,
            has_content,
            inner: Mutex::new(CursorInner { current: None, consumed: false, closed: false }),
        }
    }

    pub fn current(&self) -> Option<Bytes> {
        self.inner.lock().unwrap().current.clone()
    }

    /// Attempt to load the next buffer as current. Returns true if one
    /// became current; false if none is available right now (the
    /// provider may still be exhausted, or may just be between buffers).
    pub fn advance(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed || inner.consumed {
            return false;
        }
        match self.provider.poll_next() {
            ChunkPoll::Ready(buf) => {
                inner.current = Some(buf);
                true
            }
            ChunkPoll::NotReady => {
                inner.current = None;
                false
            }
            ChunkPoll::Done => {
                inner.current = None;
                inner.consumed = true;
                false
            }
        }
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn is_consumed(&self) -> bool {
        self.inner.lock().unwrap().consumed
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.consumed = true;
        inner.current = None;
        drop(inner);
        self.provider.release();
    }

    pub fn register_listener(&self, listener: Weak<dyn ContentListener>) {
        self.provider.register_listener(listener);
    }
}
