use std::sync::atomic::{AtomicUsize, Ordering};

/// Lifecycle of the request as a whole.
///
/// `FAILURE` is terminal. The set `{Queued, Begin, Headers}` is
/// *before-commit*; `{Commit, Content}` is *sending*.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum RequestState {
    Queued = 0,
    Begin = 1,
    Headers = 2,
    Commit = 3,
    Content = 4,
    Failure = 5,
}

impl RequestState {
    fn from_usize(v: usize) -> RequestState {
        match v {
            0 => RequestState::Queued,
            1 => RequestState::Begin,
            2 => RequestState::Headers,
            3 => RequestState::Commit,
            4 => RequestState::Content,
            5 => RequestState::Failure,
            _ => unreachable!("invalid RequestState discriminant {}", v),
        }
    }

    pub fn is_before_commit(self) -> bool {
        matches!(self, RequestState::Queued | RequestState::Begin | RequestState::Headers)
    }

    pub fn is_sending(self) -> bool {
        matches!(self, RequestState::Commit | RequestState::Content)
    }
}

/// The request state machine: a single atomic cell mutated solely by CAS.
///
/// A failed CAS always means another thread raced ahead; the caller reloads
/// and either retries or abandons depending on the new state.
pub struct RequestStateCell(AtomicUsize);

impl RequestStateCell {
    pub fn new() -> RequestStateCell {
        RequestStateCell(AtomicUsize::new(RequestState::Queued as usize))
    }

    pub fn load(&self) -> RequestState {
        RequestState::from_usize(self.0.load(Ordering::SeqCst))
    }

    fn cas(&self, from: RequestState, to: RequestState) -> bool {
        self.0.compare_exchange(
            from as usize, to as usize, Ordering::SeqCst, Ordering::SeqCst,
        ).is_ok()
    }

    pub fn queued_to_begin(&self) -> bool {
        self.cas(RequestState::Queued, RequestState::Begin)
    }

    pub fn begin_to_headers(&self) -> bool {
        self.cas(RequestState::Begin, RequestState::Headers)
    }

    pub fn headers_to_commit(&self) -> bool {
        self.cas(RequestState::Headers, RequestState::Commit)
    }

    /// COMMIT -> CONTENT on the first body chunk; CONTENT -> CONTENT (a
    /// no-op CAS, always wins) on subsequent chunks.
    pub fn ensure_content(&self) -> bool {
        loop {
            let cur = self.load();
            match cur {
                RequestState::Commit => {
                    if self.cas(RequestState::Commit, RequestState::Content) {
                        return true;
                    }
                    // lost race, reload
                }
                RequestState::Content => return true,
                _ => return false,
            }
        }
    }

    /// Unconditional move to FAILURE from any non-FAILURE state.
    ///
    /// Returns the prior state, or `None` if the request had already failed.
    pub fn dispose(&self) -> Option<RequestState> {
        loop {
            let cur = self.load();
            if cur == RequestState::Failure {
                return None;
            }
            if self.cas(cur, RequestState::Failure) {
                return Some(cur);
            }
        }
    }

    /// Reset to QUEUED for channel reuse. Only ever called by the thread
    /// that just observed `some_to_success`; never races.
    pub fn reset_for_reuse(&self) {
        self.0.store(RequestState::Queued as usize, Ordering::SeqCst);
    }
}

impl Default for RequestStateCell {
    fn default() -> Self {
        RequestStateCell::new()
    }
}
