use std::sync::atomic::{AtomicUsize, Ordering};

/// What the sender is currently doing with respect to headers, body, and
/// the 100-continue handshake.
///
/// The `_WITH_CONTENT` suffix is a sticky flag: it records that deferred
/// content became available while the sender was busy elsewhere, and must
/// be re-examined on return to a quiescent state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
pub enum SenderState {
    Idle = 0,
    Sending = 1,
    SendingWithContent = 2,
    Expecting = 3,
    ExpectingWithContent = 4,
    Waiting = 5,
    Proceeding = 6,
    ProceedingWithContent = 7,
}

impl SenderState {
    fn from_usize(v: usize) -> SenderState {
        match v {
            0 => SenderState::Idle,
            1 => SenderState::Sending,
            2 => SenderState::SendingWithContent,
            3 => SenderState::Expecting,
            4 => SenderState::ExpectingWithContent,
            5 => SenderState::Waiting,
            6 => SenderState::Proceeding,
            7 => SenderState::ProceedingWithContent,
            _ => unreachable!("invalid SenderState discriminant {}", v),
        }
    }
}

/// The sender state machine: a single atomic cell mutated solely by CAS.
pub struct SenderStateCell(AtomicUsize);

impl SenderStateCell {
    pub fn new() -> SenderStateCell {
        SenderStateCell(AtomicUsize::new(SenderState::Idle as usize))
    }

    pub fn load(&self) -> SenderState {
        SenderState::from_usize(self.0.load(Ordering::SeqCst))
    }

    pub fn cas(&self, from: SenderState, to: SenderState) -> bool {
        self.0.compare_exchange(
            from as usize, to as usize, Ordering::SeqCst, Ordering::SeqCst,
        ).is_ok()
    }

    pub fn store(&self, to: SenderState) {
        self.0.store(to as usize, Ordering::SeqCst);
    }

    /// Entry from `send()`: IDLE -> {SENDING, EXPECTING, EXPECTING_WITH_CONTENT}.
    pub fn enter(&self, expects_continue: bool, has_content: bool) -> bool {
        let to = match (expects_continue, has_content) {
            (false, _) => SenderState::Sending,
            (true, false) => SenderState::Expecting,
            (true, true) => SenderState::ExpectingWithContent,
        };
        self.cas(SenderState::Idle, to)
    }

    /// On deferred-content notification: loop until a quiescent recheck
    /// (IDLE) is kicked into SENDING, a busy state picks up the sticky
    /// bit, or the state is already sticky/waiting (no-op).
    ///
    /// Returns `true` if the caller (IDLE case) must itself initiate the
    /// next transport send.
    pub fn mark_deferred_content(&self) -> DeferredOutcome {
        loop {
            let cur = self.load();
            match cur {
                SenderState::Idle => {
                    if self.cas(SenderState::Idle, SenderState::Sending) {
                        return DeferredOutcome::KickSend;
                    }
                }
                SenderState::Sending => {
                    if self.cas(SenderState::Sending, SenderState::SendingWithContent) {
                        return DeferredOutcome::MarkedSticky;
                    }
                }
                SenderState::Expecting => {
                    if self.cas(SenderState::Expecting, SenderState::ExpectingWithContent) {
                        return DeferredOutcome::MarkedSticky;
                    }
                }
                SenderState::Proceeding => {
                    if self.cas(SenderState::Proceeding, SenderState::ProceedingWithContent) {
                        return DeferredOutcome::MarkedSticky;
                    }
                }
                SenderState::SendingWithContent
                | SenderState::ExpectingWithContent
                | SenderState::ProceedingWithContent
                | SenderState::Waiting => {
                    return DeferredOutcome::NoTransition;
                }
            }
        }
    }

    /// On 100-continue arrival (no failure cause): EXPECTING(_WITH_CONTENT)
    /// -> PROCEEDING(_WITH_CONTENT); WAITING -> SENDING or IDLE depending on
    /// whether the cursor can advance right now.
    ///
    /// `cursor_can_advance_now` is evaluated lazily, and only when the SSM
    /// is actually in `WAITING` — the `Expecting(_WithContent)` branches
    /// must not touch the cursor at all, since a racing commit callback may
    /// still be the one responsible for advancing it.
    pub fn proceed(&self, cursor_can_advance_now: impl Fn() -> bool) -> ProceedOutcome {
        loop {
            let cur = self.load();
            match cur {
                SenderState::Expecting => {
                    if self.cas(SenderState::Expecting, SenderState::Proceeding) {
                        return ProceedOutcome::Proceeding;
                    }
                }
                SenderState::ExpectingWithContent => {
                    if self.cas(SenderState::ExpectingWithContent,
                                SenderState::ProceedingWithContent) {
                        return ProceedOutcome::ProceedingWithContent;
                    }
                }
                SenderState::Waiting => {
                    if cursor_can_advance_now() {
                        if self.cas(SenderState::Waiting, SenderState::Sending) {
                            return ProceedOutcome::KickSend;
                        }
                    } else if self.cas(SenderState::Waiting, SenderState::Idle) {
                        return ProceedOutcome::AwaitDeferred;
                    }
                }
                other => {
                    unreachable!("proceed() called while SSM in {:?}", other)
                }
            }
        }
    }
}

impl Default for SenderStateCell {
    fn default() -> Self {
        SenderStateCell::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeferredOutcome {
    KickSend,
    MarkedSticky,
    NoTransition,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProceedOutcome {
    Proceeding,
    ProceedingWithContent,
    KickSend,
    AwaitDeferred,
}
