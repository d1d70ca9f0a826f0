//! Internal errors raised by the sender engine itself.
//!
//! This is distinct from [`Cause`](crate::Cause), which carries a
//! caller- or transport-supplied reason for an aborted or failed request.
//! `SenderError` covers contract violations: calls made out of the allowed
//! protocol sequence.

quick_error! {
    #[derive(Debug)]
    pub enum SenderError {
        /// `send()` was called on a request that is not in the `Queued`
        /// state.
        NotQueued {
            description("send() called on a request that is not queued")
        }
        /// `on_deferred_content` was called with no outstanding content
        /// request in flight.
        NoOutstandingContentRequest {
            description("on_deferred_content called with no pending request")
        }
        /// `proceed` was called while the sender was not `Waiting` for a
        /// 100-continue response.
        NotWaitingFor100Continue {
            description("proceed() called outside of the waiting state")
        }
    }
}
