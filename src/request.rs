use std::sync::Arc;

use http::HeaderMap;

use crate::cause::Cause;
use crate::content::ContentProvider;

/// The consumed interface to an application-built HTTP request.
///
/// Everything about constructing, validating, or routing the request is
/// the application's concern; the sender engine only needs these things to
/// drive it through the wire.
pub trait Request: Send + Sync + 'static {
    fn headers(&self) -> &HeaderMap;

    /// Set (non-null) once the application or a collaborator has decided
    /// this request should not proceed. Checked by `send()` before the
    /// first byte is written, and consulted by `any_to_failure` to decide
    /// whether this is caller-initiated abort.
    fn abort_cause(&self) -> Option<Cause>;

    fn content_provider(&self) -> Arc<dyn ContentProvider>;

    /// Whether `Expect: 100-continue` is present in `headers()`.
    fn expects_continue(&self) -> bool {
        self.headers()
            .get(http::header::EXPECT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }
}
