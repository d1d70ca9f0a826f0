use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A reason for an aborted or failed request.
///
/// Cheap to clone: it's handed to whichever of the four producer threads
/// (application, transport, content provider, response reader) observes a
/// terminal condition, and is stored exactly once per [`crate::Exchange`].
#[derive(Clone)]
pub struct Cause(Arc<dyn StdError + Send + Sync>);

impl Cause {
    pub fn new<E: StdError + Send + Sync + 'static>(err: E) -> Cause {
        Cause(Arc::new(err))
    }

    pub fn from_message<M: Into<String>>(msg: M) -> Cause {
        Cause(Arc::new(Message(msg.into())))
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for Message {}
