//! Client-side HTTP request sender: drives a single outbound HTTP request
//! through its lifecycle — queued, header emission, (possibly deferred or
//! 100-continue-gated) body transmission, terminal success or failure —
//! while coordinating concurrent producers without locks.
//!
//! The core is a pair of interlocking state machines ([`RequestState`],
//! [`SenderState`]) and the algorithms in [`Sender`] that mediate them.
//! Everything about actually writing bytes to a socket, HTTP parsing,
//! connection pooling, DNS, TLS, and redirects is a collaborator concern
//! consumed through the [`Transport`] and [`Request`] traits, not
//! implemented here.
#[macro_use] extern crate quick_error;
#[macro_use] extern crate log;

mod cause;
mod config;
mod content;
mod error;
mod exchange;
mod listener;
mod request;
mod request_state;
mod sender;
mod sender_state;
mod transport;

pub use cause::Cause;
pub use config::Config;
pub use content::{ChunkPoll, ContentCursor, ContentListener, ContentProvider};
pub use error::SenderError;
pub use exchange::{Conversation, Exchange, ExchangeResult};
pub use listener::{NotifierBus, SenderListener};
pub use request::Request;
pub use request_state::RequestState;
pub use sender::Sender;
pub use sender_state::SenderState;
pub use transport::{Completion, Transport};
