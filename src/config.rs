use std::sync::Arc;

/// Fine-grained configuration of the sender engine.
#[derive(Debug, Clone)]
pub struct Config {
    strict_event_ordering: bool,
}

impl Config {
    /// Create a config with defaults.
    pub fn new() -> Config {
        Config {
            strict_event_ordering: false,
        }
    }

    /// When set, `complete` is never fired (and the channel never released
    /// back to the pool) until both the request side and the response side
    /// have independently reached a terminal state, even if the response
    /// finished first.
    ///
    /// When unset, the side that finishes second simply triggers `complete`
    /// without waiting on the other if it has already reported its own
    /// terminal state out of band.
    pub fn strict_event_ordering(&mut self, value: bool) -> &mut Self {
        self.strict_event_ordering = value;
        self
    }

    pub(crate) fn is_strict_event_ordering(&self) -> bool {
        self.strict_event_ordering
    }

    /// Create an `Arc`'d config clone to pass to the constructor.
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
