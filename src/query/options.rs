//! Query and mutation options

use super::key::QueryKey;
use std::time::Duration;

/// Cached data is stale as soon as it arrives unless a hook says otherwise
pub const DEFAULT_STALE_TIME: Duration = Duration::ZERO;

/// How long an unobserved entry is retained before garbage collection
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Title and message shown to the user when a query or mutation fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMeta {
    pub title: String,
    pub message: String,
}

impl ErrorMeta {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Per-hook query configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Age after which cached data is refetched on the next observation
    pub stale_time: Duration,
    /// Retention window for entries nobody observes
    pub gc_time: Duration,
    /// Disabled queries never fetch on subscription
    pub enabled: bool,
    /// Reported through the error reporter when a fetch fails
    pub error: Option<ErrorMeta>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            gc_time: DEFAULT_GC_TIME,
            enabled: true,
            error: None,
        }
    }
}

impl QueryOptions {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_error(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorMeta::new(title, message));
        self
    }
}

/// Mutation configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOptions {
    /// Key prefixes invalidated after a successful mutation
    pub invalidates: Vec<QueryKey>,
    pub error: Option<ErrorMeta>,
}

impl MutationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidates(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    pub fn with_error(mut self, title: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorMeta::new(title, message));
        self
    }
}
