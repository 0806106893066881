//! Error reporting side channel

use super::options::ErrorMeta;
use crate::api::NormalizedError;

/// Receives query and mutation failures for user-facing notification
pub trait ErrorReporter: Send + Sync {
    fn report(&self, meta: &ErrorMeta, error: &NormalizedError);
}

/// Reporter that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, meta: &ErrorMeta, error: &NormalizedError) {
        tracing::error!(
            title = %meta.title,
            cause = %error.cause(),
            "{}: {}",
            meta.message,
            error
        );
    }
}
