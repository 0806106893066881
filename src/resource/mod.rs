//! Resource accessors
//!
//! Typed, stateless wrappers around the management API. Every accessor
//! normalizes transport failures with a message describing what it was doing,
//! so callers only ever see [`NormalizedError`].
//!
//! # Module Structure
//!
//! - [`environments`] - Environment list and details
//! - [`docker`] - Docker dashboard and volumes
//! - [`kubernetes`] - Namespaces and application restarts
//! - [`nomad`] - Nomad dashboard and jobs
//! - [`stacks`] - Stacks, start/stop and image status
//! - [`outcome`] - Results of accessors that degrade gracefully
//!
//! Each resource module also exposes its query `keys` and `use_*` hooks that
//! bind accessors to a [`QueryClient`](crate::query::QueryClient).
//!
//! # Example
//!
//! ```ignore
//! use portica::resource::nomad;
//!
//! let mut dashboard = nomad::use_dashboard::<nomad::NomadDashboard>(&queries, &client, env);
//! let state = dashboard.settled().await;
//! ```

pub mod docker;
pub mod environments;
pub mod kubernetes;
pub mod nomad;
pub mod outcome;
pub mod stacks;

pub use outcome::Outcome;

use crate::api::{normalize, NormalizedError, TransportError};

/// Reject a blank identifier, or one that is a `.` or `..` path segment,
/// before any request is made
pub(crate) fn require_identifier<F>(field: &str, value: &str, context: F) -> Result<(), NormalizedError>
where
    F: FnOnce() -> String,
{
    let problem = if value.trim().is_empty() {
        "must not be empty"
    } else if matches!(value, "." | "..") {
        "must not be a relative path segment"
    } else {
        return Ok(());
    };

    let cause = TransportError::InvalidRequest(format!("{} {}", field, problem));
    Err(normalize(cause, Some(&context())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_identifier() {
        assert!(require_identifier("name", "web", || "unused".to_string()).is_ok());

        let err = require_identifier("name", "  ", || "Unable to remove volume".to_string()).unwrap_err();
        assert_eq!(err.message(), "Unable to remove volume");
        assert!(err.status().is_none());
    }

    #[test]
    fn test_require_identifier_rejects_dot_segments() {
        for value in [".", ".."] {
            let err = require_identifier("volume name", value, || "Unable to remove volume".to_string()).unwrap_err();
            assert_eq!(err.message(), "Unable to remove volume");
            assert_eq!(
                err.cause().to_string(),
                "invalid request: volume name must not be a relative path segment"
            );
        }
        assert!(require_identifier("volume name", "...", || "unused".to_string()).is_ok());
        assert!(require_identifier("volume name", ".cache", || "unused".to_string()).is_ok());
        assert!(require_identifier("volume name", "%2e%2e", || "unused".to_string()).is_ok());
    }
}
