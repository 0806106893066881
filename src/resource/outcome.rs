//! Tagged accessor results
//!
//! Some best-effort accessors swap a failure for a placeholder value instead
//! of failing. [`Outcome`] keeps that visible to callers.

use crate::api::NormalizedError;

/// Result of an accessor that may degrade gracefully
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Ok(T),
    /// The request failed and `value` is a placeholder standing in for the data
    Degraded {
        value: T,
        cause: NormalizedError,
    },
    Err(NormalizedError),
}

impl<T> Outcome<T> {
    /// Replace a failure with the placeholder built by `sentinel`
    pub fn degrade<F>(result: Result<T, NormalizedError>, sentinel: F) -> Self
    where
        F: FnOnce() -> T,
    {
        match result {
            Ok(value) => Self::Ok(value),
            Err(cause) => Self::Degraded {
                value: sentinel(),
                cause,
            },
        }
    }

    /// The value, real or placeholder
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => Some(value),
            Self::Err(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Collapse into a plain result, keeping placeholders as successes
    pub fn into_result(self) -> Result<T, NormalizedError> {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => Ok(value),
            Self::Err(error) => Err(error),
        }
    }

    /// Shape for the query cache: only real errors fail the query
    pub fn into_query_result(self) -> Result<Self, NormalizedError> {
        match self {
            Self::Err(error) => Err(error),
            other => Ok(other),
        }
    }
}

impl<T> From<Result<T, NormalizedError>> for Outcome<T> {
    fn from(result: Result<T, NormalizedError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(error) => Self::Err(error),
        }
    }
}
