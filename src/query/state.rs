//! Observable query state

use crate::api::NormalizedError;
use std::sync::Arc;

/// Lifecycle of a cached query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing fetched and nothing in flight
    Idle,
    /// First fetch in flight, no data yet
    Loading,
    /// Last fetch succeeded
    Success,
    /// Last fetch failed (previous data, if any, is kept)
    Error,
}

/// Snapshot of a cached query as seen by an observer
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<NormalizedError>,
    /// A request for this key is in flight (first load or background refetch)
    pub is_fetching: bool,
    pub is_stale: bool,
}

impl<T> QueryState<T> {
    pub(crate) fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
        }
    }

    /// No data yet and a request is in flight
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }

    pub fn error(&self) -> Option<&NormalizedError> {
        self.error.as_ref()
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
        }
    }
}
