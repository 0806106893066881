//! Cached queries
//!
//! Inspired by TanStack Query: a [`QueryClient`] caches the results of
//! resource accessor calls under [`QueryKey`]s, deduplicates concurrent
//! requests, revalidates stale data in the background and invalidates whole
//! key hierarchies after mutations.
//!
//! # Module Structure
//!
//! - [`client`] - The cache itself
//! - [`key`] - Ordered query keys and the [`query_key!`](crate::query_key) macro
//! - [`observer`] - Subscriptions exposing load/error/data state
//! - [`mutation`] - Write operations with invalidation
//! - [`options`] - Per-hook settings
//! - [`report`] - Error reporting side channel

pub mod client;
pub mod key;
pub mod mutation;
pub mod observer;
pub mod options;
pub mod report;
pub mod state;

pub use client::QueryClient;
pub use key::QueryKey;
pub use mutation::{Mutation, MutationStatus};
pub use observer::QueryObserver;
pub use options::{ErrorMeta, MutationOptions, QueryOptions, DEFAULT_GC_TIME, DEFAULT_STALE_TIME};
pub use report::{ErrorReporter, TracingReporter};
pub use state::{QueryState, QueryStatus};
