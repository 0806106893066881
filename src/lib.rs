//! portica
//!
//! Data-access layer for a container-management API (Docker, Kubernetes and
//! Nomad environments, stacks): typed REST accessors, error normalization and
//! a deduplicating query cache.
//!
//! # Module Structure
//!
//! - [`api`] - HTTP transport, resource paths and error normalization
//! - [`resource`] - Typed accessors, query keys and hooks per resource
//! - [`query`] - The query cache, observers and mutations
//! - [`notification`] - User-facing notifications fed by failed queries
//! - [`config`] - Persistent configuration

pub mod api;
pub mod config;
pub mod notification;
pub mod query;
pub mod resource;

/// Version injected at compile time via PORTICA_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("PORTICA_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use api::{ApiClient, EnvironmentId, NormalizedError};
pub use config::Config;
pub use notification::NotificationManager;
pub use query::{QueryClient, QueryKey};
