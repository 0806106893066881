//! Management API interaction module
//!
//! This module provides the low-level pieces every resource accessor is built
//! from: path construction, the HTTP transport and error normalization.
//!
//! # Module Structure
//!
//! - [`client`] - Main API client and per-platform path helpers
//! - [`error`] - Transport errors and the error normalizer
//! - [`http`] - HTTP transport for REST API calls
//! - [`locator`] - Canonical resource paths
//!
//! # Example
//!
//! ```ignore
//! use portica::api::{ApiClient, Credentials, ResultExt};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ApiClient::new("http://localhost:9000/api", Credentials::Anonymous, None)?;
//!     let stacks: serde_json::Value = client
//!         .get(&client.stack_url(None, None), &[])
//!         .await
//!         .with_context(|| "Unable to retrieve stacks".to_string())?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod locator;

pub use client::ApiClient;
pub use error::{normalize, NormalizedError, RemoteErrorPayload, ResultExt, TransportError};
pub use http::{Credentials, HttpClient};
pub use locator::{append_segments, build_url, encode_segment, is_dot_segment, EnvironmentId, ResourceId};
