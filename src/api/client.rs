//! API Client
//!
//! Main client for the management API, combining the HTTP transport with the
//! path conventions of each platform.

use super::error::TransportError;
use super::http::{Credentials, HttpClient};
use super::locator::{build_url, EnvironmentId};
use crate::config::Config;
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Main API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub http: HttpClient,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let http = HttpClient::new(base_url, credentials, timeout)?;
        Ok(Self { http })
    }

    /// Create a client from the effective configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config
            .effective_api_url()
            .context("No API URL configured. Use --url or set PORTICA_URL")?;

        Self::new(&base_url, config.credentials(), Some(config.request_timeout()))
            .with_context(|| format!("Failed to create API client for {}", base_url))
    }

    /// Make a GET request to the API
    pub async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        self.http.get(path, query).await
    }

    /// Make a POST request to the API
    pub async fn post<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.http.post(path, query, body).await
    }

    /// Make a PUT request to the API
    pub async fn put<B, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.http.put(path, query, body).await
    }

    /// Make a DELETE request to the API
    pub async fn delete<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        self.http.delete(path, query).await
    }

    // =========================================================================
    // Environment API helpers
    // =========================================================================

    /// Build an environment (endpoint) URL
    pub fn environment_url(&self, environment_id: Option<EnvironmentId>, action: Option<&str>) -> String {
        build_url("/endpoints", environment_id.map(Into::into).as_ref(), action)
    }

    /// Build a Docker API proxy URL (`/endpoints/{id}/docker/...`)
    pub fn docker_proxy_url(&self, environment_id: EnvironmentId, path: &str) -> String {
        self.environment_url(Some(environment_id), Some(&format!("docker/{}", path)))
    }

    // =========================================================================
    // Platform API helpers
    // =========================================================================

    /// Build a Docker platform URL (`/docker/{id}/...`)
    pub fn docker_url(&self, environment_id: EnvironmentId, action: &str) -> String {
        build_url("/docker", Some(&environment_id.into()), Some(action))
    }

    /// Build a Kubernetes platform URL (`/kubernetes/{id}/...`)
    pub fn kubernetes_url(&self, environment_id: EnvironmentId, action: &str) -> String {
        build_url("/kubernetes", Some(&environment_id.into()), Some(action))
    }

    /// Build a Nomad platform URL (`/nomad/endpoints/{id}/...`)
    pub fn nomad_url(&self, environment_id: EnvironmentId, action: &str) -> String {
        build_url("/nomad/endpoints", Some(&environment_id.into()), Some(action))
    }

    // =========================================================================
    // Stack API helpers
    // =========================================================================

    /// Build a stack URL
    pub fn stack_url(&self, stack_id: Option<u64>, action: Option<&str>) -> String {
        build_url("/stacks", stack_id.map(Into::into).as_ref(), action)
    }
}
