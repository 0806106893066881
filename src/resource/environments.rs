//! Environments
//!
//! An environment is a configured connection to a Docker, Kubernetes, Nomad or
//! Edge endpoint. Every other resource is scoped by one.

use crate::api::{ApiClient, EnvironmentId, NormalizedError, ResultExt};
use crate::query::{QueryClient, QueryObserver};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Platform behind an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Docker,
    Azure,
    Kubernetes,
    Nomad,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Environment {
    pub id: u64,
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: u8,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(default)]
    pub status: u8,
    #[serde(default)]
    pub group_id: u64,
}

impl Environment {
    pub fn environment_id(&self) -> EnvironmentId {
        EnvironmentId::new(self.id)
    }

    pub fn platform(&self) -> Platform {
        match self.kind {
            1 | 2 | 4 => Platform::Docker,
            3 => Platform::Azure,
            5..=7 => Platform::Kubernetes,
            8 => Platform::Nomad,
            _ => Platform::Unknown,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == 1
    }
}

pub mod keys {
    use crate::api::EnvironmentId;
    use crate::query::QueryKey;
    use crate::query_key;

    pub fn all() -> QueryKey {
        query_key!["environments"]
    }

    pub fn item(environment_id: EnvironmentId) -> QueryKey {
        all().with(environment_id)
    }
}

/// List all environments the caller can access
pub async fn list_environments(client: &ApiClient) -> Result<Vec<Environment>, NormalizedError> {
    client
        .get(&client.environment_url(None, None), &[])
        .await
        .with_context(|| "Unable to retrieve environments".to_string())
}

pub async fn get_environment(
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> Result<Environment, NormalizedError> {
    client
        .get(&client.environment_url(Some(environment_id), None), &[])
        .await
        .with_context(|| "Unable to retrieve environment".to_string())
}

pub fn use_environments(queries: &QueryClient, client: &ApiClient) -> QueryObserver<Vec<Environment>> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_stale_time(Duration::from_secs(30))
        .with_error("Failure", "Unable to retrieve environments");

    queries.watch_query(keys::all(), options, move || {
        let client = client.clone();
        async move { list_environments(&client).await }
    })
}

pub fn use_environment(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> QueryObserver<Environment> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_error("Failure", "Unable to retrieve environment");

    queries.watch_query(keys::item(environment_id), options, move || {
        let client = client.clone();
        async move { get_environment(&client, environment_id).await }
    })
}
