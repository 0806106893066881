//! Docker
//!
//! Dashboard counters go through the platform API; volumes go through the
//! Docker API proxy of the environment.

use super::require_identifier;
use crate::api::{build_url, ApiClient, EnvironmentId, NormalizedError, ResourceId, ResultExt};
use crate::query::{Mutation, MutationOptions, QueryClient, QueryObserver};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerCounters {
    pub running: u64,
    pub stopped: u64,
    pub healthy: u64,
    pub unhealthy: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageCounters {
    pub total: u64,
    /// Total size in bytes
    pub size: u64,
}

/// Aggregate counters shown on the Docker dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerDashboard {
    pub containers: ContainerCounters,
    pub images: ImageCounters,
    pub services: u64,
    pub volumes: u64,
    pub networks: u64,
    pub stacks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeList {
    #[serde(default)]
    volumes: Option<Vec<Volume>>,
}

pub mod keys {
    use crate::api::EnvironmentId;
    use crate::query::QueryKey;
    use crate::resource::environments;

    pub fn base(environment_id: EnvironmentId) -> QueryKey {
        environments::keys::item(environment_id).with("docker")
    }

    pub fn dashboard(environment_id: EnvironmentId) -> QueryKey {
        base(environment_id).with("dashboard")
    }

    pub fn volumes(environment_id: EnvironmentId) -> QueryKey {
        base(environment_id).with("volumes")
    }
}

pub async fn get_dashboard(
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> Result<DockerDashboard, NormalizedError> {
    client
        .get(&client.docker_url(environment_id, "dashboard"), &[])
        .await
        .with_context(|| "Unable to retrieve Docker dashboard".to_string())
}

/// List volumes; the Docker API answers `null` instead of an empty list
pub async fn list_volumes(client: &ApiClient, environment_id: EnvironmentId) -> Result<Vec<Volume>, NormalizedError> {
    let list: VolumeList = client
        .get(&client.docker_proxy_url(environment_id, "volumes"), &[])
        .await
        .with_context(|| "Unable to retrieve volumes".to_string())?;

    Ok(list.volumes.unwrap_or_default())
}

pub async fn remove_volume(
    client: &ApiClient,
    environment_id: EnvironmentId,
    name: &str,
) -> Result<(), NormalizedError> {
    let context = || format!("Unable to remove volume {}", name);
    require_identifier("volume name", name, context)?;

    let path = build_url(
        &client.docker_proxy_url(environment_id, "volumes"),
        Some(&ResourceId::from(name)),
        None,
    );
    let _: IgnoredAny = client.delete(&path, &[]).await.with_context(context)?;

    tracing::info!("Removed volume {} on environment {}", name, environment_id);
    Ok(())
}

// =============================================================================
// Hooks
// =============================================================================

pub fn use_dashboard(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> QueryObserver<DockerDashboard> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_stale_time(Duration::from_secs(10))
        .with_error("Failure", "Unable to retrieve Docker dashboard");

    queries.watch_query(keys::dashboard(environment_id), options, move || {
        let client = client.clone();
        async move { get_dashboard(&client, environment_id).await }
    })
}

pub fn use_volumes(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> QueryObserver<Vec<Volume>> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_error("Failure", "Unable to retrieve volumes");

    queries.watch_query(keys::volumes(environment_id), options, move || {
        let client = client.clone();
        async move { list_volumes(&client, environment_id).await }
    })
}

/// Removing a volume changes both the volume list and the dashboard counters
pub fn use_remove_volume(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> Mutation<String, ()> {
    let client = client.clone();
    let options = MutationOptions::new()
        .invalidates(keys::base(environment_id))
        .with_error("Failure", "Unable to remove volume");

    Mutation::new(queries, options, move |name: String| {
        let client = client.clone();
        async move { remove_volume(&client, environment_id, &name).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_deserializes_camel_case() {
        let dashboard: DockerDashboard = serde_json::from_str(
            r#"{"containers": {"running": 3, "stopped": 1, "total": 4}, "images": {"total": 9, "size": 1024}, "volumes": 2}"#,
        )
        .unwrap();
        assert_eq!(dashboard.containers.running, 3);
        assert_eq!(dashboard.containers.unhealthy, 0);
        assert_eq!(dashboard.images.size, 1024);
        assert_eq!(dashboard.volumes, 2);
        assert_eq!(dashboard.networks, 0);
    }

    #[test]
    fn test_volume_list_accepts_null() {
        let list: VolumeList = serde_json::from_str(r#"{"Volumes": null, "Warnings": null}"#).unwrap();
        assert!(list.volumes.is_none());

        let list: VolumeList =
            serde_json::from_str(r#"{"Volumes": [{"Name": "data", "Driver": "local"}]}"#).unwrap();
        assert_eq!(list.volumes.unwrap()[0].name, "data");
    }

    #[test]
    fn test_removing_volume_invalidates_dashboard() {
        let env = EnvironmentId::new(1);
        assert!(keys::dashboard(env).starts_with(&keys::base(env)));
        assert!(keys::volumes(env).starts_with(&keys::base(env)));
    }
}
