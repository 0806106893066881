//! Stacks
//!
//! Compose, Swarm and Kubernetes stacks deployed through the management API.

use super::outcome::Outcome;
use crate::api::{ApiClient, EnvironmentId, NormalizedError, ResultExt};
use crate::query::{Mutation, MutationOptions, QueryClient, QueryObserver};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    pub id: u64,
    pub name: String,
    #[serde(rename = "Type", default)]
    pub kind: u8,
    #[serde(default)]
    pub endpoint_id: u64,
    /// 1 when active, 2 when inactive
    #[serde(default)]
    pub status: u8,
}

impl Stack {
    pub fn is_active(&self) -> bool {
        self.status == 1
    }
}

/// Whether the images used by a stack are up to date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackImageStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl StackImageStatus {
    /// Placeholder returned when the status cannot be retrieved
    pub fn unknown(stack_id: u64) -> Self {
        Self {
            status: "unknown".to_string(),
            message: format!("Unable to retrieve image status for stack: {}", stack_id),
        }
    }
}

/// Input of the start/stop mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRef {
    pub stack_id: u64,
    pub environment_id: EnvironmentId,
}

pub mod keys {
    use crate::query::QueryKey;
    use crate::query_key;

    pub fn all() -> QueryKey {
        query_key!["stacks"]
    }

    pub fn item(stack_id: u64) -> QueryKey {
        all().with(stack_id)
    }

    pub fn image_status(stack_id: u64) -> QueryKey {
        item(stack_id).with("images_status")
    }
}

pub async fn list_stacks(client: &ApiClient) -> Result<Vec<Stack>, NormalizedError> {
    client
        .get(&client.stack_url(None, None), &[])
        .await
        .with_context(|| "Unable to retrieve stacks".to_string())
}

pub async fn get_stack(client: &ApiClient, stack_id: u64) -> Result<Stack, NormalizedError> {
    client
        .get(&client.stack_url(Some(stack_id), None), &[])
        .await
        .with_context(|| format!("Unable to retrieve stack {}", stack_id))
}

pub async fn start_stack(
    client: &ApiClient,
    stack_id: u64,
    environment_id: EnvironmentId,
) -> Result<(), NormalizedError> {
    let endpoint = environment_id.to_string();
    let _: IgnoredAny = client
        .post::<(), _>(
            &client.stack_url(Some(stack_id), Some("start")),
            &[("endpointId", endpoint.as_str())],
            None,
        )
        .await
        .with_context(|| format!("Unable to start stack {}", stack_id))?;

    tracing::info!("Started stack {} on environment {}", stack_id, environment_id);
    Ok(())
}

pub async fn stop_stack(
    client: &ApiClient,
    stack_id: u64,
    environment_id: EnvironmentId,
) -> Result<(), NormalizedError> {
    let endpoint = environment_id.to_string();
    let _: IgnoredAny = client
        .post::<(), _>(
            &client.stack_url(Some(stack_id), Some("stop")),
            &[("endpointId", endpoint.as_str())],
            None,
        )
        .await
        .with_context(|| format!("Unable to stop stack {}", stack_id))?;

    tracing::info!("Stopped stack {} on environment {}", stack_id, environment_id);
    Ok(())
}

/// Image status of a stack, degrading to [`StackImageStatus::unknown`] on failure
pub async fn get_stack_image_status(client: &ApiClient, stack_id: u64) -> Outcome<StackImageStatus> {
    let result = client
        .get(&client.stack_url(Some(stack_id), Some("images_status")), &[])
        .await
        .with_context(|| format!("Unable to retrieve image status for stack: {}", stack_id));

    if let Err(error) = &result {
        tracing::warn!("Image status unavailable for stack {}: {}", stack_id, error.cause());
    }

    Outcome::degrade(result, || StackImageStatus::unknown(stack_id))
}

// =============================================================================
// Hooks
// =============================================================================

pub fn use_stacks(queries: &QueryClient, client: &ApiClient) -> QueryObserver<Vec<Stack>> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_error("Failure", "Unable to retrieve stacks");

    queries.watch_query(keys::all(), options, move || {
        let client = client.clone();
        async move { list_stacks(&client).await }
    })
}

pub fn use_stack(queries: &QueryClient, client: &ApiClient, stack_id: u64) -> QueryObserver<Stack> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_error("Failure", "Unable to retrieve stack");

    queries.watch_query(keys::item(stack_id), options, move || {
        let client = client.clone();
        async move { get_stack(&client, stack_id).await }
    })
}

/// Image status is expensive to compute server side, so it stays fresh longer
pub fn use_stack_image_status(
    queries: &QueryClient,
    client: &ApiClient,
    stack_id: u64,
) -> QueryObserver<Outcome<StackImageStatus>> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_stale_time(Duration::from_secs(60));

    queries.watch_query(keys::image_status(stack_id), options, move || {
        let client = client.clone();
        async move { get_stack_image_status(&client, stack_id).await.into_query_result() }
    })
}

pub fn use_start_stack(queries: &QueryClient, client: &ApiClient) -> Mutation<StackRef, ()> {
    let client = client.clone();
    let options = MutationOptions::new()
        .invalidates(keys::all())
        .with_error("Failure", "Unable to start stack");

    Mutation::new(queries, options, move |stack: StackRef| {
        let client = client.clone();
        async move { start_stack(&client, stack.stack_id, stack.environment_id).await }
    })
}

pub fn use_stop_stack(queries: &QueryClient, client: &ApiClient) -> Mutation<StackRef, ()> {
    let client = client.clone();
    let options = MutationOptions::new()
        .invalidates(keys::all())
        .with_error("Failure", "Unable to stop stack");

    Mutation::new(queries, options, move |stack: StackRef| {
        let client = client.clone();
        async move { stop_stack(&client, stack.stack_id, stack.environment_id).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credentials;

    #[test]
    fn test_unknown_image_status() {
        let status = StackImageStatus::unknown(7);
        assert_eq!(status.status, "unknown");
        assert_eq!(status.message, "Unable to retrieve image status for stack: 7");
    }

    #[test]
    fn test_image_status_serializes_pascal_case() {
        let json = serde_json::to_value(StackImageStatus::unknown(7)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Status": "unknown", "Message": "Unable to retrieve image status for stack: 7"})
        );
    }

    #[test]
    fn test_stack_deserializes_api_shape() {
        let stack: Stack =
            serde_json::from_str(r#"{"Id": 7, "Name": "web", "Type": 2, "EndpointId": 3, "Status": 1}"#).unwrap();
        assert_eq!(stack.endpoint_id, 3);
        assert!(stack.is_active());
    }

    #[test]
    fn test_keys_nest_under_stacks() {
        assert_eq!(keys::image_status(7).parts(), &["stacks", "7", "images_status"]);
        assert!(keys::image_status(7).starts_with(&keys::item(7)));
        assert!(keys::item(7).starts_with(&keys::all()));
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades_image_status() {
        // Nothing listens on port 9; the connection is refused
        let client = ApiClient::new("http://127.0.0.1:9/api", Credentials::Anonymous, None).unwrap();

        let outcome = get_stack_image_status(&client, 7).await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value(), Some(&StackImageStatus::unknown(7)));
    }
}
