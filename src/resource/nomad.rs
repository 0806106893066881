//! Nomad
//!
//! Dashboard counters and jobs of Nomad environments.

use super::require_identifier;
use crate::api::{build_url, ApiClient, EnvironmentId, NormalizedError, ResourceId, ResultExt};
use crate::query::{Mutation, MutationOptions, QueryClient, QueryObserver};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregate counters shown on the Nomad dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NomadDashboard {
    pub job_count: u64,
    pub group_count: u64,
    pub task_count: u64,
    pub running_task_count: u64,
    pub node_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub submit_time: i64,
}

/// Input of the delete mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    pub id: String,
    pub namespace: String,
}

pub mod keys {
    use crate::api::EnvironmentId;
    use crate::query::QueryKey;
    use crate::resource::environments;

    pub fn dashboard(environment_id: EnvironmentId) -> QueryKey {
        environments::keys::item(environment_id).with("dashboard")
    }

    pub fn jobs(environment_id: EnvironmentId) -> QueryKey {
        environments::keys::item(environment_id).with("nomad").with("jobs")
    }
}

/// Fetch the dashboard of a Nomad environment
///
/// Generic over the response shape so callers can ask for raw JSON.
pub async fn get_dashboard<T>(client: &ApiClient, environment_id: EnvironmentId) -> Result<T, NormalizedError>
where
    T: serde::de::DeserializeOwned,
{
    client
        .get(&client.nomad_url(environment_id, "dashboard"), &[])
        .await
        .with_context(|| "Unable to retrieve Nomad dashboard".to_string())
}

pub async fn list_jobs(client: &ApiClient, environment_id: EnvironmentId) -> Result<Vec<Job>, NormalizedError> {
    client
        .get(&client.nomad_url(environment_id, "jobs"), &[])
        .await
        .with_context(|| "Unable to retrieve Nomad jobs".to_string())
}

pub async fn delete_job(
    client: &ApiClient,
    environment_id: EnvironmentId,
    job_id: &str,
    namespace: &str,
) -> Result<(), NormalizedError> {
    let context = || format!("Unable to delete job {}", job_id);
    require_identifier("job id", job_id, context)?;
    require_identifier("namespace", namespace, context)?;

    let path = build_url(
        &client.nomad_url(environment_id, "jobs"),
        Some(&ResourceId::from(job_id)),
        None,
    );
    let _: IgnoredAny = client
        .delete(&path, &[("namespace", namespace)])
        .await
        .with_context(context)?;

    tracing::info!("Deleted Nomad job {} in namespace {}", job_id, namespace);
    Ok(())
}

// =============================================================================
// Hooks
// =============================================================================

/// Subscribe to the dashboard of a Nomad environment
///
/// Generic over the response shape, like [`get_dashboard`].
pub fn use_dashboard<T>(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> QueryObserver<T>
where
    T: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    let client = client.clone();
    let options = queries
        .default_options()
        .with_stale_time(Duration::from_secs(10))
        .with_error("Failure", "Unable to retrieve Nomad dashboard");

    queries.watch_query(keys::dashboard(environment_id), options, move || {
        let client = client.clone();
        async move { get_dashboard::<T>(&client, environment_id).await }
    })
}

pub fn use_jobs(queries: &QueryClient, client: &ApiClient, environment_id: EnvironmentId) -> QueryObserver<Vec<Job>> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_error("Failure", "Unable to retrieve Nomad jobs");

    queries.watch_query(keys::jobs(environment_id), options, move || {
        let client = client.clone();
        async move { list_jobs(&client, environment_id).await }
    })
}

pub fn use_delete_job(queries: &QueryClient, client: &ApiClient, environment_id: EnvironmentId) -> Mutation<JobRef, ()> {
    let client = client.clone();
    let options = MutationOptions::new()
        .invalidates(keys::jobs(environment_id))
        .invalidates(keys::dashboard(environment_id))
        .with_error("Failure", "Unable to delete job");

    Mutation::new(queries, options, move |job: JobRef| {
        let client = client.clone();
        async move { delete_job(&client, environment_id, &job.id, &job.namespace).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credentials;

    #[test]
    fn test_dashboard_defaults_missing_counters() {
        let dashboard: NomadDashboard = serde_json::from_str(r#"{"JobCount": 4, "NodeCount": 2}"#).unwrap();
        assert_eq!(dashboard.job_count, 4);
        assert_eq!(dashboard.node_count, 2);
        assert_eq!(dashboard.running_task_count, 0);
    }

    #[test]
    fn test_job_deserializes_api_shape() {
        let job: Job =
            serde_json::from_str(r#"{"ID": "web", "Namespace": "default", "Status": "running"}"#).unwrap();
        assert_eq!(job.id, "web");
        assert_eq!(job.submit_time, 0);
    }

    #[test]
    fn test_keys() {
        let env = EnvironmentId::new(3);
        assert_eq!(keys::dashboard(env).parts(), &["environments", "3", "dashboard"]);
        assert_eq!(keys::jobs(env).parts(), &["environments", "3", "nomad", "jobs"]);
    }

    #[tokio::test]
    async fn test_delete_job_rejects_empty_id() {
        let client = ApiClient::new("http://127.0.0.1:9/api", Credentials::Anonymous, None).unwrap();

        let err = delete_job(&client, EnvironmentId::new(3), "", "default").await.unwrap_err();
        assert!(err.message().starts_with("Unable to delete job"));
        assert_eq!(err.cause().to_string(), "invalid request: job id must not be empty");
        assert!(err.status().is_none());
    }
}
