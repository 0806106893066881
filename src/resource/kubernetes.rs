//! Kubernetes
//!
//! Namespaces and application lifecycle on Kubernetes environments.

use super::require_identifier;
use crate::api::{append_segments, ApiClient, EnvironmentId, NormalizedError, ResultExt};
use crate::query::{Mutation, MutationOptions, QueryClient, QueryObserver};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub creation_date: String,
}

/// An application workload, addressed by namespace, kind and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRef {
    pub namespace: String,
    /// Workload kind such as `deployment`, `daemonset` or `statefulset`
    pub kind: String,
    pub name: String,
}

impl ApplicationRef {
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

pub mod keys {
    use crate::api::EnvironmentId;
    use crate::query::QueryKey;
    use crate::resource::environments;

    pub fn base(environment_id: EnvironmentId) -> QueryKey {
        environments::keys::item(environment_id).with("kubernetes")
    }

    pub fn namespaces(environment_id: EnvironmentId) -> QueryKey {
        base(environment_id).with("namespaces")
    }

    pub fn applications(environment_id: EnvironmentId) -> QueryKey {
        base(environment_id).with("applications")
    }
}

pub async fn get_namespaces(
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> Result<Vec<Namespace>, NormalizedError> {
    client
        .get(&client.kubernetes_url(environment_id, "namespaces"), &[])
        .await
        .with_context(|| "Unable to retrieve namespaces".to_string())
}

/// Trigger a rolling restart of an application
pub async fn rollout_restart_application(
    client: &ApiClient,
    environment_id: EnvironmentId,
    namespace: &str,
    kind: &str,
    name: &str,
) -> Result<(), NormalizedError> {
    let context = || {
        format!(
            "Failed to restart application {}/{} in namespace {}",
            kind, name, namespace
        )
    };
    require_identifier("namespace", namespace, context)?;
    require_identifier("application kind", kind, context)?;
    require_identifier("application name", name, context)?;

    let path = append_segments(
        &client.kubernetes_url(environment_id, "namespaces"),
        &[namespace, "applications", kind, name],
    );
    let _: IgnoredAny = client
        .post::<(), _>(&path, &[("rollout-restart", "true")], None)
        .await
        .with_context(context)?;

    tracing::info!(
        "Restarted application {}/{} in namespace {} on environment {}",
        kind,
        name,
        namespace,
        environment_id
    );
    Ok(())
}

// =============================================================================
// Hooks
// =============================================================================

pub fn use_namespaces(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> QueryObserver<Vec<Namespace>> {
    let client = client.clone();
    let options = queries
        .default_options()
        .with_stale_time(Duration::from_secs(30))
        .with_error("Failure", "Unable to retrieve namespaces");

    queries.watch_query(keys::namespaces(environment_id), options, move || {
        let client = client.clone();
        async move { get_namespaces(&client, environment_id).await }
    })
}

pub fn use_restart_application(
    queries: &QueryClient,
    client: &ApiClient,
    environment_id: EnvironmentId,
) -> Mutation<ApplicationRef, ()> {
    let client = client.clone();
    let options = MutationOptions::new()
        .invalidates(keys::applications(environment_id))
        .with_error("Failure", "Unable to restart application");

    Mutation::new(queries, options, move |app: ApplicationRef| {
        let client = client.clone();
        async move {
            rollout_restart_application(&client, environment_id, &app.namespace, &app.kind, &app.name).await
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credentials;

    #[test]
    fn test_namespace_deserializes_api_shape() {
        let namespaces: Vec<Namespace> = serde_json::from_str(
            r#"[{"Name": "default", "IsDefault": true}, {"Name": "kube-system", "IsSystem": true}]"#,
        )
        .unwrap();
        assert!(namespaces[0].is_default);
        assert!(namespaces[1].is_system);
    }

    #[test]
    fn test_keys_nest_under_environment() {
        let env = EnvironmentId::new(2);
        assert_eq!(keys::namespaces(env).parts(), &["environments", "2", "kubernetes", "namespaces"]);
        assert!(keys::applications(env).starts_with(&crate::resource::environments::keys::item(env)));
    }

    #[tokio::test]
    async fn test_restart_rejects_empty_name() {
        let client = ApiClient::new("http://127.0.0.1:9/api", Credentials::Anonymous, None).unwrap();

        let err = rollout_restart_application(&client, EnvironmentId::new(2), "default", "deployment", " ")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Failed to restart application deployment/  in namespace default");
        assert_eq!(
            err.cause().to_string(),
            "invalid request: application name must not be empty"
        );
    }
}
