//! Mutations
//!
//! A [`Mutation`] wraps a write accessor. On success it invalidates the query
//! keys it declares so dependent reads refetch; on failure it reports the
//! error like a query would.

use super::client::QueryClient;
use super::options::MutationOptions;
use crate::api::NormalizedError;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Status of the last `mutate` call
#[derive(Debug, Clone)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error(NormalizedError),
}

type MutateFn<I, T> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<T, NormalizedError>> + Send + Sync>;

/// Write operation bound to a query client
pub struct Mutation<I, T> {
    client: QueryClient,
    options: MutationOptions,
    mutate_fn: MutateFn<I, T>,
    status: MutationStatus,
}

impl<I, T> Mutation<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    pub fn new<F, Fut>(client: &QueryClient, options: MutationOptions, mutate_fn: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        Self {
            client: client.clone(),
            options,
            mutate_fn: Arc::new(move |input| mutate_fn(input).boxed()),
            status: MutationStatus::Idle,
        }
    }

    /// Run the mutation
    pub async fn mutate(&mut self, input: I) -> Result<T, NormalizedError> {
        self.status = MutationStatus::Pending;
        let result = (self.mutate_fn)(input).await;

        match &result {
            Ok(_) => {
                for key in &self.options.invalidates {
                    self.client.invalidate_queries(key);
                }
                self.status = MutationStatus::Success;
            },
            Err(error) => {
                tracing::warn!("mutation failed: {}", error);
                if let Some(meta) = &self.options.error {
                    self.client.reporter().report(meta, error);
                }
                self.status = MutationStatus::Error(error.clone());
            },
        }

        result
    }

    pub fn status(&self) -> &MutationStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, MutationStatus::Pending)
    }

    pub fn error(&self) -> Option<&NormalizedError> {
        match &self.status {
            MutationStatus::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn options(&self) -> &MutationOptions {
        &self.options
    }

    /// Back to [`MutationStatus::Idle`]
    pub fn reset(&mut self) {
        self.status = MutationStatus::Idle;
    }
}

impl<I, T> fmt::Debug for Mutation<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("options", &self.options)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{normalize, TransportError};
    use crate::query::{ErrorMeta, ErrorReporter, QueryOptions};
    use crate::query_key;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingReporter {
        titles: Mutex<Vec<String>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, meta: &ErrorMeta, _error: &NormalizedError) {
            self.titles.lock().unwrap().push(meta.title.clone());
        }
    }

    #[tokio::test]
    async fn test_success_invalidates_declared_prefixes() {
        let client = QueryClient::default();
        let fresh = QueryOptions::default().with_stale_time(Duration::from_secs(60));
        client.set_query_data(query_key!["environments", 3, "nomad", "jobs"], vec!["web"]);
        client.set_query_data(query_key!["stacks"], vec!["other"]);

        let mut mutation = Mutation::new(
            &client,
            MutationOptions::new().invalidates(query_key!["environments", 3]),
            |job: String| async move { Ok::<_, NormalizedError>(job) },
        );
        assert_eq!(mutation.mutate("web".to_string()).await.unwrap(), "web");
        assert!(matches!(mutation.status(), MutationStatus::Success));

        let jobs = client.watch_query::<Vec<&str>, _, _>(
            query_key!["environments", 3, "nomad", "jobs"],
            fresh.clone(),
            || async { Ok(Vec::new()) },
        );
        assert!(jobs.state().is_stale);

        let stacks = client.watch_query::<Vec<&str>, _, _>(query_key!["stacks"], fresh, || async {
            Ok(Vec::new())
        });
        assert!(!stacks.state().is_stale);
    }

    #[tokio::test]
    async fn test_failure_reports_and_skips_invalidation() {
        let reporter = Arc::new(RecordingReporter::default());
        let client = QueryClient::new(reporter.clone(), QueryOptions::default());
        let fresh = QueryOptions::default().with_stale_time(Duration::from_secs(60));
        client.set_query_data(query_key!["stacks"], 1u8);

        let mut mutation = Mutation::new(
            &client,
            MutationOptions::new()
                .invalidates(query_key!["stacks"])
                .with_error("Failure", "Unable to stop stack"),
            |_: u64| async {
                Err::<(), _>(normalize(
                    TransportError::InvalidRequest("conflict".into()),
                    Some("Unable to stop stack"),
                ))
            },
        );

        let err = mutation.mutate(7).await.unwrap_err();
        assert_eq!(err.message(), "Unable to stop stack");
        assert_eq!(mutation.error().map(|e| e.message()), Some("Unable to stop stack"));
        assert_eq!(reporter.titles.lock().unwrap().as_slice(), &["Failure".to_string()]);

        let stacks = client.watch_query::<u8, _, _>(query_key!["stacks"], fresh, || async { Ok(2) });
        assert!(!stacks.state().is_stale);

        mutation.reset();
        assert!(matches!(mutation.status(), MutationStatus::Idle));
    }
}
