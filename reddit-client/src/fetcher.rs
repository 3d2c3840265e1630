use crate::api::RedditJsonClient;
use crate::metrics::FetchMetrics;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};
use trendradar_core::{CoreError, ErrorExt, SortMode};

/// Anything that can produce a page of raw, undecoded items for a named source.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch(
        &self,
        source_name: &str,
        sort: SortMode,
        limit: u32,
    ) -> Result<Vec<Value>, CoreError>;

    /// Request metrics gathered since the last call, if the source keeps any.
    async fn take_metrics(&self) -> Option<FetchMetrics> {
        None
    }
}

#[async_trait]
impl PostSource for RedditJsonClient {
    async fn fetch(
        &self,
        source_name: &str,
        sort: SortMode,
        limit: u32,
    ) -> Result<Vec<Value>, CoreError> {
        RedditJsonClient::fetch(self, source_name, sort, limit).await
    }

    async fn take_metrics(&self) -> Option<FetchMetrics> {
        Some(RedditJsonClient::take_metrics(self).await)
    }
}

#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub sort: SortMode,
    pub per_source_limit: u32,
    /// Upper bound on fetches in flight. Politeness towards a single host is
    /// still enforced by the client's rate limiter.
    pub concurrency: usize,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            sort: SortMode::New,
            per_source_limit: 25,
            concurrency: 1,
        }
    }
}

#[derive(Debug)]
pub struct SourceBatch {
    pub source_name: String,
    pub result: Result<Vec<Value>, CoreError>,
}

impl SourceBatch {
    pub fn items(&self) -> &[Value] {
        match &self.result {
            Ok(items) => items,
            Err(_) => &[],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fetch every source in `sources`, returning one batch per source in the
/// same order. A failing source yields an empty, errored batch; the others
/// are unaffected.
pub async fn fetch_many<S>(source: &S, sources: &[String], plan: &FetchPlan) -> Vec<SourceBatch>
where
    S: PostSource + ?Sized,
{
    let batches: Vec<SourceBatch> = stream::iter(sources.iter().map(|name| async move {
        let result = source
            .fetch(name, plan.sort, plan.per_source_limit)
            .await;
        if let Err(e) = &result {
            e.log_warn();
            match e.retry_after() {
                Some(wait) => warn!(
                    source_name = %name,
                    "Skipping r/{} this run; origin asked for a {}s back-off",
                    name,
                    wait.as_secs()
                ),
                None if e.is_retryable() => {
                    info!(source_name = %name, "Skipping r/{} until the next run", name)
                }
                None => warn!(source_name = %name, "Skipping r/{}; the request needs fixing", name),
            }
        }
        SourceBatch {
            source_name: name.clone(),
            result,
        }
    }).collect::<Vec<_>>())
    .buffered(plan.concurrency.max(1))
    .collect()
    .await;

    info!(
        "Fetched {} posts from {}/{} sources",
        total_items(&batches),
        batches.iter().filter(|b| b.is_ok()).count(),
        batches.len()
    );
    batches
}

pub fn total_items(batches: &[SourceBatch]) -> usize {
    batches.iter().map(|b| b.items().len()).sum()
}

/// Combine the items of every successful batch, in source order.
pub fn flatten_items(batches: &[SourceBatch]) -> Vec<Value> {
    batches
        .iter()
        .flat_map(|b| b.items().iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use trendradar_core::FetchError;

    struct StubSource {
        pages: HashMap<String, usize>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubSource {
        fn new(pages: &[(&str, usize)]) -> Self {
            Self {
                pages: pages.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PostSource for StubSource {
        async fn fetch(
            &self,
            source_name: &str,
            _sort: SortMode,
            limit: u32,
        ) -> Result<Vec<Value>, CoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(source_name.to_string());
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.pages.get(source_name) {
                Some(count) => Ok((0..(*count).min(limit as usize))
                    .map(|i| json!({ "id": format!("{source_name}_{i}") }))
                    .collect()),
                None => Err(FetchError::Status {
                    source_name: source_name.to_string(),
                    status_code: 503,
                }
                .into()),
            }
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_source() {
        let source = StubSource::new(&[("rust", 3), ("python", 2)]);
        let sources = names(&["rust", "broken", "python"]);

        let batches = fetch_many(&source, &sources, &FetchPlan::default()).await;

        assert_eq!(batches.len(), 3);
        assert!(batches[0].is_ok());
        assert!(!batches[1].is_ok());
        assert!(batches[2].is_ok());
        assert_eq!(total_items(&batches), 5);

        let ids: Vec<String> = flatten_items(&batches)
            .into_iter()
            .filter_map(|p| p["id"].as_str().map(str::to_string))
            .collect();
        assert_eq!(
            ids,
            vec!["rust_0", "rust_1", "rust_2", "python_0", "python_1"]
        );
    }

    #[tokio::test]
    async fn test_sequential_by_default() {
        let source = StubSource::new(&[("a", 1), ("b", 1), ("c", 1)]);
        let sources = names(&["a", "b", "c"]);

        fetch_many(&source, &sources, &FetchPlan::default()).await;

        assert_eq!(*source.calls.lock().unwrap(), sources);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_preserves_order() {
        let source = StubSource::new(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        let sources = names(&["a", "b", "c", "d"]);
        let plan = FetchPlan {
            concurrency: 2,
            ..Default::default()
        };

        let batches = fetch_many(&source, &sources, &plan).await;

        let order: Vec<&str> = batches.iter().map(|b| b.source_name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(total_items(&batches), 10);
    }

    #[tokio::test]
    async fn test_limit_is_forwarded() {
        let source = StubSource::new(&[("a", 50)]);
        let plan = FetchPlan {
            per_source_limit: 10,
            ..Default::default()
        };

        let batches = fetch_many(&source, &names(&["a"]), &plan).await;
        assert_eq!(batches[0].items().len(), 10);
    }
}
