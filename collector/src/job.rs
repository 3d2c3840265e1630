use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::PostRepository;
use reddit_client::{fetch_many, normalize_batch, total_items, FetchMetrics, FetchPlan, PostSource};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use trendradar_core::AppConfig;
use uuid::Uuid;

/// What one collection tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub run_id: Uuid,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub fetched: usize,
    pub dropped: usize,
    pub saved: usize,
    pub failed_saves: usize,
    /// Listing requests issued this tick, as reported by the source.
    pub requests: u64,
    pub rate_limited: u64,
    pub average_response_time: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collection complete: {} posts saved ({} fetched, {} dropped, {} failed saves) from {}/{} sources; {} requests, {} rate limited, {}ms average",
            self.saved,
            self.fetched,
            self.dropped,
            self.failed_saves,
            self.sources_ok,
            self.sources_ok + self.sources_failed,
            self.requests,
            self.rate_limited,
            self.average_response_time.as_millis()
        )
    }
}

/// A unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run_tick(&self, clock: &dyn Clock) -> TickSummary;
}

/// Fetch every configured source, normalize the items and store them.
pub struct CollectorJob {
    source: Arc<dyn PostSource>,
    sources: Vec<String>,
    plan: FetchPlan,
    repository: PostRepository,
}

impl CollectorJob {
    pub fn new(
        source: Arc<dyn PostSource>,
        sources: Vec<String>,
        plan: FetchPlan,
        repository: PostRepository,
    ) -> Self {
        Self {
            source,
            sources,
            plan,
            repository,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn PostSource>,
        repository: PostRepository,
    ) -> Self {
        let plan = FetchPlan {
            sort: config.sort,
            per_source_limit: config.posts_per_subreddit,
            concurrency: config.fetch_concurrency,
        };
        Self::new(source, config.subreddits.clone(), plan, repository)
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn repository(&self) -> &PostRepository {
        &self.repository
    }

    async fn collect(&self, run_id: Uuid, clock: &dyn Clock) -> TickSummary {
        let started_at = clock.now();
        info!("Starting collection from {} sources", self.sources.len());

        let batches = fetch_many(self.source.as_ref(), &self.sources, &self.plan).await;
        let metrics = self.source.take_metrics().await.unwrap_or_default();
        log_source_metrics(&metrics);

        let mut records = Vec::new();
        let mut dropped = 0;
        for batch in batches.iter().filter(|b| b.is_ok()) {
            let (normalized, rejected) =
                normalize_batch(batch.items(), &batch.source_name, started_at);
            info!(
                "r/{}: {} posts ({} dropped)",
                batch.source_name,
                normalized.len(),
                rejected.len()
            );
            dropped += rejected.len();
            records.extend(normalized);
        }

        let outcome = self.repository.upsert_many(&records).await;
        let sources_ok = batches.iter().filter(|b| b.is_ok()).count();

        let summary = TickSummary {
            run_id,
            sources_ok,
            sources_failed: batches.len() - sources_ok,
            fetched: total_items(&batches),
            dropped,
            saved: outcome.saved_count(),
            failed_saves: outcome.failed_count(),
            requests: metrics.total_requests,
            rate_limited: metrics.rate_limited_requests,
            average_response_time: metrics.average_response_time(),
            started_at,
            finished_at: clock.now(),
        };
        info!("{}", summary);
        summary
    }
}

fn log_source_metrics(metrics: &FetchMetrics) {
    let mut names: Vec<&String> = metrics.requests_by_source.keys().collect();
    names.sort();
    for name in names {
        let source = &metrics.requests_by_source[name];
        debug!(
            source_name = %name,
            "r/{}: {} requests, {}ms average ({}ms..{}ms)",
            name,
            source.request_count,
            source.average_response_time().as_millis(),
            source.min_response_time.as_millis(),
            source.max_response_time.as_millis()
        );
        if let Some(code) = &source.last_error {
            warn!(source_name = %name, code = %code, "r/{} had {} failed requests", name, source.error_count);
        }
    }
}

#[async_trait]
impl Job for CollectorJob {
    async fn run_tick(&self, clock: &dyn Clock) -> TickSummary {
        let run_id = Uuid::new_v4();
        self.collect(run_id, clock)
            .instrument(info_span!("tick", run_id = %run_id))
            .await
    }
}
