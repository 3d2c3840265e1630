use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trendradar_core::{PersistenceError, PostRecord};

pub const DEFAULT_QUERY_LIMIT: usize = 1000;
pub const DEFAULT_TOPIC_WINDOW_DAYS: u32 = 7;

/// Filter for [`PostStore::query`]. Time bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub subreddit: Option<String>,
    pub limit: usize,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            subreddit: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl PostQuery {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn in_subreddit(mut self, subreddit: impl Into<String>) -> Self {
        self.subreddit = Some(subreddit.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug)]
pub struct FailedWrite {
    pub id: String,
    pub error: PersistenceError,
}

/// Per-record result of a batch upsert.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedWrite>,
}

impl UpsertOutcome {
    pub fn saved_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A document store over a single logical collection of posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Replace-or-insert each record by `id`. Records are written
    /// independently; one failure never hides the others.
    async fn upsert_many(&self, records: &[PostRecord]) -> UpsertOutcome;

    /// Records matching `query`, newest `created_at` first.
    async fn query(&self, query: &PostQuery) -> Result<Vec<PostRecord>, PersistenceError>;

    /// Records whose `full_text` contains `topic` (case-insensitive) and were
    /// created within `window_days` before `now`, oldest first.
    async fn search_topic(
        &self,
        topic: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, PersistenceError>;

    async fn count(&self) -> Result<u64, PersistenceError>;

    async fn close(&self);
}
