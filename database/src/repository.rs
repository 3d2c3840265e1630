use crate::sqlite::SqlitePostStore;
use crate::store::{PostQuery, PostStore, UpsertOutcome};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};
use trendradar_core::{ErrorExt, PostRecord};

/// Shared handle to the post collection.
///
/// A repository without a store is "disabled": writes save nothing and reads
/// come back empty, so a missing database never stops collection.
#[derive(Clone)]
pub struct PostRepository {
    store: Option<Arc<dyn PostStore>>,
}

impl std::fmt::Debug for PostRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostRepository")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl PostRepository {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Open the SQLite store at `url`. Falls back to a disabled repository
    /// when the store can't be opened.
    pub async fn connect(url: &str) -> Self {
        match SqlitePostStore::connect(url).await {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                e.log_error();
                warn!("Post store unavailable, continuing without persistence");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn upsert_many(&self, records: &[PostRecord]) -> UpsertOutcome {
        match &self.store {
            Some(store) => store.upsert_many(records).await,
            None => {
                warn!("Post store disabled, {} records not saved", records.len());
                UpsertOutcome::default()
            }
        }
    }

    pub async fn get_posts(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        subreddit: Option<&str>,
        limit: usize,
    ) -> Vec<PostRecord> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        let query = PostQuery {
            start,
            end,
            subreddit: subreddit.map(str::to_string),
            limit,
        };
        match store.query(&query).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(code = %e.error_code(), "Error retrieving posts: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get_topic_mentions(&self, topic: &str, window_days: u32) -> Vec<PostRecord> {
        self.get_topic_mentions_at(topic, window_days, Utc::now()).await
    }

    /// Same as [`get_topic_mentions`](Self::get_topic_mentions) with an explicit window end.
    pub async fn get_topic_mentions_at(
        &self,
        topic: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Vec<PostRecord> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        match store.search_topic(topic, window_days, now).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(topic = %topic, code = %e.error_code(), "Error searching posts: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn count(&self) -> u64 {
        let Some(store) = &self.store else {
            return 0;
        };
        match store.count().await {
            Ok(count) => count,
            Err(e) => {
                error!(code = %e.error_code(), "Error counting posts: {}", e);
                0
            }
        }
    }

    pub async fn close(&self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
    }
}
