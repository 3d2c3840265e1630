use crate::store::{FailedWrite, PostQuery, PostStore, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, error, info};
use trendradar_core::{PersistenceError, PostRecord};

const POST_COLUMNS: &str = "id, title, text, full_text, subreddit, author, created_at, \
                            score, comment_count, url, upvote_ratio, collected_at";

const UPSERT_POST: &str = r#"
    INSERT INTO posts (
        id, title, text, full_text, subreddit, author, created_at,
        score, comment_count, url, upvote_ratio, collected_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        title = excluded.title,
        text = excluded.text,
        full_text = excluded.full_text,
        subreddit = excluded.subreddit,
        author = excluded.author,
        created_at = excluded.created_at,
        score = excluded.score,
        comment_count = excluded.comment_count,
        url = excluded.url,
        upvote_ratio = excluded.upvote_ratio,
        collected_at = excluded.collected_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: String,
    title: String,
    text: String,
    full_text: String,
    subreddit: String,
    author: String,
    created_at: i64,
    score: i64,
    comment_count: i64,
    url: String,
    upvote_ratio: f64,
    collected_at: i64,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = PersistenceError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let timestamp = |secs: i64, column: &str| {
            DateTime::from_timestamp(secs, 0).ok_or_else(|| PersistenceError::QueryFailed {
                query: format!("post {} has an out-of-range {}: {}", row.id, column, secs),
            })
        };
        let created_at = timestamp(row.created_at, "created_at")?;
        let collected_at = timestamp(row.collected_at, "collected_at")?;

        Ok(PostRecord {
            created_at,
            collected_at,
            score: row.score.clamp(0, u32::MAX as i64) as u32,
            comment_count: row.comment_count.clamp(0, u32::MAX as i64) as u32,
            id: row.id,
            title: row.title,
            text: row.text,
            full_text: row.full_text,
            subreddit: row.subreddit,
            author: row.author,
            url: row.url,
            upvote_ratio: row.upvote_ratio,
        })
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// SQLite-backed post collection. One pool per process.
#[derive(Debug, Clone)]
pub struct SqlitePostStore {
    pool: SqlitePool,
}

impl SqlitePostStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PersistenceError::ConnectionFailed {
                reason: format!("invalid database url {url:?}: {e}"),
            })?
            .create_if_missing(true);

        // Each in-memory connection would otherwise get its own database.
        let pool_options = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PersistenceError::MigrationFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to post store at {}", url);
        Ok(Self { pool })
    }

    async fn upsert_one(&self, record: &PostRecord) -> Result<(), PersistenceError> {
        if record.id.trim().is_empty() {
            return Err(PersistenceError::WriteFailed {
                id: record.id.clone(),
                reason: "empty id".to_string(),
            });
        }

        sqlx::query(UPSERT_POST)
            .bind(&record.id)
            .bind(&record.title)
            .bind(&record.text)
            .bind(&record.full_text)
            .bind(&record.subreddit)
            .bind(&record.author)
            .bind(record.created_at.timestamp())
            .bind(record.score as i64)
            .bind(record.comment_count as i64)
            .bind(&record.url)
            .bind(record.upvote_ratio)
            .bind(record.collected_at.timestamp())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Quote `topic` as a single FTS5 phrase so its characters match literally.
fn fts_phrase(topic: &str) -> String {
    format!("\"{}\"", topic.replace('"', "\"\""))
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn upsert_many(&self, records: &[PostRecord]) -> UpsertOutcome {
        let mut outcome = UpsertOutcome::default();

        for record in records {
            match self.upsert_one(record).await {
                Ok(()) => outcome.succeeded.push(record.id.clone()),
                Err(e) => {
                    error!(post_id = %record.id, "Error saving post: {}", e);
                    outcome.failed.push(FailedWrite {
                        id: record.id.clone(),
                        error: e,
                    });
                }
            }
        }

        debug!(
            "Upserted {} posts ({} failed)",
            outcome.saved_count(),
            outcome.failed_count()
        );
        outcome
    }

    async fn query(&self, query: &PostQuery) -> Result<Vec<PostRecord>, PersistenceError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE 1 = 1"));

        if let Some(start) = query.start {
            builder.push(" AND created_at >= ").push_bind(start.timestamp());
        }
        if let Some(end) = query.end {
            builder.push(" AND created_at <= ").push_bind(end.timestamp());
        }
        if let Some(subreddit) = &query.subreddit {
            builder.push(" AND subreddit = ").push_bind(subreddit.clone());
        }
        builder
            .push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));

        let rows: Vec<PostRow> = builder.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(PostRecord::try_from).collect()
    }

    async fn search_topic(
        &self,
        topic: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>, PersistenceError> {
        if topic.is_empty() {
            return Ok(Vec::new());
        }
        let start = now
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE created_at >= "
        ));
        builder.push_bind(start.timestamp());
        builder.push(" AND created_at <= ").push_bind(now.timestamp());

        // The trigram index needs at least one full trigram to match on.
        if topic.chars().count() >= 3 {
            builder
                .push(" AND rowid IN (SELECT rowid FROM posts_fts WHERE posts_fts MATCH ")
                .push_bind(fts_phrase(topic))
                .push(")");
        } else if topic.is_ascii() {
            // lower() only folds ASCII.
            builder
                .push(" AND instr(lower(full_text), ")
                .push_bind(topic.to_ascii_lowercase())
                .push(") > 0");
        }
        builder.push(" ORDER BY created_at ASC, id ASC");

        let rows: Vec<PostRow> = builder.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        let needle = topic.to_lowercase();
        rows.into_iter()
            .filter(|row| row.full_text.to_lowercase().contains(&needle))
            .map(PostRecord::try_from)
            .collect()
    }

    async fn count(&self) -> Result<u64, PersistenceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Post store closed");
    }
}
