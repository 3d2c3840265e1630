mod repository;
mod sqlite;
mod store;


pub use repository::PostRepository;
pub use sqlite::SqlitePostStore;
pub use store::{
    FailedWrite, PostQuery, PostStore, UpsertOutcome, DEFAULT_QUERY_LIMIT,
    DEFAULT_TOPIC_WINDOW_DAYS,
};
