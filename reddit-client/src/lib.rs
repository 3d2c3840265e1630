pub mod api;
pub mod fetcher;
pub mod metrics;
pub mod normalize;
pub mod rate_limiter;


pub use api::{ClientConfig, RawPost, RedditJsonClient, MAX_PAGE_SIZE};
pub use fetcher::{fetch_many, flatten_items, total_items, FetchPlan, PostSource, SourceBatch};
pub use metrics::FetchMetrics;
pub use normalize::{decode, normalize, normalize_batch};
pub use rate_limiter::{HostRateLimiter, RateLimitConfig, RateLimiter};
