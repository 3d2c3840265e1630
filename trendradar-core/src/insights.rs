//! Aggregations the dashboard draws from a window of stored posts.
//!
//! Everything here is pure: callers fetch records through the repository and
//! hand the slice in.

use crate::types::PostRecord;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardKpis {
    pub total_posts: usize,
    pub posts_last_24h: usize,
    pub average_engagement: f64,
    pub peak_engagement: u64,
    pub total_comments: u64,
    pub average_comments: f64,
    pub unique_authors: usize,
    pub active_subreddits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMention {
    pub topic: String,
    pub count: usize,
    pub percentage: f64,
}

pub fn engagement(post: &PostRecord) -> u64 {
    post.score as u64 + 2 * post.comment_count as u64
}

pub fn trending_score(post: &PostRecord) -> u64 {
    post.score as u64 + 3 * post.comment_count as u64
}

pub fn summarize(posts: &[PostRecord], now: DateTime<Utc>) -> DashboardKpis {
    if posts.is_empty() {
        return DashboardKpis::default();
    }

    let day_ago = now - Duration::days(1);
    let total = posts.len();
    let engagements: Vec<u64> = posts.iter().map(engagement).collect();
    let total_comments: u64 = posts.iter().map(|p| p.comment_count as u64).sum();

    DashboardKpis {
        total_posts: total,
        posts_last_24h: posts.iter().filter(|p| p.created_at > day_ago).count(),
        average_engagement: engagements.iter().sum::<u64>() as f64 / total as f64,
        peak_engagement: engagements.iter().copied().max().unwrap_or(0),
        total_comments,
        average_comments: total_comments as f64 / total as f64,
        unique_authors: posts
            .iter()
            .map(|p| p.author.as_str())
            .collect::<HashSet<_>>()
            .len(),
        active_subreddits: posts
            .iter()
            .map(|p| p.subreddit.as_str())
            .collect::<HashSet<_>>()
            .len(),
    }
}

/// Top `n` posts by trending score; newer posts win ties.
pub fn trending(posts: &[PostRecord], n: usize) -> Vec<&PostRecord> {
    let mut ranked: Vec<&PostRecord> = posts.iter().collect();
    ranked.sort_by(|a, b| {
        trending_score(b)
            .cmp(&trending_score(a))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    ranked.truncate(n);
    ranked
}

pub fn subreddit_activity(posts: &[PostRecord], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in posts {
        *counts.entry(post.subreddit.as_str()).or_default() += 1;
    }

    let mut activity: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    activity.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    activity.truncate(n);
    activity
}

pub fn mentions(post: &PostRecord, topic: &str) -> bool {
    !topic.is_empty() && post.full_text.to_lowercase().contains(&topic.to_lowercase())
}

pub fn topic_mentions(posts: &[PostRecord], topics: &[&str]) -> Vec<TopicMention> {
    if posts.is_empty() {
        return Vec::new();
    }

    let mut result: Vec<TopicMention> = topics
        .iter()
        .filter_map(|topic| {
            let count = posts.iter().filter(|p| mentions(p, topic)).count();
            (count > 0).then(|| TopicMention {
                topic: topic.to_string(),
                count,
                percentage: count as f64 / posts.len() as f64 * 100.0,
            })
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count));
    result
}

pub fn daily_mentions(posts: &[PostRecord], topic: &str) -> Vec<(NaiveDate, usize)> {
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for post in posts.iter().filter(|p| mentions(p, topic)) {
        *days.entry(post.created_at.date_naive()).or_default() += 1;
    }
    days.into_iter().collect()
}

/// Post counts bucketed by UTC hour of creation.
pub fn hourly_activity(posts: &[PostRecord]) -> [usize; 24] {
    let mut hours = [0usize; 24];
    for post in posts {
        hours[post.created_at.hour() as usize] += 1;
    }
    hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: &str, subreddit: &str, hours_ago: i64, score: u32, comments: u32) -> PostRecord {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        PostRecord {
            id: id.to_string(),
            title: format!("Post {id}"),
            text: String::new(),
            full_text: format!("Post {id} about Rust and AI"),
            subreddit: subreddit.to_string(),
            author: format!("author_{}", id.len()),
            created_at: now - Duration::hours(hours_ago),
            score,
            comment_count: comments,
            url: format!("https://reddit.com/r/{subreddit}/comments/{id}/"),
            upvote_ratio: 0.9,
            collected_at: now,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[], now()), DashboardKpis::default());
    }

    #[test]
    fn test_summarize_counts() {
        let posts = vec![
            post("a", "rust", 1, 10, 5),
            post("bb", "rust", 30, 4, 0),
            post("c", "python", 2, 0, 1),
        ];
        let kpis = summarize(&posts, now());

        assert_eq!(kpis.total_posts, 3);
        assert_eq!(kpis.posts_last_24h, 2);
        assert_eq!(kpis.peak_engagement, 20);
        assert!((kpis.average_engagement - 26.0 / 3.0).abs() < 1e-9);
        assert_eq!(kpis.total_comments, 6);
        assert!((kpis.average_comments - 2.0).abs() < 1e-9);
        assert_eq!(kpis.unique_authors, 2);
        assert_eq!(kpis.active_subreddits, 2);
    }

    #[test]
    fn test_trending_orders_by_score_then_recency() {
        let posts = vec![
            post("low", "rust", 1, 1, 0),
            post("old", "rust", 10, 30, 0),
            post("new", "rust", 2, 30, 0),
            post("chatty", "rust", 5, 0, 20),
        ];
        let top: Vec<&str> = trending(&posts, 3).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(top, vec!["chatty", "new", "old"]);
    }

    #[test]
    fn test_subreddit_activity_ties_are_alphabetical() {
        let posts = vec![
            post("a", "rust", 1, 0, 0),
            post("b", "python", 1, 0, 0),
            post("c", "rust", 1, 0, 0),
            post("d", "go", 1, 0, 0),
        ];
        let activity = subreddit_activity(&posts, 2);
        assert_eq!(
            activity,
            vec![("rust".to_string(), 2), ("go".to_string(), 1)]
        );
    }

    #[test]
    fn test_topic_mentions_are_case_insensitive() {
        let mut other = post("z", "rust", 1, 0, 0);
        other.full_text = "nothing relevant".to_string();
        let posts = vec![post("a", "rust", 1, 0, 0), other];

        let result = topic_mentions(&posts, &["ai", "RUST", "golang"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].count, 1);
        assert!((result[0].percentage - 50.0).abs() < 1e-9);
        assert!(result.iter().all(|m| m.topic != "golang"));
    }

    #[test]
    fn test_daily_and_hourly_buckets() {
        let posts = vec![
            post("a", "rust", 1, 0, 0),
            post("b", "rust", 2, 0, 0),
            post("c", "rust", 26, 0, 0),
        ];

        let daily = daily_mentions(&posts, "ai");
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].1, 1);
        assert_eq!(daily[1].1, 2);
        assert!(daily[0].0 < daily[1].0);

        let hourly = hourly_activity(&posts);
        assert_eq!(hourly.iter().sum::<usize>(), 3);
        assert_eq!(hourly[11], 1);
        assert_eq!(hourly[10], 2);
    }
}
