use crate::api::RawPost;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use trendradar_core::{
    truncate_chars, ErrorExt, NormalizationError, PostRecord, DELETED_AUTHOR,
    MAX_FULL_TEXT_CHARS, MAX_TEXT_CHARS,
};

const PERMALINK_HOST: &str = "https://reddit.com";

/// Map a raw listing item onto the stored record shape.
///
/// `id`, `title`, `created_utc`, `score` and `num_comments` are required;
/// everything else falls back to a default. `subreddit` is the name the
/// source was requested under, not whatever casing the payload reports.
pub fn normalize(
    raw: &RawPost,
    subreddit: &str,
    collected_at: DateTime<Utc>,
) -> Result<PostRecord, NormalizationError> {
    let id = match raw.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return Err(NormalizationError::MissingField {
                item_id: None,
                field: "id",
            })
        }
    };
    let missing = |field: &'static str| NormalizationError::MissingField {
        item_id: Some(id.clone()),
        field,
    };

    let title = raw.title.clone().ok_or_else(|| missing("title"))?;
    let created_utc = raw.created_utc.ok_or_else(|| missing("created_utc"))?;
    let score = raw.score.ok_or_else(|| missing("score"))?;
    let num_comments = raw.num_comments.ok_or_else(|| missing("num_comments"))?;

    let created_at = timestamp_from_secs(created_utc).ok_or_else(|| {
        NormalizationError::InvalidTimestamp {
            item_id: id.clone(),
            value: created_utc,
        }
    })?;
    let collected_at = DateTime::from_timestamp(collected_at.timestamp(), 0).unwrap_or(collected_at);
    if created_at > collected_at {
        debug!("Post {} is dated after its collection time", id);
    }

    let selftext = raw.selftext.as_deref().unwrap_or_default();
    let mut full_text = title.clone();
    if !selftext.is_empty() {
        full_text.push(' ');
        full_text.push_str(selftext);
    }

    let author = raw
        .author
        .as_deref()
        .filter(|a| !a.is_empty())
        .unwrap_or(DELETED_AUTHOR)
        .to_string();

    let url = match raw.permalink.as_deref().filter(|p| !p.is_empty()) {
        Some(permalink) => format!("{PERMALINK_HOST}{permalink}"),
        None => format!("{PERMALINK_HOST}/r/{subreddit}/comments/{id}/"),
    };

    Ok(PostRecord {
        text: truncate_chars(selftext, MAX_TEXT_CHARS),
        full_text: truncate_chars(&full_text, MAX_FULL_TEXT_CHARS),
        subreddit: subreddit.to_string(),
        author,
        created_at,
        score: clamp_count(score),
        comment_count: clamp_count(num_comments),
        url,
        upvote_ratio: raw
            .upvote_ratio
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 1.0))
            .unwrap_or(0.0),
        collected_at,
        title,
        id,
    })
}

/// Decode one undecoded listing item into its typed view.
///
/// A field of the wrong JSON type fails only this item.
pub fn decode(item: &Value) -> Result<RawPost, NormalizationError> {
    RawPost::deserialize(item).map_err(|e| NormalizationError::Malformed {
        item_id: item.get("id").and_then(Value::as_str).map(str::to_string),
        details: e.to_string(),
    })
}

/// Normalize a page of items, dropping (and logging) the ones that fail.
pub fn normalize_batch(
    items: &[Value],
    subreddit: &str,
    collected_at: DateTime<Utc>,
) -> (Vec<PostRecord>, Vec<NormalizationError>) {
    let mut records = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();

    for item in items {
        match decode(item).and_then(|raw| normalize(&raw, subreddit, collected_at)) {
            Ok(record) => records.push(record),
            Err(e) => {
                e.log_warn();
                dropped.push(e);
            }
        }
    }

    (records, dropped)
}

fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let secs = secs.trunc();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp(secs as i64, 0)
}

fn clamp_count(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn collected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn raw() -> RawPost {
        RawPost {
            id: Some("abc123".to_string()),
            title: Some("Rust 2.0 announced".to_string()),
            selftext: Some("Not really.".to_string()),
            author: Some("ferris".to_string()),
            subreddit: Some("Rust".to_string()),
            permalink: Some("/r/rust/comments/abc123/rust_20_announced/".to_string()),
            url: None,
            created_utc: Some(1_714_560_000.0),
            score: Some(42),
            num_comments: Some(7),
            upvote_ratio: Some(0.93),
        }
    }

    #[test]
    fn test_normalize_complete_item() {
        let record = normalize(&raw(), "rust", collected()).unwrap();

        assert_eq!(record.id, "abc123");
        assert_eq!(record.title, "Rust 2.0 announced");
        assert_eq!(record.text, "Not really.");
        assert_eq!(record.full_text, "Rust 2.0 announced Not really.");
        assert_eq!(record.subreddit, "rust");
        assert_eq!(record.author, "ferris");
        assert_eq!(record.created_at, Utc.timestamp_opt(1_714_560_000, 0).unwrap());
        assert_eq!(record.score, 42);
        assert_eq!(record.comment_count, 7);
        assert_eq!(
            record.url,
            "https://reddit.com/r/rust/comments/abc123/rust_20_announced/"
        );
        assert_eq!(record.upvote_ratio, 0.93);
        assert_eq!(record.collected_at, collected());
    }

    #[test]
    fn test_truncation_bounds() {
        let mut item = raw();
        item.title = Some("T".repeat(20));
        item.selftext = Some("x".repeat(2000));

        let record = normalize(&item, "rust", collected()).unwrap();
        assert_eq!(record.text.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(record.full_text.chars().count(), MAX_FULL_TEXT_CHARS);
        assert!(record.full_text.starts_with(&"T".repeat(20)));
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let mut item = raw();
        item.author = None;
        item.upvote_ratio = None;
        item.selftext = None;
        item.permalink = None;

        let record = normalize(&item, "rust", collected()).unwrap();
        assert_eq!(record.author, DELETED_AUTHOR);
        assert_eq!(record.upvote_ratio, 0.0);
        assert_eq!(record.text, "");
        assert_eq!(record.full_text, "Rust 2.0 announced");
        assert_eq!(record.url, "https://reddit.com/r/rust/comments/abc123/");
    }

    #[test]
    fn test_missing_required_fields() {
        let mut item = raw();
        item.id = None;
        assert_eq!(
            normalize(&item, "rust", collected()),
            Err(NormalizationError::MissingField {
                item_id: None,
                field: "id"
            })
        );

        for field in ["title", "created_utc", "score", "num_comments"] {
            let mut item = raw();
            match field {
                "title" => item.title = None,
                "created_utc" => item.created_utc = None,
                "score" => item.score = None,
                _ => item.num_comments = None,
            }
            let err = normalize(&item, "rust", collected()).unwrap_err();
            assert_eq!(
                err,
                NormalizationError::MissingField {
                    item_id: Some("abc123".to_string()),
                    field
                }
            );
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        let mut item = raw();
        item.created_utc = Some(f64::INFINITY);
        assert!(matches!(
            normalize(&item, "rust", collected()),
            Err(NormalizationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_counts_and_ratio_are_clamped() {
        let mut item = raw();
        item.score = Some(-15);
        item.num_comments = Some(-1);
        item.upvote_ratio = Some(1.7);

        let record = normalize(&item, "rust", collected()).unwrap();
        assert_eq!(record.score, 0);
        assert_eq!(record.comment_count, 0);
        assert_eq!(record.upvote_ratio, 1.0);
    }

    #[test]
    fn test_collected_at_is_truncated_to_seconds() {
        let at = collected() + chrono::Duration::milliseconds(750);
        let record = normalize(&raw(), "rust", at).unwrap();
        assert_eq!(record.collected_at, collected());
    }

    fn item(raw: &RawPost) -> Value {
        serde_json::to_value(raw).unwrap()
    }

    #[test]
    fn test_batch_drops_bad_items_only() {
        let mut broken = raw();
        broken.id = Some("broken".to_string());
        broken.score = None;

        let mut second = raw();
        second.id = Some("def456".to_string());

        let (records, dropped) =
            normalize_batch(&[item(&raw()), item(&broken), item(&second)], "rust", collected());
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["abc123", "def456"]);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].item_id(), Some("broken"));
    }

    #[test]
    fn test_wrongly_typed_field_drops_only_that_item() {
        let mut wrong = item(&raw());
        wrong["id"] = json!("wrong");
        wrong["score"] = json!("n/a");

        let mut second = raw();
        second.id = Some("def456".to_string());

        let (records, dropped) =
            normalize_batch(&[item(&raw()), wrong, item(&second)], "rust", collected());
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["abc123", "def456"]);
        assert_eq!(dropped.len(), 1);
        assert!(matches!(
            &dropped[0],
            NormalizationError::Malformed { item_id: Some(id), .. } if id == "wrong"
        ));
    }

    #[test]
    fn test_decode_reports_unknown_id_for_non_objects() {
        let err = decode(&json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, NormalizationError::Malformed { item_id: None, .. }));
    }
}
