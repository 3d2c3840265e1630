use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of characters kept from a post's self-text.
pub const MAX_TEXT_CHARS: usize = 500;
/// Maximum number of characters kept in the searchable `full_text` field.
pub const MAX_FULL_TEXT_CHARS: usize = 1000;
/// Author recorded when the origin reports none.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// A normalized post as persisted in the store. `id` is the upsert key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub text: String,
    pub full_text: String,
    pub subreddit: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub score: u32,
    pub comment_count: u32,
    pub url: String,
    pub upvote_ratio: f64,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    New,
    Hot,
    Top,
    Rising,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::New => "new",
            SortMode::Hot => "hot",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(SortMode::New),
            "hot" => Ok(SortMode::Hot),
            "top" => Ok(SortMode::Top),
            "rising" => Ok(SortMode::Rising),
            other => Err(ConfigError::InvalidValue {
                field: "sort".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Truncate `s` to at most `max_chars` Unicode scalar values.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_mode_round_trip() {
        for mode in [SortMode::New, SortMode::Hot, SortMode::Top, SortMode::Rising] {
            assert_eq!(mode.to_string().parse::<SortMode>().unwrap(), mode);
        }
        assert_eq!(" HOT ".parse::<SortMode>().unwrap(), SortMode::Hot);
        assert!("controversial".parse::<SortMode>().is_err());
    }

    #[test]
    fn test_truncate_chars_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("日本語テキスト", 3).chars().count(), 3);
        assert_eq!(truncate_chars("", 5), "");
    }
}
