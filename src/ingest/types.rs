// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Headline categories accepted by the news source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Business,
    Entertainment,
    General,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Business,
        Category::Entertainment,
        Category::General,
        Category::Health,
        Category::Science,
        Category::Sports,
        Category::Technology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::General => "general",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| format!("unknown news category `{t}`"))
    }
}

/// A headline as handed over by a source, before identity is derived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHeadline {
    pub title: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>, // RFC 3339 as delivered
    pub source_name: Option<String>,
    pub raw: serde_json::Value,
}

/// One distinct news event. Two articles with the same `id` are the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub source_category: Category,
    pub published_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub source_name: Option<String>,
    pub raw_metadata: serde_json::Value,
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// One upstream call for one category. Errors must be classified.
    async fn fetch_category(&self, category: Category) -> Result<Vec<RawHeadline>>;
    fn name(&self) -> &'static str;
}
