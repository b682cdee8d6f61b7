// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;

use crate::ingest::types::{Article, Category, NewsSource, RawHeadline};
use crate::retry::RetryPolicy;

/// Placeholder NewsAPI puts in place of withdrawn articles.
const REMOVED_MARKER: &str = "[Removed]";
const MAX_TITLE_CHARS: usize = 500;

/// Normalize headline text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TITLE_CHARS {
        out = out.chars().take(MAX_TITLE_CHARS).collect();
    }
    out
}

/// Stable id: SHA-256 of the URL, or of title + timestamp when there is no URL.
pub fn derive_article_id(
    url: Option<&str>,
    title: Option<&str>,
    published_at: Option<&str>,
) -> Option<String> {
    let material = match (url, title) {
        (Some(u), _) if !u.trim().is_empty() => format!("url:{}", u.trim()),
        (_, Some(t)) if !t.trim().is_empty() => {
            format!("title:{}|{}", t.trim(), published_at.unwrap_or("").trim())
        }
        _ => return None,
    };
    let digest = Sha256::digest(material.as_bytes());
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Turn a raw record into an `Article`; `None` means the record is unusable.
pub fn normalize_headline(category: Category, raw: RawHeadline) -> Option<Article> {
    let title = raw.title.as_deref().map(normalize_text).unwrap_or_default();
    if title.is_empty() || title == REMOVED_MARKER {
        return None;
    }
    let id = derive_article_id(
        raw.url.as_deref(),
        Some(title.as_str()),
        raw.published_at.as_deref(),
    )?;
    let published_at = raw
        .published_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(Article {
        id,
        title,
        source_category: category,
        published_at,
        url: raw.url,
        source_name: raw.source_name,
        raw_metadata: raw.raw,
    })
}

/// Outcome of fetching all configured categories once.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Grouped by category in configuration order.
    pub articles: Vec<Article>,
    pub failed_categories: Vec<Category>,
    pub dropped: usize,
}

/// News source adapter: per-category retry, normalization, identity.
#[derive(Clone)]
pub struct NewsAdapter {
    source: Arc<dyn NewsSource>,
    retry: RetryPolicy,
}

impl NewsAdapter {
    pub fn new(source: Arc<dyn NewsSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Fetch one category with retries, normalized.
    pub async fn fetch_category(
        &self,
        category: Category,
    ) -> crate::error::Result<(Vec<Article>, usize)> {
        let source: &dyn NewsSource = self.source.as_ref();
        let label = format!("news:{category}");
        let raw = self
            .retry
            .run(&label, move |_| source.fetch_category(category))
            .await?;

        counter!("ingest_events_total").increment(raw.len() as u64);
        let mut dropped = 0usize;
        let mut out = Vec::with_capacity(raw.len());
        for r in raw {
            let hint = r.url.clone().or_else(|| r.title.clone()).unwrap_or_default();
            match normalize_headline(category, r) {
                Some(a) => out.push(a),
                None => {
                    dropped += 1;
                    tracing::info!(
                        %category,
                        hint = %hint,
                        "dropping record without a headline to analyze"
                    );
                }
            }
        }
        counter!("ingest_dropped_total").increment(dropped as u64);
        Ok((out, dropped))
    }

    /// Fetch all categories concurrently. A category that fails is skipped for
    /// this call only; the rest are returned in the order given.
    pub async fn fetch(&self, categories: &[Category]) -> FetchOutcome {
        let mut set = JoinSet::new();
        for (idx, &category) in categories.iter().enumerate() {
            let this = self.clone();
            set.spawn(async move { (idx, category, this.fetch_category(category).await) });
        }

        let mut results = Vec::with_capacity(categories.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(r) => results.push(r),
                Err(e) => tracing::error!(error = %e, "category fetch task panicked"),
            }
        }
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut outcome = FetchOutcome::default();
        for (_, category, res) in results {
            match res {
                Ok((mut articles, dropped)) => {
                    outcome.dropped += dropped;
                    outcome.articles.append(&mut articles);
                }
                Err(e) => {
                    counter!("ingest_provider_errors_total").increment(1);
                    tracing::warn!(
                        %category,
                        provider = self.source.name(),
                        kind = e.kind(),
                        error = %e,
                        "skipping category for this cycle"
                    );
                    outcome.failed_categories.push(category);
                }
            }
        }
        outcome
    }
}
