// src/ingest/providers/newsapi.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use serde::Deserialize;

use crate::error::{retry_after_from_headers, PipelineError, Result};
use crate::ingest::types::{Category, NewsSource, RawHeadline};

pub const DEFAULT_ENDPOINT: &str = "https://newsapi.org/v2/top-headlines";

#[derive(Debug, Deserialize)]
struct TopHeadlines {
    articles: Option<Vec<serde_json::Value>>,
}

/// NewsAPI `top-headlines` provider, one request per category.
pub struct NewsApiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
    page_size: Option<u32>,
}

impl NewsApiProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("headline-signal-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            language: language.into(),
            page_size: None,
        })
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }
}

#[async_trait]
impl NewsSource for NewsApiProvider {
    async fn fetch_category(&self, category: Category) -> Result<Vec<RawHeadline>> {
        let t0 = std::time::Instant::now();
        let mut query: Vec<(&str, String)> = vec![
            ("category", category.to_string()),
            ("language", self.language.clone()),
            ("apiKey", self.api_key.clone()),
        ];
        if let Some(n) = self.page_size {
            query.push(("pageSize", n.to_string()));
        }

        let resp = self.client.get(&self.endpoint).query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_from_headers(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::from_status(status, retry_after, &body));
        }

        let body = resp.text().await?;
        let out = parse_top_headlines(&body)?;

        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(%category, count = out.len(), "fetched headlines");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}

/// Parse a `top-headlines` body. A body without an `articles` array is invalid.
pub fn parse_top_headlines(body: &str) -> Result<Vec<RawHeadline>> {
    let parsed: TopHeadlines = serde_json::from_str(body)
        .map_err(|e| PipelineError::InvalidResponse(format!("newsapi json: {e}")))?;
    let articles = parsed.articles.ok_or_else(|| {
        PipelineError::InvalidResponse("newsapi response has no `articles` array".into())
    })?;

    Ok(articles.into_iter().map(raw_from_value).collect())
}

fn raw_from_value(v: serde_json::Value) -> RawHeadline {
    let text = |key: &str| {
        v.get(key)
            .and_then(|x| x.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    RawHeadline {
        title: text("title"),
        url: text("url"),
        published_at: text("publishedAt"),
        source_name: v
            .get("source")
            .and_then(|s| s.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string),
        raw: v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_articles() {
        let body = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {"source": {"id": null, "name": "Reuters"}, "title": "Acme Corp announces record profits",
                 "url": "https://example.com/acme", "publishedAt": "2025-09-06T09:00:00Z"},
                {"source": {"name": "AP"}, "title": "  ", "url": null}
            ]
        }"#;
        let out = parse_top_headlines(body).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title.as_deref(), Some("Acme Corp announces record profits"));
        assert_eq!(out[0].source_name.as_deref(), Some("Reuters"));
        assert_eq!(out[0].published_at.as_deref(), Some("2025-09-06T09:00:00Z"));
        assert_eq!(out[1].title, None);
        assert_eq!(out[1].url, None);
    }

    #[test]
    fn missing_articles_is_invalid() {
        let err = parse_top_headlines(r#"{"status":"ok"}"#).unwrap_err();
        assert_eq!(err.kind(), "invalid_response");
        let err = parse_top_headlines("<html>").unwrap_err();
        assert_eq!(err.kind(), "invalid_response");
    }
}
