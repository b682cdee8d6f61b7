// src/notify/mod.rs
pub mod format;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;

use crate::error::Result;
use crate::ingest::types::Article;
use crate::recommendation::Recommendation;
use crate::retry::RetryPolicy;

/// Delivery capability: one formatted message to one chat.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Formats a recommendation and pushes it to the configured chat.
pub struct Notifier {
    channel: Arc<dyn MessageChannel>,
    chat_id: String,
    retry: RetryPolicy,
}

impl Notifier {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        chat_id: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            channel,
            chat_id: chat_id.into(),
            retry,
        }
    }

    pub async fn notify(&self, article: &Article, rec: &Recommendation) -> Result<()> {
        let text = format::format_message(article, rec);
        let channel: &dyn MessageChannel = self.channel.as_ref();
        let chat_id = self.chat_id.as_str();
        let text = text.as_str();
        self.retry
            .run("notify", move |_| channel.send(chat_id, text))
            .await?;
        counter!("notify_sent_total").increment(1);
        tracing::info!(
            article_id = %article.id,
            channel = channel.name(),
            ticker = %rec.ticker,
            action = %rec.action,
            "notification sent"
        );
        Ok(())
    }
}
