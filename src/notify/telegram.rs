// src/notify/telegram.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::MessageChannel;
use crate::error::{retry_after_from_headers, PipelineError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API `sendMessage` channel.
pub struct TelegramChannel {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
    parameters: Option<ReplyParameters>,
}

#[derive(Debug, Deserialize)]
struct ReplyParameters {
    retry_after: Option<u64>,
}

impl TelegramChannel {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let req = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        // reqwest errors can carry the URL, which holds the bot token
        let resp = self
            .http
            .post(self.send_url())
            .json(&req)
            .send()
            .await
            .map_err(|e| PipelineError::from(e.without_url()))?;

        let status = resp.status();
        let header_wait = retry_after_from_headers(resp.headers());
        let body = resp
            .text()
            .await
            .map_err(|e| PipelineError::from(e.without_url()))?;
        let reply: ApiReply = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            let retry_after = reply
                .parameters
                .as_ref()
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs)
                .or(header_wait);
            let detail = reply.description.unwrap_or(body);
            return Err(PipelineError::from_status(status, retry_after, &detail));
        }
        if !reply.ok {
            return Err(PipelineError::InvalidResponse(format!(
                "telegram replied ok=false: {}",
                reply.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
