// src/bootstrap.rs
//! Wires the production adapters from a validated `BotConfig`.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::analyze::backend::ChatCompletionsBackend;
use crate::analyze::AnalysisClient;
use crate::config::BotConfig;
use crate::error::Result;
use crate::ingest::providers::newsapi::NewsApiProvider;
use crate::ingest::NewsAdapter;
use crate::notify::telegram::TelegramChannel;
use crate::notify::Notifier;
use crate::pipeline::Orchestrator;
use crate::store::FileStateStore;

pub async fn build_orchestrator(cfg: &BotConfig) -> Result<Orchestrator> {
    // Safe diagnostics only: lengths, never values.
    info!(
        news_key_len = cfg.news.api_key.len(),
        llm_key_len = cfg.analysis.api_key.len(),
        model = %cfg.analysis.model,
        chat_id_len = cfg.telegram.chat_id.len(),
        "building pipeline"
    );

    let source = NewsApiProvider::new(
        cfg.news.endpoint.clone(),
        cfg.news.api_key.clone(),
        cfg.news.language.clone(),
        Duration::from_secs(cfg.news.timeout_secs),
    )?
    .with_page_size(cfg.news.page_size);
    let news = NewsAdapter::new(Arc::new(source), cfg.retry.news.into());

    let backend = ChatCompletionsBackend::new(
        cfg.analysis.endpoint.clone(),
        cfg.analysis.api_key.clone(),
        cfg.analysis.model.clone(),
        Duration::from_secs(cfg.analysis.timeout_secs),
    )?
    .with_sampling(cfg.analysis.temperature, cfg.analysis.max_tokens);
    let analysis = AnalysisClient::new(Arc::new(backend), cfg.retry.analysis.into())
        .with_prompts(cfg.prompts.system_prompt.clone(), cfg.prompts.user_prompt.clone())
        .with_max_rationale_words(cfg.analysis.max_rationale_words);

    let channel = TelegramChannel::new(
        cfg.telegram.api_base.clone(),
        cfg.telegram.bot_token.clone(),
        Duration::from_secs(cfg.telegram.timeout_secs),
    )?;
    let notifier = Notifier::new(
        Arc::new(channel),
        cfg.telegram.chat_id.clone(),
        cfg.retry.notify.into(),
    );

    let store = FileStateStore::open(&cfg.processed_articles_file).await?;
    info!(path = %store.path().display(), "state store ready");

    Orchestrator::start(
        cfg.news_categories.clone(),
        cfg.fetch_interval(),
        news,
        analysis,
        notifier,
        Arc::new(store),
    )
    .await
}
