// tests/common/mod.rs
// In-memory fakes for the three external capabilities and the state store.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use headline_signal_bot::analyze::backend::CompletionBackend;
use headline_signal_bot::analyze::AnalysisClient;
use headline_signal_bot::ingest::types::{Category, NewsSource, RawHeadline};
use headline_signal_bot::ingest::NewsAdapter;
use headline_signal_bot::notify::{MessageChannel, Notifier};
use headline_signal_bot::retry::RetryPolicy;
use headline_signal_bot::store::{FileStateStore, StateStore};
use headline_signal_bot::{Orchestrator, PipelineError, Result};
use tokio::sync::watch;

pub const ACME_TITLE: &str = "Acme Corp announces record profits";
pub const ACME_URL: &str = "https://example.com/acme";
pub const ACME_REPLY: &str = "Recommendation: Buy\nConfidence: High\nRisk: Low\nWhy: Strong earnings beat.\nTicker: ACME\nSector: Technology";

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transport,
    Fatal,
}

impl Failure {
    fn to_error(self) -> PipelineError {
        match self {
            Failure::Transport => PipelineError::transport("connection reset"),
            Failure::Fatal => PipelineError::FatalRequest("HTTP 400".into()),
        }
    }
}

pub fn headline(title: &str, url: &str) -> RawHeadline {
    RawHeadline {
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        published_at: Some("2025-09-06T09:00:00Z".to_string()),
        source_name: Some("Reuters".to_string()),
        raw: serde_json::json!({ "title": title, "url": url }),
    }
}

// ---------------- news source ----------------

#[derive(Default)]
pub struct FakeSource {
    headlines: Mutex<HashMap<Category, Vec<RawHeadline>>>,
    failing: Mutex<HashMap<Category, Failure>>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, category: Category, items: Vec<RawHeadline>) -> Self {
        self.headlines.lock().unwrap().insert(category, items);
        self
    }

    pub fn failing(self, category: Category, f: Failure) -> Self {
        self.failing.lock().unwrap().insert(category, f);
        self
    }
}

#[async_trait]
impl NewsSource for FakeSource {
    async fn fetch_category(&self, category: Category) -> Result<Vec<RawHeadline>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = self.failing.lock().unwrap().get(&category) {
            return Err(f.to_error());
        }
        Ok(self
            .headlines
            .lock()
            .unwrap()
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fake-news"
    }
}

// ---------------- completion backend ----------------

pub enum Reply {
    Text(String),
    Fail(Failure),
}

pub struct FakeBackend {
    script: Mutex<VecDeque<Reply>>,
    default: String,
    pub prompts: Mutex<Vec<String>>,
    stop_on_call: Mutex<Option<watch::Sender<bool>>>,
}

impl FakeBackend {
    pub fn always(text: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: text.to_string(),
            prompts: Mutex::new(Vec::new()),
            stop_on_call: Mutex::new(None),
        }
    }

    /// Replies in order, then falls back to `default`.
    pub fn scripted(script: Vec<Reply>, default: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default: default.to_string(),
            prompts: Mutex::new(Vec::new()),
            stop_on_call: Mutex::new(None),
        }
    }

    /// Request a stop from inside the first completion call.
    pub fn stopping(self, stop: watch::Sender<bool>) -> Self {
        *self.stop_on_call.lock().unwrap() = Some(stop);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(user.to_string());
        if let Some(stop) = self.stop_on_call.lock().unwrap().take() {
            let _ = stop.send(true);
        }
        match self.script.lock().unwrap().pop_front() {
            Some(Reply::Text(t)) => Ok(t),
            Some(Reply::Fail(f)) => Err(f.to_error()),
            None => Ok(self.default.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "fake-llm"
    }
}

// ---------------- message channel ----------------

#[derive(Default)]
pub struct FakeChannel {
    pub sent: Mutex<Vec<(String, String)>>,
    pub attempts: AtomicUsize,
    fail: Mutex<Option<Failure>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, f: Option<Failure>) {
        *self.fail.lock().unwrap() = f;
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl MessageChannel for FakeChannel {
    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = *self.fail.lock().unwrap() {
            return Err(f.to_error());
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake-chat"
    }
}

// ---------------- state store ----------------

/// File-backed store whose appends can be made to fail, like a dying disk
/// or a crash right before the write.
pub struct FlakyStore {
    inner: FileStateStore,
    pub broken: AtomicBool,
}

impl FlakyStore {
    pub async fn open(path: &Path) -> Self {
        Self {
            inner: FileStateStore::open(path).await.unwrap(),
            broken: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load(&self) -> Result<HashSet<String>> {
        self.inner.load().await
    }

    async fn append(&self, id: &str) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(PipelineError::Persistence(std::io::Error::other("disk full")));
        }
        self.inner.append(id).await
    }
}

// ---------------- wiring ----------------

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub backend: Arc<FakeBackend>,
    pub channel: Arc<FakeChannel>,
}

impl Harness {
    pub fn new(source: FakeSource, backend: FakeBackend) -> Self {
        Self {
            source: Arc::new(source),
            backend: Arc::new(backend),
            channel: Arc::new(FakeChannel::new()),
        }
    }

    pub async fn orchestrator(
        &self,
        categories: Vec<Category>,
        store: Arc<dyn StateStore>,
    ) -> Orchestrator {
        let news = NewsAdapter::new(self.source.clone(), fast_retry());
        let analysis = AnalysisClient::new(self.backend.clone(), fast_retry());
        let notifier = Notifier::new(self.channel.clone(), "chat-42", fast_retry());
        Orchestrator::start(
            categories,
            Duration::from_secs(3600),
            news,
            analysis,
            notifier,
            store,
        )
        .await
        .unwrap()
    }
}

pub fn stored_ids(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
