//! # Pipeline orchestrator
//! Drives `fetch → filter → analyze → notify → persist` on a fixed interval.
//!
//! An article id enters the processed set only after its notification was
//! delivered *and* the id was durably appended to the state store. Any other
//! outcome leaves the article to be reconsidered on the next cycle.
//!
//! A stop request is honored at the top of a cycle, between articles, and
//! during the interval sleep. It never interrupts an article that is already
//! being analyzed, notified, or persisted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::watch;

use crate::analyze::AnalysisClient;
use crate::ingest::types::{Article, Category};
use crate::ingest::NewsAdapter;
use crate::notify::Notifier;
use crate::store::StateStore;

/// Receiving side of the stop signal; `true` means stop.
pub type StopSignal = watch::Receiver<bool>;

/// Process-wide state owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub processed: HashSet<String>,
    pub categories: Vec<Category>,
    pub interval: Duration,
}

/// Terminal state of one article within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleOutcome {
    Notified,
    AnalysisFailed,
    NotifyFailed,
    PersistFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub notified: usize,
    pub analysis_failed: usize,
    pub notify_failed: usize,
    pub persist_failed: usize,
    pub failed_categories: usize,
    pub dropped: usize,
    /// Articles left untouched because a stop arrived mid-cycle.
    pub deferred: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: ArticleOutcome) {
        match outcome {
            ArticleOutcome::Notified => self.notified += 1,
            ArticleOutcome::AnalysisFailed => self.analysis_failed += 1,
            ArticleOutcome::NotifyFailed => self.notify_failed += 1,
            ArticleOutcome::PersistFailed => self.persist_failed += 1,
        }
    }
}

pub struct Orchestrator {
    ctx: PipelineContext,
    news: NewsAdapter,
    analysis: AnalysisClient,
    notifier: Notifier,
    store: Arc<dyn StateStore>,
}

fn stop_requested(stop: &StopSignal) -> bool {
    *stop.borrow()
}

/// Resolves once stop is requested; never resolves if the sender is gone.
async fn stopped(stop: &mut StopSignal) {
    if stop.wait_for(|v| *v).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl Orchestrator {
    /// Load the processed set from the store. A store that cannot be read is a
    /// startup failure; a missing one is simply empty.
    pub async fn start(
        categories: Vec<Category>,
        interval: Duration,
        news: NewsAdapter,
        analysis: AnalysisClient,
        notifier: Notifier,
        store: Arc<dyn StateStore>,
    ) -> crate::error::Result<Self> {
        let processed = store.load().await?;
        Ok(Self {
            ctx: PipelineContext {
                processed,
                categories,
                interval,
            },
            news,
            analysis,
            notifier,
            store,
        })
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.ctx.processed.contains(id)
    }

    /// analyze → notify → persist for a single article.
    pub async fn process_article(&mut self, article: &Article) -> ArticleOutcome {
        let rec = match self.analysis.analyze(&article.title).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    article_id = %article.id,
                    stage = "analysis",
                    kind = e.kind(),
                    title = %article.title,
                    error = %e,
                    "skipping article this cycle"
                );
                return ArticleOutcome::AnalysisFailed;
            }
        };

        if let Err(e) = self.notifier.notify(article, &rec).await {
            tracing::warn!(
                article_id = %article.id,
                stage = "notify",
                kind = e.kind(),
                error = %e,
                "notification not delivered, will retry next cycle"
            );
            return ArticleOutcome::NotifyFailed;
        }

        // nothing else may run between a delivered notification and this append
        match self.store.append(&article.id).await {
            Ok(()) => {
                self.ctx.processed.insert(article.id.clone());
                ArticleOutcome::Notified
            }
            Err(e) => {
                counter!("pipeline_persist_failures_total").increment(1);
                tracing::error!(
                    article_id = %article.id,
                    stage = "persist",
                    error = %e,
                    "notified but could not persist id; article will be reprocessed"
                );
                ArticleOutcome::PersistFailed
            }
        }
    }

    /// One full fetch/filter/process pass. Never fails; problems end up in the report.
    pub async fn run_cycle(&mut self, stop: &StopSignal) -> CycleReport {
        let mut report = CycleReport::default();

        let fetched = self.news.fetch(&self.ctx.categories).await;
        report.fetched = fetched.articles.len();
        report.failed_categories = fetched.failed_categories.len();
        report.dropped = fetched.dropped;

        // same story can show up under several categories
        let mut seen_this_cycle = HashSet::new();
        let fresh: Vec<Article> = fetched
            .articles
            .into_iter()
            .filter(|a| !self.ctx.processed.contains(&a.id))
            .filter(|a| seen_this_cycle.insert(a.id.clone()))
            .collect();
        report.new = fresh.len();

        for (i, article) in fresh.iter().enumerate() {
            if stop_requested(stop) {
                report.deferred = fresh.len() - i;
                tracing::info!(deferred = report.deferred, "stop requested, leaving remaining articles");
                break;
            }
            let outcome = self.process_article(article).await;
            report.record(outcome);
        }

        counter!("pipeline_cycles_total").increment(1);
        counter!("pipeline_notified_total").increment(report.notified as u64);
        gauge!("pipeline_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            fetched = report.fetched,
            new = report.new,
            notified = report.notified,
            analysis_failed = report.analysis_failed,
            notify_failed = report.notify_failed,
            persist_failed = report.persist_failed,
            failed_categories = report.failed_categories,
            "cycle finished"
        );
        report
    }

    /// Loop until `stop` turns `true`. Returns the number of completed cycles.
    pub async fn run(mut self, mut stop: StopSignal) -> u64 {
        tracing::info!(
            categories = ?self.ctx.categories,
            interval_secs = self.ctx.interval.as_secs(),
            already_processed = self.ctx.processed.len(),
            "pipeline started"
        );
        let mut cycles = 0u64;
        loop {
            if stop_requested(&stop) {
                break;
            }
            self.run_cycle(&stop).await;
            cycles += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.ctx.interval) => {}
                _ = stopped(&mut stop) => break,
            }
        }
        tracing::info!(cycles, "pipeline stopped");
        cycles
    }
}
