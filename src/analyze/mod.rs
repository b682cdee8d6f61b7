// src/analyze/mod.rs
//! Analysis client: prompt rendering, completion call with retries, strict parse.

pub mod backend;
pub mod parser;

use std::sync::Arc;

use metrics::counter;

use crate::error::Result;
use crate::recommendation::Recommendation;
use crate::retry::RetryPolicy;
use backend::CompletionBackend;

pub const HEADLINE_PLACEHOLDER: &str = "{headline}";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a financial news analyst. For the headline you are given, answer with exactly these six lines and nothing else:\nRecommendation: Buy, Sell or Hold\nConfidence: Low, Medium or High\nRisk: Low, Medium or High\nWhy: one short sentence\nTicker: the most affected stock ticker\nSector: the sector of that company";

pub const DEFAULT_USER_PROMPT: &str = "Headline: {headline}";

/// Substitute the headline into a user prompt template.
pub fn render_user_prompt(template: &str, headline: &str) -> String {
    template.replace(HEADLINE_PLACEHOLDER, headline)
}

pub struct AnalysisClient {
    backend: Arc<dyn CompletionBackend>,
    system_prompt: String,
    user_template: String,
    max_rationale_words: usize,
    retry: RetryPolicy,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_template: DEFAULT_USER_PROMPT.to_string(),
            max_rationale_words: parser::DEFAULT_MAX_RATIONALE_WORDS,
            retry,
        }
    }

    pub fn with_prompts(
        mut self,
        system: impl Into<String>,
        user_template: impl Into<String>,
    ) -> Self {
        self.system_prompt = system.into();
        self.user_template = user_template.into();
        self
    }

    pub fn with_max_rationale_words(mut self, n: usize) -> Self {
        self.max_rationale_words = n.max(1);
        self
    }

    /// Ask the model about one headline. Transport failures are retried;
    /// a malformed answer is returned as `InvalidResponse` straight away.
    pub async fn analyze(&self, headline: &str) -> Result<Recommendation> {
        let user = render_user_prompt(&self.user_template, headline);
        let backend: &dyn CompletionBackend = self.backend.as_ref();
        let system = self.system_prompt.as_str();
        let user = user.as_str();

        let text = self
            .retry
            .run("analysis", move |_| backend.complete(system, user))
            .await?;

        match parser::parse_recommendation(&text, self.max_rationale_words) {
            Ok(rec) => {
                counter!("analysis_ok_total").increment(1);
                Ok(rec)
            }
            Err(e) => {
                counter!("analysis_invalid_total").increment(1);
                tracing::debug!(provider = backend.name(), response = %text, "unparseable model response");
                Err(e)
            }
        }
    }
}
