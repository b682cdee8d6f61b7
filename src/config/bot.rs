// src/config/bot.rs
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;

use crate::analyze::{
    backend, parser, DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT, HEADLINE_PLACEHOLDER,
};
use crate::error::{PipelineError, Result};
use crate::ingest::{providers::newsapi, types::Category};
use crate::notify::telegram;
use crate::retry::RetrySettings;

/// Secret fields holding this literal are read from the environment.
const FROM_ENV: &str = "ENV";

fn env_marker() -> String {
    FROM_ENV.to_string()
}
fn default_state_file() -> PathBuf {
    PathBuf::from("state/processed_articles.txt")
}
fn default_language() -> String {
    "en".to_string()
}
fn default_news_timeout() -> u64 {
    10
}
fn default_analysis_endpoint() -> String {
    "https://api.deepseek.com/chat/completions".to_string()
}
fn default_model() -> String {
    backend::DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    150
}
fn default_rationale_words() -> usize {
    parser::DEFAULT_MAX_RATIONALE_WORDS
}
fn default_analysis_timeout() -> u64 {
    15
}
fn default_telegram_base() -> String {
    telegram::DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsSection {
    #[serde(default = "default_news_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// "ENV" means: read NEWSAPI_KEY
    #[serde(default = "env_marker")]
    pub api_key: String,
    #[serde(default = "default_news_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub page_size: Option<u32>,
}

fn default_news_endpoint() -> String {
    newsapi::DEFAULT_ENDPOINT.to_string()
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            endpoint: default_news_endpoint(),
            language: default_language(),
            api_key: env_marker(),
            timeout_secs: default_news_timeout(),
            page_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSection {
    /// "ENV" means: read DEEPSEEK_API_URL
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read DEEPSEEK_API_KEY
    #[serde(default = "env_marker")]
    pub api_key: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_rationale_words")]
    pub max_rationale_words: usize,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            model: default_model(),
            api_key: env_marker(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_rationale_words: default_rationale_words(),
            timeout_secs: default_analysis_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    #[serde(default = "default_telegram_base")]
    pub api_base: String,
    /// "ENV" means: read BOT_TOKEN
    #[serde(default = "env_marker")]
    pub bot_token: String,
    /// "ENV" means: read USER_CHAT_ID
    #[serde(default = "env_marker")]
    pub chat_id: String,
    #[serde(default = "default_news_timeout")]
    pub timeout_secs: u64,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            api_base: default_telegram_base(),
            bot_token: env_marker(),
            chat_id: env_marker(),
            timeout_secs: default_news_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    pub system_prompt: String,
    /// Must contain `{headline}`.
    pub user_prompt: String,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RetrySection {
    #[serde(default)]
    pub news: RetrySettings,
    #[serde(default)]
    pub analysis: RetrySettings,
    #[serde(default)]
    pub notify: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Seconds between cycles; must be > 0.
    pub fetch_interval_seconds: i64,
    pub news_categories: Vec<Category>,
    #[serde(default = "default_state_file")]
    pub processed_articles_file: PathBuf,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub news: NewsSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub prompts: PromptsSection,
    #[serde(default)]
    pub retry: RetrySection,
}

impl BotConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&data)
    }

    /// Parse, resolve `ENV` secrets, and validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: BotConfig =
            toml::from_str(s).map_err(|e| PipelineError::Configuration(e.to_string()))?;

        cfg.news.api_key = resolve_secret("news.api_key", &cfg.news.api_key, "NEWSAPI_KEY")?;
        cfg.analysis.api_key =
            resolve_secret("analysis.api_key", &cfg.analysis.api_key, "DEEPSEEK_API_KEY")?;
        cfg.analysis.endpoint =
            resolve_secret("analysis.endpoint", &cfg.analysis.endpoint, "DEEPSEEK_API_URL")?;
        cfg.telegram.bot_token =
            resolve_secret("telegram.bot_token", &cfg.telegram.bot_token, "BOT_TOKEN")?;
        cfg.telegram.chat_id =
            resolve_secret("telegram.chat_id", &cfg.telegram.chat_id, "USER_CHAT_ID")?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&mut self) -> Result<()> {
        if self.fetch_interval_seconds <= 0 {
            return Err(PipelineError::Configuration(format!(
                "fetch_interval_seconds must be > 0 (got {})",
                self.fetch_interval_seconds
            )));
        }
        if self.news_categories.is_empty() {
            return Err(PipelineError::Configuration(
                "news_categories must not be empty".into(),
            ));
        }
        // keep first occurrence order, drop repeats
        let mut seen = std::collections::HashSet::new();
        self.news_categories.retain(|c| seen.insert(*c));

        if !self.prompts.user_prompt.contains(HEADLINE_PLACEHOLDER) {
            return Err(PipelineError::Configuration(format!(
                "prompts.user_prompt must contain {HEADLINE_PLACEHOLDER}"
            )));
        }
        if self.prompts.system_prompt.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "prompts.system_prompt must not be empty".into(),
            ));
        }
        for (name, r) in [
            ("retry.news", &self.retry.news),
            ("retry.analysis", &self.retry.analysis),
            ("retry.notify", &self.retry.notify),
        ] {
            if r.max_attempts == 0 {
                return Err(PipelineError::Configuration(format!(
                    "{name}.max_attempts must be >= 1"
                )));
            }
            if r.max_delay_ms < r.base_delay_ms {
                return Err(PipelineError::Configuration(format!(
                    "{name}.max_delay_ms must be >= base_delay_ms"
                )));
            }
        }
        if self.analysis.max_rationale_words == 0 {
            return Err(PipelineError::Configuration(
                "analysis.max_rationale_words must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_seconds.max(1) as u64)
    }
}

fn resolve_secret(field: &str, value: &str, var: &str) -> Result<String> {
    let v = value.trim();
    let resolved = if v.eq_ignore_ascii_case(FROM_ENV) {
        env::var(var).map_err(|_| {
            PipelineError::Configuration(format!("{field}: missing {var} env var"))
        })?
    } else {
        v.to_string()
    };
    if resolved.trim().is_empty() {
        return Err(PipelineError::Configuration(format!("{field} is empty")));
    }
    Ok(resolved.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
fetch_interval_seconds = 300
news_categories = ["business", "technology", "business"]

[news]
api_key = "news-key"

[analysis]
api_key = "llm-key"

[telegram]
bot_token = "123:abc"
chat_id = "42"
"#;

    #[test]
    fn loads_with_defaults() {
        let cfg = BotConfig::from_toml_str(BASE).unwrap();
        assert_eq!(cfg.fetch_interval(), Duration::from_secs(300));
        assert_eq!(
            cfg.news_categories,
            vec![Category::Business, Category::Technology]
        );
        assert_eq!(cfg.analysis.model, "deepseek-chat");
        assert_eq!(cfg.retry.notify, RetrySettings::default());
        assert!(cfg.prompts.user_prompt.contains("{headline}"));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        for bad in ["0", "-5"] {
            let s = BASE.replace("= 300", &format!("= {bad}"));
            let err = BotConfig::from_toml_str(&s).unwrap_err();
            assert_eq!(err.kind(), "configuration");
        }
    }

    #[test]
    fn empty_or_unknown_categories_are_rejected() {
        let s = BASE.replace(r#"["business", "technology", "business"]"#, "[]");
        assert!(BotConfig::from_toml_str(&s).is_err());
        let s = BASE.replace(r#"["business", "technology", "business"]"#, r#"["crypto"]"#);
        assert!(BotConfig::from_toml_str(&s).is_err());
    }

    #[test]
    fn prompt_without_placeholder_is_rejected() {
        let s = format!("{BASE}\n[prompts]\nsystem_prompt = \"x\"\nuser_prompt = \"no slot\"\n");
        let err = BotConfig::from_toml_str(&s).unwrap_err();
        assert!(err.to_string().contains("{headline}"));
    }

    #[test]
    fn retry_cap_below_base_is_rejected() {
        let s = format!("{BASE}\n[retry.analysis]\nmax_attempts = 2\nbase_delay_ms = 500\nmax_delay_ms = 100\n");
        assert!(BotConfig::from_toml_str(&s).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_marker_reads_environment() {
        env::set_var("NEWSAPI_KEY", "from-env");
        let s = BASE.replace(r#"api_key = "news-key""#, r#"api_key = "ENV""#);
        let cfg = BotConfig::from_toml_str(&s).unwrap();
        assert_eq!(cfg.news.api_key, "from-env");

        env::remove_var("NEWSAPI_KEY");
        let err = BotConfig::from_toml_str(&s).unwrap_err();
        assert!(err.to_string().contains("NEWSAPI_KEY"));
    }

    #[serial_test::serial]
    #[test]
    fn shipped_sample_config_loads() {
        let vars = [
            ("NEWSAPI_KEY", "n"),
            ("DEEPSEEK_API_KEY", "d"),
            ("DEEPSEEK_API_URL", "https://llm.test/v1/chat/completions"),
            ("BOT_TOKEN", "1:t"),
            ("USER_CHAT_ID", "7"),
        ];
        for (k, v) in vars {
            env::set_var(k, v);
        }
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/bot.toml");
        let cfg = BotConfig::load_from_file(path).unwrap();
        assert_eq!(cfg.analysis.endpoint, "https://llm.test/v1/chat/completions");
        assert_eq!(cfg.telegram.chat_id, "7");
        assert_eq!(cfg.retry.notify.base_delay_ms, 1000);
        for (k, _) in vars {
            env::remove_var(k);
        }
    }
}
