// src/config/mod.rs
pub mod bot;

pub use bot::BotConfig;

use std::path::PathBuf;

pub const ENV_CONFIG_PATH: &str = "HEADLINE_BOT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

/// Resolve the config path: explicit argument, then $HEADLINE_BOT_CONFIG, then the default.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
