pub mod analysis;
pub mod domain;
pub mod live;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";
    pub const DEFAULT_REALTIME_CACHE_KEY: &str = "market:realtime:tickers";
    pub const DEFAULT_ALERT_LOG_DIR: &str = "logs";
    pub const DEFAULT_CANDIDATE_LIMIT: i64 = 100;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub redis_url: String,
        pub realtime_cache_key: String,
        pub telegram_bot_token: Option<String>,
        pub telegram_chat_id: Option<String>,
        pub sentry_dsn: Option<String>,
        pub alert_log_dir: PathBuf,
        pub candidate_limit: i64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let candidate_limit = match std::env::var("CANDIDATE_LIMIT") {
                Ok(s) => s
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("CANDIDATE_LIMIT must be an integer (got {s:?})"))?,
                Err(_) => DEFAULT_CANDIDATE_LIMIT,
            };
            anyhow::ensure!(
                candidate_limit >= 1,
                "CANDIDATE_LIMIT must be >= 1 (got {candidate_limit})"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
                realtime_cache_key: std::env::var("REALTIME_CACHE_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REALTIME_CACHE_KEY.to_string()),
                telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
                telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                alert_log_dir: std::env::var("ALERT_LOG_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_ALERT_LOG_DIR)),
                candidate_limit,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn telegram_configured(&self) -> bool {
            self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
        }
    }
}
