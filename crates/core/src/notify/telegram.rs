use crate::config::Settings;
use crate::notify::Notifier;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

const API_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_SECS: u64 = 2;

/// Bot API sender using MarkdownV2. Callers escape free text before handing it over.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: Option<String>,
    chat_id: Option<String>,
    retries: u32,
    backoff_unit: Duration,
}

impl TelegramNotifier {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let notifier = Self::new(
            settings.telegram_bot_token.clone(),
            settings.telegram_chat_id.clone(),
        )?;
        if !notifier.is_configured() {
            tracing::warn!("TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID not set; notifier is inactive");
        }
        Ok(notifier)
    }

    pub fn new(bot_token: Option<String>, chat_id: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build telegram http client")?;

        let base_url = std::env::var("TELEGRAM_API_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| API_BASE_URL.to_string());

        Ok(Self {
            http,
            base_url,
            bot_token: bot_token.filter(|s| !s.trim().is_empty()),
            chat_id: chat_id.filter(|s| !s.trim().is_empty()),
            retries: DEFAULT_RETRIES,
            backoff_unit: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        })
    }

    pub fn with_retries(mut self, retries: u32, backoff_unit: Duration) -> Self {
        self.retries = retries.max(1);
        self.backoff_unit = backoff_unit;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    fn url(&self, token: &str) -> String {
        format!("{}/bot{token}/sendMessage", self.base_url.trim_end_matches('/'))
    }

    fn payload(chat_id: &str, text: &str) -> Value {
        json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true,
        })
    }

    async fn send_once(&self, url: &str, payload: &Value) -> Result<()> {
        let res = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .context("telegram request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("telegram HTTP {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn channel_name(&self) -> &'static str {
        "telegram"
    }

    async fn send_message(&self, text: &str) -> Result<bool> {
        let (Some(token), Some(chat_id)) = (self.bot_token.as_deref(), self.chat_id.as_deref())
        else {
            return Ok(false);
        };
        if text.trim().is_empty() {
            return Ok(false);
        }

        let url = self.url(token);
        let payload = Self::payload(chat_id, text);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.send_once(&url, &payload).await {
                Ok(()) => return Ok(true),
                Err(err) => {
                    if attempt >= self.retries {
                        tracing::error!(attempt, error = %err, "telegram delivery gave up");
                        return Ok(false);
                    }
                    let backoff = self.backoff_unit * attempt;
                    tracing::warn!(attempt, ?backoff, error = %err, "telegram send failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
