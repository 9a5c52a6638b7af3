use crate::analysis::ScoredResult;
use crate::report::generate_signal_report;

pub mod telegram;

pub use telegram::TelegramNotifier;

/// Delivery channel for alert messages. Implementations own their retry policy.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn channel_name(&self) -> &'static str;

    /// Sends pre-escaped text. `Ok(false)` means the channel is not configured or gave up.
    async fn send_message(&self, text: &str) -> anyhow::Result<bool>;

    async fn send_alert(&self, result: &ScoredResult) -> anyhow::Result<bool> {
        self.send_message(&generate_signal_report(result)).await
    }
}

/// Drops every message; used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    fn channel_name(&self) -> &'static str {
        "noop"
    }

    async fn send_message(&self, text: &str) -> anyhow::Result<bool> {
        tracing::info!(chars = text.chars().count(), "dry run: message not delivered");
        Ok(false)
    }
}
