//! One analysis cycle: watchlist candidates joined with live ticks, scored, delivered, logged.

use crate::analysis::{ScoredResult, Scorer};
use crate::domain::snapshot::TechnicalSnapshot;
use crate::live::{LiveMap, LiveSnapshotSource};
use crate::notify::Notifier;
use crate::report::format_alert_batch;
use crate::storage::alert_log::save_alert_log;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(&self) -> anyhow::Result<Vec<TechnicalSnapshot>>;

    async fn symbol_name_by_id(&self, symbol_id: &str) -> anyhow::Result<Option<String>>;
}

/// Postgres-backed watchlist reader.
#[derive(Debug, Clone)]
pub struct PgCandidateStore {
    pool: sqlx::PgPool,
    limit: i64,
}

impl PgCandidateStore {
    pub fn new(pool: sqlx::PgPool, limit: i64) -> Self {
        Self { pool, limit }
    }
}

#[async_trait::async_trait]
impl CandidateSource for PgCandidateStore {
    async fn fetch_candidates(&self) -> anyhow::Result<Vec<TechnicalSnapshot>> {
        crate::storage::candidates::fetch_candidates(&self.pool, self.limit).await
    }

    async fn symbol_name_by_id(&self, symbol_id: &str) -> anyhow::Result<Option<String>> {
        crate::storage::candidates::symbol_name_by_id(&self.pool, symbol_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// One summary message per cycle.
    #[default]
    Batch,
    /// One full report per strong-buy symbol.
    PerAlert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub run_id: Uuid,
    pub status: CycleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub symbols_checked: usize,
    pub symbols_matched: usize,
    pub alerts_generated: usize,
    pub delivered: bool,
}

impl CycleOutcome {
    fn early(run_id: Uuid, status: CycleStatus, message: impl Into<String>) -> Self {
        Self {
            run_id,
            status,
            message: Some(message.into()),
            symbols_checked: 0,
            symbols_matched: 0,
            alerts_generated: 0,
            delivered: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Candidates that had a live snapshot under their name.
    pub matched: usize,
    pub alerts: Vec<ScoredResult>,
}

/// Scores every candidate that has live data and keeps the strong-buy verdicts, in candidate order.
pub fn select_strong_buys(
    scorer: &Scorer,
    candidates: &[TechnicalSnapshot],
    live: &LiveMap,
) -> Selection {
    let mut out = Selection::default();
    for technical in candidates {
        let Some(tick) = technical.name().and_then(|name| live.get(name)) else {
            continue;
        };
        out.matched += 1;

        let result = scorer.score(tick, technical);
        tracing::debug!(
            symbol = %result.symbol_name,
            score = result.score,
            power_ratio = result.power_ratio,
            volume_ratio = result.volume_ratio,
            strong_buy = result.is_strong_buy,
            "scored symbol"
        );
        if result.is_strong_buy {
            out.alerts.push(result);
        }
    }
    out
}

pub struct CycleContext<'a> {
    pub scorer: &'a Scorer,
    pub candidates: &'a dyn CandidateSource,
    pub live: &'a dyn LiveSnapshotSource,
    pub notifier: &'a dyn Notifier,
    pub alert_log_dir: &'a Path,
    pub delivery: Delivery,
}

/// Runs one cycle. Collaborator failures become an `Error`/`Skipped` outcome rather than an `Err`.
pub async fn run_analysis_cycle(ctx: &CycleContext<'_>, now: DateTime<FixedOffset>) -> CycleOutcome {
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, "analysis cycle started");

    let mut candidates = match ctx.candidates.fetch_candidates().await {
        Ok(c) if c.is_empty() => {
            tracing::warn!(%run_id, "no watchlist candidates");
            return CycleOutcome::early(run_id, CycleStatus::Skipped, "no symbols in watchlist");
        }
        Ok(c) => c,
        Err(err) => {
            tracing::error!(%run_id, error = %err, "candidate query failed");
            return CycleOutcome::early(run_id, CycleStatus::Skipped, format!("{err:#}"));
        }
    };
    resolve_missing_names(ctx.candidates, &mut candidates).await;

    let live = match ctx.live.fetch_live().await {
        Ok(Some(live)) if !live.is_empty() => live,
        Ok(_) => {
            return CycleOutcome::early(run_id, CycleStatus::Error, "no live data in cache");
        }
        Err(err) => {
            tracing::error!(%run_id, error = %err, "live cache read failed");
            return CycleOutcome::early(run_id, CycleStatus::Error, format!("{err:#}"));
        }
    };

    let selection = select_strong_buys(ctx.scorer, &candidates, &live);
    let delivered = deliver(ctx, &selection.alerts, &now).await;

    if let Err(err) = save_alert_log(ctx.alert_log_dir, &now, &selection.alerts).await {
        tracing::error!(%run_id, error = %err, "failed to save alert log");
    }

    tracing::info!(
        %run_id,
        symbols_checked = candidates.len(),
        symbols_matched = selection.matched,
        alerts = selection.alerts.len(),
        delivered,
        "analysis cycle finished"
    );

    CycleOutcome {
        run_id,
        status: CycleStatus::Success,
        message: None,
        symbols_checked: candidates.len(),
        symbols_matched: selection.matched,
        alerts_generated: selection.alerts.len(),
        delivered,
    }
}

async fn resolve_missing_names(source: &dyn CandidateSource, candidates: &mut [TechnicalSnapshot]) {
    for technical in candidates.iter_mut().filter(|t| t.name().is_none()) {
        let Some(id) = technical.symbol_id.clone() else {
            continue;
        };
        match source.symbol_name_by_id(&id).await {
            Ok(name) => technical.symbol_name = name,
            Err(err) => tracing::warn!(symbol_id = %id, error = %err, "symbol name lookup failed"),
        }
    }
}

async fn deliver(ctx: &CycleContext<'_>, alerts: &[ScoredResult], now: &DateTime<FixedOffset>) -> bool {
    if alerts.is_empty() {
        return false;
    }

    let channel = ctx.notifier.channel_name();
    match ctx.delivery {
        Delivery::Batch => {
            let Some(message) = format_alert_batch(alerts, now) else {
                return false;
            };
            match ctx.notifier.send_message(&message).await {
                Ok(sent) => {
                    tracing::info!(channel, alerts = alerts.len(), sent, "alert batch delivered");
                    sent
                }
                Err(err) => {
                    tracing::error!(channel, error = %err, "alert batch delivery failed");
                    false
                }
            }
        }
        Delivery::PerAlert => {
            let mut all_sent = true;
            for alert in alerts {
                match ctx.notifier.send_alert(alert).await {
                    Ok(sent) => all_sent &= sent,
                    Err(err) => {
                        tracing::error!(channel, symbol = %alert.symbol_name, error = %err, "alert delivery failed");
                        all_sent = false;
                    }
                }
            }
            all_sent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::LiveSnapshot;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeCandidates {
        rows: anyhow::Result<Vec<TechnicalSnapshot>>,
        names: HashMap<String, String>,
    }

    #[async_trait::async_trait]
    impl CandidateSource for FakeCandidates {
        async fn fetch_candidates(&self) -> anyhow::Result<Vec<TechnicalSnapshot>> {
            match &self.rows {
                Ok(rows) => Ok(rows.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }

        async fn symbol_name_by_id(&self, symbol_id: &str) -> anyhow::Result<Option<String>> {
            Ok(self.names.get(symbol_id).cloned())
        }
    }

    struct FakeLive(Option<LiveMap>);

    #[async_trait::async_trait]
    impl LiveSnapshotSource for FakeLive {
        async fn fetch_live(&self) -> anyhow::Result<Option<LiveMap>> {
            Ok(self.0.clone())
        }

        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        fn channel_name(&self) -> &'static str {
            "recording"
        }

        async fn send_message(&self, text: &str) -> anyhow::Result<bool> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(true)
        }
    }

    fn technical(id: &str, name: Option<&str>, composite: f64) -> TechnicalSnapshot {
        serde_json::from_value(json!({
            "symbol_id": id,
            "symbol_name": name,
            "golden_key_score": composite,
            "RSI": 25,
            "halftrend_signal": 1,
            "pattern_name": "hammer",
        }))
        .unwrap()
    }

    fn tick(label: &str, buy_vol: f64) -> (String, LiveSnapshot) {
        let snap = serde_json::from_value(json!({
            "symbol": label,
            "last_price": 1000,
            "open_price": 1010,
            "yesterday_price": 990,
            "volume": 600000,
            "base_volume": 1000000,
            "individual_buy_vol": buy_vol,
            "individual_buy_count": 10,
            "individual_sell_vol": 1000,
            "individual_sell_count": 10,
        }))
        .unwrap();
        (label.to_string(), snap)
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(12600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 10, 30, 0)
            .unwrap()
    }

    fn scratch_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("yada-pipeline-{}", Uuid::new_v4()))
    }

    #[test]
    fn selection_joins_by_name_and_filters() {
        let candidates = vec![
            technical("1", Some("FOLD"), 85.0),
            technical("2", Some("KHODRO"), 85.0),
            technical("3", Some("ABSENT"), 85.0),
        ];
        // KHODRO has weak buyers (power ratio 1.0) and must be rejected.
        let live: LiveMap = [tick("FOLD", 5000.0), tick("KHODRO", 1000.0)].into_iter().collect();

        let sel = select_strong_buys(&Scorer::default(), &candidates, &live);
        assert_eq!(sel.matched, 2);
        assert_eq!(sel.alerts.len(), 1);
        assert_eq!(sel.alerts[0].symbol_name, "FOLD");
        assert_eq!(sel.alerts[0].symbol_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn full_cycle_delivers_and_logs() {
        let dir = scratch_dir();
        let candidates = FakeCandidates {
            rows: Ok(vec![technical("1", None, 85.0), technical("2", Some("KHODRO"), 10.0)]),
            names: [("1".to_string(), "FOLD".to_string())].into_iter().collect(),
        };
        let live = FakeLive(Some(
            [tick("FOLD", 5000.0), tick("KHODRO", 1000.0)].into_iter().collect(),
        ));
        let notifier = RecordingNotifier::default();
        let scorer = Scorer::default();
        let ctx = CycleContext {
            scorer: &scorer,
            candidates: &candidates,
            live: &live,
            notifier: &notifier,
            alert_log_dir: &dir,
            delivery: Delivery::Batch,
        };

        let outcome = run_analysis_cycle(&ctx, now()).await;
        assert_eq!(outcome.status, CycleStatus::Success);
        assert_eq!(outcome.symbols_checked, 2);
        assert_eq!(outcome.symbols_matched, 2);
        assert_eq!(outcome.alerts_generated, 1);
        assert!(outcome.delivered);

        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("💎 *FOLD*"));

        let log = crate::storage::alert_log::load_latest_alert_log(&dir, now().date_naive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.alerts_count, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn per_alert_delivery_sends_one_report_each() {
        let dir = scratch_dir();
        let candidates = FakeCandidates {
            rows: Ok(vec![technical("1", Some("FOLD"), 85.0), technical("2", Some("SHASTA"), 90.0)]),
            names: HashMap::new(),
        };
        let live = FakeLive(Some(
            [tick("FOLD", 5000.0), tick("SHASTA", 5000.0)].into_iter().collect(),
        ));
        let notifier = RecordingNotifier::default();
        let scorer = Scorer::default();
        let ctx = CycleContext {
            scorer: &scorer,
            candidates: &candidates,
            live: &live,
            notifier: &notifier,
            alert_log_dir: &dir,
            delivery: Delivery::PerAlert,
        };

        let outcome = run_analysis_cycle(&ctx, now()).await;
        assert_eq!(outcome.alerts_generated, 2);
        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("✅ *FOLD*"));
        assert!(sent[1].starts_with("✅ *SHASTA*"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_watchlist_is_skipped() {
        let dir = scratch_dir();
        let candidates = FakeCandidates {
            rows: Ok(Vec::new()),
            names: HashMap::new(),
        };
        let live = FakeLive(None);
        let notifier = RecordingNotifier::default();
        let scorer = Scorer::default();
        let ctx = CycleContext {
            scorer: &scorer,
            candidates: &candidates,
            live: &live,
            notifier: &notifier,
            alert_log_dir: &dir,
            delivery: Delivery::Batch,
        };

        let outcome = run_analysis_cycle(&ctx, now()).await;
        assert_eq!(outcome.status, CycleStatus::Skipped);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn empty_live_cache_is_an_error() {
        let dir = scratch_dir();
        let candidates = FakeCandidates {
            rows: Ok(vec![technical("1", Some("FOLD"), 85.0)]),
            names: HashMap::new(),
        };
        let live = FakeLive(None);
        let notifier = RecordingNotifier::default();
        let scorer = Scorer::default();
        let ctx = CycleContext {
            scorer: &scorer,
            candidates: &candidates,
            live: &live,
            notifier: &notifier,
            alert_log_dir: &dir,
            delivery: Delivery::Batch,
        };

        let outcome = run_analysis_cycle(&ctx, now()).await;
        assert_eq!(outcome.status, CycleStatus::Error);
        assert_eq!(outcome.message.as_deref(), Some("no live data in cache"));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_alerts_still_writes_log_without_sending() {
        let dir = scratch_dir();
        let candidates = FakeCandidates {
            rows: Ok(vec![technical("1", Some("FOLD"), 10.0)]),
            names: HashMap::new(),
        };
        let live = FakeLive(Some([tick("FOLD", 1000.0)].into_iter().collect()));
        let notifier = RecordingNotifier::default();
        let scorer = Scorer::default();
        let ctx = CycleContext {
            scorer: &scorer,
            candidates: &candidates,
            live: &live,
            notifier: &notifier,
            alert_log_dir: &dir,
            delivery: Delivery::Batch,
        };

        let outcome = run_analysis_cycle(&ctx, now()).await;
        assert_eq!(outcome.status, CycleStatus::Success);
        assert_eq!(outcome.alerts_generated, 0);
        assert!(!outcome.delivered);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(dir.join("alerts_20261019_1030.json").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
