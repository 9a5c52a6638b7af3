use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yada_core::analysis::{Scorer, StrategyConfig};
use yada_core::config::Settings;
use yada_core::live::RedisLiveCache;
use yada_core::notify::{NoopNotifier, Notifier, TelegramNotifier};
use yada_core::pipeline::{run_analysis_cycle, CycleContext, CycleStatus, Delivery, PgCandidateStore};
use yada_core::time::ir_market::{is_market_time, tehran_now};

#[derive(Debug, Parser)]
#[command(name = "yada_worker")]
struct Args {
    /// Score and log, but do not deliver any message.
    #[arg(long)]
    dry_run: bool,

    /// Keep polling during market hours instead of running a single cycle.
    #[arg(long)]
    watch: bool,

    /// Seconds between cycles while the market is open (watch mode).
    #[arg(long, default_value_t = 220)]
    interval_secs: u64,

    /// Seconds between market-hours checks while the market is closed (watch mode).
    #[arg(long, default_value_t = 300)]
    closed_sleep_secs: u64,

    /// Send one full report per strong-buy symbol instead of a single batch message.
    #[arg(long)]
    per_alert: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.interval_secs >= 1, "--interval-secs must be >= 1");

    let scorer = Scorer::new(StrategyConfig::from_env()?);

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    let candidates = PgCandidateStore::new(pool, settings.candidate_limit);

    let live = RedisLiveCache::from_settings(&settings).await?;

    let notifier: Box<dyn Notifier> = if args.dry_run {
        Box::new(NoopNotifier)
    } else {
        Box::new(TelegramNotifier::from_settings(&settings)?)
    };

    let ctx = CycleContext {
        scorer: &scorer,
        candidates: &candidates,
        live: &live,
        notifier: notifier.as_ref(),
        alert_log_dir: &settings.alert_log_dir,
        delivery: if args.per_alert {
            Delivery::PerAlert
        } else {
            Delivery::Batch
        },
    };

    if !args.watch {
        let outcome = run_analysis_cycle(&ctx, tehran_now()?).await;
        tracing::info!(
            dry_run = args.dry_run,
            status = ?outcome.status,
            alerts = outcome.alerts_generated,
            "single cycle finished"
        );
        if outcome.status == CycleStatus::Error {
            let err = anyhow::anyhow!(outcome.message.unwrap_or_default());
            sentry_anyhow::capture_anyhow(&err);
            return Err(err.context("analysis cycle failed"));
        }
        return Ok(());
    }

    tracing::info!(
        interval_secs = args.interval_secs,
        closed_sleep_secs = args.closed_sleep_secs,
        "watch mode started"
    );

    loop {
        let sleep_for = if is_market_time(chrono::Utc::now())? {
            let outcome = run_analysis_cycle(&ctx, tehran_now()?).await;
            tracing::info!(
                status = ?outcome.status,
                alerts = outcome.alerts_generated,
                delivered = outcome.delivered,
                "cycle finished"
            );
            Duration::from_secs(args.interval_secs)
        } else {
            tracing::debug!("market closed; waiting");
            Duration::from_secs(args.closed_sleep_secs)
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("watch mode stopped");
                return Ok(());
            }
        }
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
