use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yada_core::analysis::{Scorer, StrategyConfig};
use yada_core::config::Settings;
use yada_core::live::{LiveSnapshotSource, RedisLiveCache};
use yada_core::notify::TelegramNotifier;
use yada_core::pipeline::{
    run_analysis_cycle, CycleContext, CycleOutcome, CycleStatus, Delivery, PgCandidateStore,
};
use yada_core::storage::alert_log::{load_latest_alert_log, AlertLog};
use yada_core::time::ir_market::tehran_now;

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

    let scorer = Scorer::new(StrategyConfig::from_env()?);
    tracing::info!(strategy = ?scorer.config(), "strategy loaded");

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let live = match RedisLiveCache::from_settings(&settings).await {
        Ok(live) => Some(live),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "redis connect failed; starting API in degraded mode");
            None
        }
    };

    let notifier = TelegramNotifier::from_settings(&settings)?;

    let state = AppState {
        inner: Arc::new(Inner {
            settings,
            scorer,
            pool,
            live,
            notifier,
        }),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/run", get(run).post(run))
        .route("/healthz", get(healthz))
        .route("/alerts/latest", get(get_latest_alerts))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    scorer: Scorer,
    pool: Option<PgPool>,
    live: Option<RedisLiveCache>,
    notifier: TelegramNotifier,
}

async fn index() -> &'static str {
    "yada signal engine is running; use /run to trigger an analysis cycle"
}

async fn run(State(state): State<AppState>) -> Result<Json<CycleOutcome>, StatusCode> {
    let inner = &state.inner;
    let (Some(pool), Some(live)) = (&inner.pool, &inner.live) else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let candidates = PgCandidateStore::new(pool.clone(), inner.settings.candidate_limit);
    let ctx = CycleContext {
        scorer: &inner.scorer,
        candidates: &candidates,
        live,
        notifier: &inner.notifier,
        alert_log_dir: &inner.settings.alert_log_dir,
        delivery: Delivery::Batch,
    };

    let now = tehran_now().map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let outcome = run_analysis_cycle(&ctx, now).await;
    if outcome.status == CycleStatus::Error {
        let msg = outcome.message.as_deref().unwrap_or("analysis cycle failed");
        sentry::capture_message(msg, sentry::Level::Error);
    }
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    database: &'static str,
    redis: &'static str,
    time: DateTime<Utc>,
}

async fn healthz(State(state): State<AppState>) -> Json<Health> {
    let inner = &state.inner;
    let redis = match &inner.live {
        Some(live) => match live.ping().await {
            Ok(()) => "UP",
            Err(e) => {
                tracing::warn!(error = %e, "redis health check failed");
                "DOWN"
            }
        },
        None => "DOWN",
    };

    Json(Health {
        status: "ok",
        database: if inner.pool.is_some() { "UP" } else { "DOWN" },
        redis,
        time: Utc::now(),
    })
}

async fn get_latest_alerts(State(state): State<AppState>) -> Result<Json<AlertLog>, StatusCode> {
    let today = tehran_now()
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .date_naive();
    let log = load_latest_alert_log(&state.inner.settings.alert_log_dir, today)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(log))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
