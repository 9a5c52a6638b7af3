use crate::config::Settings;
use crate::live::{parse_live_payload, LiveMap, LiveSnapshotSource};
use anyhow::Context;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Reader for the tick snapshots the ingestion loop caches as one JSON array under a single key.
#[derive(Clone)]
pub struct RedisLiveCache {
    conn: ConnectionManager,
    key: String,
}

impl RedisLiveCache {
    pub async fn connect(url: &str, key: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("invalid REDIS_URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("connect REDIS_URL failed")?;
        Ok(Self {
            conn,
            key: key.into(),
        })
    }

    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::connect(&settings.redis_url, settings.realtime_cache_key.clone()).await
    }
}

#[async_trait::async_trait]
impl LiveSnapshotSource for RedisLiveCache {
    async fn fetch_live(&self) -> anyhow::Result<Option<LiveMap>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(&self.key)
            .await
            .with_context(|| format!("redis GET {} failed", self.key))?;

        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            tracing::warn!(key = %self.key, "live cache is empty; is the ingestion loop running?");
            return Ok(None);
        };

        parse_live_payload(&raw).map(Some)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis PING failed")?;
        anyhow::ensure!(pong == "PONG", "unexpected PING reply: {pong}");
        Ok(())
    }
}
