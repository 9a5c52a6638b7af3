use crate::domain::snapshot::LiveSnapshot;
use std::collections::HashMap;

pub mod redis_cache;

pub use redis_cache::RedisLiveCache;

/// Live snapshots keyed by the symbol label the ingestion loop caches them under.
pub type LiveMap = HashMap<String, LiveSnapshot>;

#[async_trait::async_trait]
pub trait LiveSnapshotSource: Send + Sync {
    /// `Ok(None)` means the cache is empty (ingestion not running or expired).
    async fn fetch_live(&self) -> anyhow::Result<Option<LiveMap>>;

    async fn ping(&self) -> anyhow::Result<()>;
}

/// Parses the cached JSON array. Entries that are not objects or carry no label are dropped.
pub fn parse_live_payload(raw: &str) -> anyhow::Result<LiveMap> {
    let items: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("live cache payload is not a JSON array: {e}"))?;

    let total = items.len();
    let mut out = HashMap::with_capacity(total);
    for item in items {
        let snapshot = match serde_json::from_value::<LiveSnapshot>(item) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed live snapshot");
                continue;
            }
        };
        let Some(label) = snapshot.label().map(str::to_string) else {
            continue;
        };
        out.insert(label, snapshot);
    }

    tracing::debug!(total, usable = out.len(), "parsed live cache payload");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_snapshots_by_label() {
        let raw = json!([
            {"symbol": "FOLD", "last_price": 1000},
            {"symbol": "KHODRO", "last_price": "2500"},
            {"symbol_name": "no label", "last_price": 10},
            {"symbol": "", "last_price": 10},
            "garbage",
        ])
        .to_string();

        let map = parse_live_payload(&raw).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["FOLD"].last_price, Some(1000.0));
        assert_eq!(map["KHODRO"].last_price, Some(2500.0));
    }

    #[test]
    fn rejects_non_array_payload() {
        assert!(parse_live_payload("{\"symbol\": \"FOLD\"}").is_err());
        assert!(parse_live_payload("not json").is_err());
    }
}
