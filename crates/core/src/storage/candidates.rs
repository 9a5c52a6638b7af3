use crate::domain::snapshot::TechnicalSnapshot;
use anyhow::Context;
use std::collections::{BTreeMap, HashSet};

// Watchlist tables feed the candidate set; the latest technical and candlestick rows per symbol are
// joined on top. Tables without a composite score count as full conviction (100). Each symbol keeps
// only its highest-composite row before the limit applies, so the limit counts distinct symbols.
const CANDIDATES_SQL: &str = "\
WITH latest_tech AS ( \
    SELECT symbol_id, rsi, halftrend_signal, \
           ROW_NUMBER() OVER (PARTITION BY symbol_id ORDER BY jdate DESC) AS rn \
    FROM technical_indicator_data \
), \
latest_candle AS ( \
    SELECT symbol_id, pattern_name, \
           ROW_NUMBER() OVER (PARTITION BY symbol_id ORDER BY jdate DESC) AS rn \
    FROM candlestick_pattern_detection \
), \
candidates AS ( \
    SELECT symbol_id, score::float8 AS golden_key_score, 'GoldenKey' AS source_table \
    FROM golden_key_results WHERE score > 26 \
    UNION \
    SELECT symbol_id, probability_percent::float8, 'BuyQueue' \
    FROM potential_buy_queue_results WHERE probability_percent > 50 \
    UNION \
    SELECT symbol_id, 100::float8, 'Watchlist' FROM weekly_watchlist_results \
    UNION \
    SELECT symbol_id, 100::float8, 'DynamicSupport' FROM dynamic_support_opportunities \
), \
distinct_candidates AS ( \
    SELECT DISTINCT ON (symbol_id) symbol_id, golden_key_score, source_table \
    FROM candidates \
    ORDER BY symbol_id, golden_key_score DESC NULLS LAST \
) \
SELECT c.symbol_id::text, csd.symbol_name, c.golden_key_score, c.source_table::text, \
       t.rsi::float8, t.halftrend_signal::float8, k.pattern_name \
FROM distinct_candidates c \
INNER JOIN comprehensive_symbol_data csd ON csd.symbol_id = c.symbol_id \
LEFT JOIN latest_tech t ON t.symbol_id = c.symbol_id AND t.rn = 1 \
LEFT JOIN latest_candle k ON k.symbol_id = c.symbol_id AND k.rn = 1 \
ORDER BY c.golden_key_score DESC NULLS LAST, c.symbol_id ASC \
LIMIT $1";

type CandidateRow = (
    String,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<String>,
);

pub async fn fetch_candidates(
    pool: &sqlx::PgPool,
    limit: i64,
) -> anyhow::Result<Vec<TechnicalSnapshot>> {
    let t0 = std::time::Instant::now();
    let rows = sqlx::query_as::<_, CandidateRow>(CANDIDATES_SQL)
        .persistent(false)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("select watchlist candidates failed")?;

    let out = dedupe_by_symbol(rows.into_iter().map(row_to_snapshot).collect());
    tracing::debug!(
        limit,
        candidates = out.len(),
        elapsed_ms = t0.elapsed().as_millis(),
        "fetched watchlist candidates"
    );
    Ok(out)
}

pub async fn symbol_name_by_id(
    pool: &sqlx::PgPool,
    symbol_id: &str,
) -> anyhow::Result<Option<String>> {
    let name: Option<Option<String>> = sqlx::query_scalar(
        "SELECT symbol_name FROM comprehensive_symbol_data WHERE symbol_id::text = $1 LIMIT 1",
    )
    .persistent(false)
    .bind(symbol_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("select symbol_name failed (symbol_id={symbol_id})"))?;

    Ok(name.flatten().filter(|s| !s.trim().is_empty()))
}

fn row_to_snapshot(row: CandidateRow) -> TechnicalSnapshot {
    let (symbol_id, symbol_name, golden_key_score, source_table, rsi, halftrend_signal, pattern_name) =
        row;
    TechnicalSnapshot {
        symbol_id: Some(symbol_id),
        symbol_name,
        golden_key_score,
        source_table,
        rsi,
        halftrend_signal,
        pattern_name,
        extra: BTreeMap::new(),
    }
}

/// A symbol can sit in several watchlists; keep its first (highest-composite) row.
fn dedupe_by_symbol(rows: Vec<TechnicalSnapshot>) -> Vec<TechnicalSnapshot> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.symbol_id.clone()))
        .collect()
}
