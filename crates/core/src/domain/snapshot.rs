use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Neutral oscillator reading used when the technical row carries no RSI.
pub const NEUTRAL_MOMENTUM: f64 = 50.0;

/// Per-symbol tick snapshot as cached by the live ingestion loop.
///
/// Every numeric field is optional: upstream values are routinely `null`, absent or stringly typed.
/// Absent and `null` deserialize to `None`; a present value that is not a number reads as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub open_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub yesterday_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub high_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub low_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub base_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub best_demand_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub best_demand_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub best_supply_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub best_supply_vol: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub individual_buy_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub individual_buy_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub individual_sell_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub individual_sell_count: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub corporate_buy_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub corporate_buy_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub corporate_sell_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub corporate_sell_count: Option<f64>,

    /// Keys this struct does not model, kept so the audit copy is lossless.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LiveSnapshot {
    /// Label the live cache is keyed by (e.g. the exchange ticker).
    pub fn label(&self) -> Option<&str> {
        non_empty(self.symbol.as_deref())
    }

    /// Base volume, falling back to the legacy `bvol` key and then to `1.0` when neither is cached.
    pub fn base_volume_or_unit(&self) -> f64 {
        self.base_volume
            .or_else(|| self.extra.get("bvol").and_then(coerce_present))
            .unwrap_or(1.0)
    }
}

/// Trend direction encoded by the half-trend indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn from_signal(signal: Option<f64>) -> Self {
        match signal {
            None => Trend::Neutral,
            Some(v) if v.trunc() == 1.0 => Trend::Bullish,
            Some(_) => Trend::Bearish,
        }
    }
}

/// Technical row computed by the periodic batch jobs and read from the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub golden_key_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
    #[serde(
        rename = "RSI",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rsi: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub halftrend_signal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pattern_name: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TechnicalSnapshot {
    /// Composite score; some source tables name the column plain `score`.
    pub fn composite(&self) -> f64 {
        self.golden_key_score
            .or_else(|| self.extra.get("score").and_then(coerce_present))
            .unwrap_or(0.0)
    }

    pub fn momentum(&self) -> f64 {
        self.rsi
            .or_else(|| self.extra.get("rsi").and_then(coerce_present))
            .unwrap_or(NEUTRAL_MOMENTUM)
    }

    pub fn trend(&self) -> Trend {
        Trend::from_signal(self.halftrend_signal)
    }

    /// Lower-cased candlestick label, empty when none was detected.
    pub fn pattern(&self) -> String {
        self.pattern_name
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(self.symbol_name.as_deref())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Reads a JSON value as a finite number. Numeric strings count; everything else is `None`.
pub fn number_from_value(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}

/// `None` only for `null`; any other value is its number, or `0.0` when it does not parse.
pub fn coerce_present(v: &Value) -> Option<f64> {
    match v {
        Value::Null => None,
        other => Some(number_from_value(other).unwrap_or(0.0)),
    }
}

fn lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(coerce_present))
}

fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn live_snapshot_tolerates_nulls_strings_and_garbage() {
        let live: LiveSnapshot = serde_json::from_value(json!({
            "symbol": "FOLD",
            "last_price": "1000",
            "volume": null,
            "open_price": "n/a",
            "high_price": 1020,
            "state": "A",
        }))
        .unwrap();

        assert_eq!(live.label(), Some("FOLD"));
        assert_eq!(live.last_price, Some(1000.0));
        assert_eq!(live.volume, None);
        assert_eq!(live.open_price, Some(0.0));
        assert_eq!(live.high_price, Some(1020.0));
        assert_eq!(live.extra.get("state"), Some(&json!("A")));
    }

    #[test]
    fn base_volume_falls_back_to_bvol_then_unit() {
        let with_bvol: LiveSnapshot = serde_json::from_value(json!({"bvol": 250000})).unwrap();
        assert_eq!(with_bvol.base_volume_or_unit(), 250000.0);

        let empty: LiveSnapshot = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.base_volume_or_unit(), 1.0);

        let zero: LiveSnapshot = serde_json::from_value(json!({"base_volume": 0})).unwrap();
        assert_eq!(zero.base_volume_or_unit(), 0.0);

        let garbage: LiveSnapshot =
            serde_json::from_value(json!({"base_volume": "n/a", "bvol": 250000})).unwrap();
        assert_eq!(garbage.base_volume_or_unit(), 0.0);

        let garbage_bvol: LiveSnapshot = serde_json::from_value(json!({"bvol": "-"})).unwrap();
        assert_eq!(garbage_bvol.base_volume_or_unit(), 0.0);

        let null: LiveSnapshot =
            serde_json::from_value(json!({"base_volume": null, "bvol": 250000})).unwrap();
        assert_eq!(null.base_volume_or_unit(), 250000.0);
    }

    #[test]
    fn garbage_technical_fields_read_as_zero() {
        let tech: TechnicalSnapshot = serde_json::from_value(json!({
            "golden_key_score": "high",
            "score": 64,
            "RSI": "?",
        }))
        .unwrap();

        assert_eq!(tech.composite(), 0.0);
        assert_eq!(tech.momentum(), 0.0);
    }

    #[test]
    fn technical_snapshot_defaults() {
        let tech: TechnicalSnapshot = serde_json::from_value(json!({
            "symbol_id": 46348559193224090u64,
            "score": 64,
            "pattern_name": "  Bullish Engulfing ",
        }))
        .unwrap();

        assert_eq!(tech.symbol_id.as_deref(), Some("46348559193224090"));
        assert_eq!(tech.composite(), 64.0);
        assert_eq!(tech.momentum(), NEUTRAL_MOMENTUM);
        assert_eq!(tech.trend(), Trend::Neutral);
        assert_eq!(tech.pattern(), "bullish engulfing");
    }

    #[test]
    fn trend_is_tri_state() {
        assert_eq!(Trend::from_signal(Some(1.0)), Trend::Bullish);
        assert_eq!(Trend::from_signal(Some(0.0)), Trend::Bearish);
        assert_eq!(Trend::from_signal(Some(-1.0)), Trend::Bearish);
        assert_eq!(Trend::from_signal(None), Trend::Neutral);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(serde_json::from_value::<LiveSnapshot>(json!([1, 2, 3])).is_err());
        assert!(serde_json::from_value::<TechnicalSnapshot>(json!("FOLD")).is_err());
    }
}
