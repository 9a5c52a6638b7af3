//! Metric derivation: coercion, safe ratios and the intraday estimates the rule table consumes.
//!
//! None of these functions fail. Missing inputs degrade to neutral values so that a partially
//! populated snapshot still produces a verdict.

use crate::domain::snapshot::{LiveSnapshot, TechnicalSnapshot, Trend};
use serde::Serialize;

/// Power ratio reported when buyers trade against no sellers at all.
pub const MAX_POWER_RATIO: f64 = 100.0;

pub fn to_float_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// `a / b`, or `default` when `b` is zero or the quotient is not finite.
pub fn safe_div(a: f64, b: f64, default: f64) -> f64 {
    if b == 0.0 || !b.is_finite() {
        return default;
    }
    let q = a / b;
    if q.is_finite() {
        q
    } else {
        default
    }
}

/// Rounds half to even at `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Average retail buy size over average retail sell size, rounded to 2 decimals.
pub fn compute_power_ratio(buy_vol: f64, buy_count: f64, sell_vol: f64, sell_count: f64) -> f64 {
    let buy_avg = safe_div(buy_vol, buy_count, 0.0);
    let sell_avg = safe_div(sell_vol, sell_count, 1.0);

    if sell_avg == 0.0 {
        return if buy_avg > 0.0 { MAX_POWER_RATIO } else { 0.0 };
    }

    round_to(buy_avg / sell_avg, 2).max(0.0)
}

pub fn volume_ratio(traded_volume: f64, base_volume: f64) -> f64 {
    safe_div(traded_volume, base_volume, 0.0).max(0.0)
}

/// Opening above the previous close. Non-positive prices never count as a gap.
pub fn has_gap_up(open_price: f64, yesterday_close: f64) -> bool {
    open_price > 0.0 && yesterday_close > 0.0 && open_price > yesterday_close
}

/// Intraday high-low range.
///
/// This is a single-session proxy used only when no historical ATR is available; it is not a
/// multi-period Average True Range.
pub fn estimate_atr_from_live(high: f64, low: f64) -> f64 {
    if high > 0.0 && low > 0.0 {
        (high - low).max(0.0)
    } else {
        0.0
    }
}

/// Percent move since the previous close, 2 decimals; `0` without a usable previous close.
pub fn percent_change(last_price: f64, previous_close: f64) -> f64 {
    if previous_close <= 0.0 {
        return 0.0;
    }
    round_to((last_price - previous_close) / previous_close * 100.0, 2)
}

/// Every number the rule table and the result assembly need, derived once per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub last_price: f64,
    pub previous_close: f64,
    pub power_ratio: f64,
    pub volume_ratio: f64,
    pub gap_up: bool,
    pub atr: f64,
    pub composite: f64,
    pub momentum: f64,
    pub trend: Trend,
    pub pattern: String,
}

impl DerivedMetrics {
    pub fn derive(live: &LiveSnapshot, technical: &TechnicalSnapshot) -> Self {
        let last_price = to_float_or_zero(live.last_price);
        let open_price = to_float_or_zero(live.open_price);
        let previous_close = to_float_or_zero(live.yesterday_price);

        let power_ratio = compute_power_ratio(
            to_float_or_zero(live.individual_buy_vol),
            to_float_or_zero(live.individual_buy_count),
            to_float_or_zero(live.individual_sell_vol),
            to_float_or_zero(live.individual_sell_count),
        );

        let volume_ratio = volume_ratio(to_float_or_zero(live.volume), live.base_volume_or_unit());

        Self {
            last_price,
            previous_close,
            power_ratio,
            volume_ratio,
            gap_up: has_gap_up(open_price, previous_close),
            atr: estimate_atr_from_live(
                to_float_or_zero(live.high_price),
                to_float_or_zero(live.low_price),
            ),
            composite: technical.composite(),
            momentum: technical.momentum(),
            trend: technical.trend(),
            pattern: technical.pattern(),
        }
    }
}
