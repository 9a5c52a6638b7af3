//! The weighted rule table.
//!
//! Each entry is `(group, predicate, points, reason)`. Tiers inside one group have disjoint
//! predicates, so at most one tier per group fires. Points only ever add; table order is the
//! order reasons are reported in.

use crate::analysis::metrics::DerivedMetrics;
use crate::analysis::strategy::StrategyConfig;
use crate::domain::snapshot::Trend;
use serde::Serialize;

pub const STRONG_TECHNICAL: f64 = 80.0;
pub const MODERATE_TECHNICAL: f64 = 50.0;
pub const HIGH_VOLUME_RATIO: f64 = 2.0;
pub const ACTIVE_VOLUME_RATIO: f64 = 1.0;
pub const OVERSOLD_MOMENTUM: f64 = 30.0;

pub const BULLISH_PATTERNS: [&str; 4] = ["hammer", "engulfing", "morning", "piercing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleGroup {
    Technical,
    BuyerPower,
    Volume,
    Trend,
    Momentum,
    Pattern,
    Gap,
}

pub struct Rule {
    pub group: RuleGroup,
    pub points: f64,
    pub applies: fn(&DerivedMetrics, &StrategyConfig) -> bool,
    pub reason: fn(&DerivedMetrics) -> Option<String>,
}

pub static RULES: &[Rule] = &[
    Rule {
        group: RuleGroup::Technical,
        points: 3.0,
        applies: strong_technical,
        reason: strong_technical_reason,
    },
    Rule {
        group: RuleGroup::Technical,
        points: 1.5,
        applies: moderate_technical,
        reason: moderate_technical_reason,
    },
    Rule {
        group: RuleGroup::BuyerPower,
        points: 2.5,
        applies: strong_buyer_power,
        reason: strong_buyer_power_reason,
    },
    Rule {
        group: RuleGroup::BuyerPower,
        points: 1.0,
        applies: buyer_power,
        reason: buyer_power_reason,
    },
    Rule {
        group: RuleGroup::Volume,
        points: 2.0,
        applies: high_volume,
        reason: high_volume_reason,
    },
    // No reason line for this tier.
    Rule {
        group: RuleGroup::Volume,
        points: 1.0,
        applies: active_volume,
        reason: no_reason,
    },
    Rule {
        group: RuleGroup::Trend,
        points: 1.0,
        applies: bullish_trend,
        reason: bullish_trend_reason,
    },
    Rule {
        group: RuleGroup::Momentum,
        points: 1.0,
        applies: oversold,
        reason: oversold_reason,
    },
    Rule {
        group: RuleGroup::Pattern,
        points: 1.0,
        applies: bullish_pattern,
        reason: pattern_reason,
    },
    Rule {
        group: RuleGroup::Gap,
        points: 0.5,
        applies: gap_up,
        reason: gap_up_reason,
    },
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Unclamped sum of every fired rule.
    pub total: f64,
    pub reasons: Vec<String>,
    pub fired: Vec<RuleGroup>,
}

pub fn evaluate_rules(rules: &[Rule], m: &DerivedMetrics, cfg: &StrategyConfig) -> RuleOutcome {
    rules
        .iter()
        .filter(|rule| (rule.applies)(m, cfg))
        .fold(RuleOutcome::default(), |mut acc, rule| {
            acc.total += rule.points;
            acc.fired.push(rule.group);
            if let Some(reason) = (rule.reason)(m) {
                acc.reasons.push(reason);
            }
            acc
        })
}

fn strong_technical(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    m.composite >= STRONG_TECHNICAL
}

fn strong_technical_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("GoldenKey ⭐ ({})", m.composite.trunc() as i64))
}

fn moderate_technical(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    (MODERATE_TECHNICAL..STRONG_TECHNICAL).contains(&m.composite)
}

fn moderate_technical_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("GoldenKey ({})", m.composite.trunc() as i64))
}

fn strong_buyer_power(m: &DerivedMetrics, cfg: &StrategyConfig) -> bool {
    m.power_ratio >= cfg.min_power_ratio
}

fn strong_buyer_power_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("PowerRatio 🚀 ({:?})", m.power_ratio))
}

fn buyer_power(m: &DerivedMetrics, cfg: &StrategyConfig) -> bool {
    m.power_ratio >= cfg.confirm_power_ratio && m.power_ratio < cfg.min_power_ratio
}

fn buyer_power_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("PowerRatio ({:?})", m.power_ratio))
}

fn high_volume(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    m.volume_ratio >= HIGH_VOLUME_RATIO
}

fn high_volume_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("HighVolume 📊 (x{:.1})", m.volume_ratio))
}

fn active_volume(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    (ACTIVE_VOLUME_RATIO..HIGH_VOLUME_RATIO).contains(&m.volume_ratio)
}

fn bullish_trend(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    m.trend == Trend::Bullish
}

fn bullish_trend_reason(_: &DerivedMetrics) -> Option<String> {
    Some("Halftrend Bullish".to_string())
}

fn oversold(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    m.momentum < OVERSOLD_MOMENTUM
}

fn oversold_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("RSI Oversold ({})", m.momentum.trunc() as i64))
}

fn bullish_pattern(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    BULLISH_PATTERNS.iter().any(|p| m.pattern.contains(p))
}

fn pattern_reason(m: &DerivedMetrics) -> Option<String> {
    Some(format!("Pattern: {}", m.pattern))
}

fn gap_up(m: &DerivedMetrics, _: &StrategyConfig) -> bool {
    m.gap_up
}

fn gap_up_reason(_: &DerivedMetrics) -> Option<String> {
    Some("Gap Up 📈".to_string())
}

fn no_reason(_: &DerivedMetrics) -> Option<String> {
    None
}
