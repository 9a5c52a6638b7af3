use crate::analysis::metrics::{percent_change, round_to, DerivedMetrics};
use crate::analysis::rules::{evaluate_rules, RULES};
use crate::analysis::strategy::StrategyConfig;
use crate::domain::snapshot::{LiveSnapshot, TechnicalSnapshot};
use serde::{Deserialize, Serialize};

pub const MAX_SCORE: f64 = 10.0;
pub const UNKNOWN_SYMBOL: &str = "Unknown";

/// Verdict for one symbol. Built fresh on every call and handed straight to a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub symbol_id: Option<String>,
    pub symbol_name: String,
    pub score: f64,
    pub is_strong_buy: bool,
    pub reasons: Vec<String>,
    pub power_ratio: f64,
    pub volume_ratio: f64,
    pub rsi: f64,
    pub atr: f64,
    pub last_price: i64,
    pub percent_change: f64,
    pub entry: i64,
    pub target: i64,
    pub stop: i64,
    pub risk_reward: f64,
    pub raw_live: LiveSnapshot,
    pub technical: TechnicalSnapshot,
}

/// Target and stop for an entry price. Levels are whole currency units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLevels {
    pub entry: i64,
    pub target: i64,
    pub stop: i64,
    pub risk_reward: f64,
}

impl RiskLevels {
    pub fn for_entry(entry: f64, cfg: &StrategyConfig) -> Self {
        Self {
            entry: entry.trunc() as i64,
            target: (entry * (1.0 + cfg.target_percent)).round_ties_even() as i64,
            stop: (entry * (1.0 - cfg.stop_percent)).round_ties_even() as i64,
            risk_reward: round_to(cfg.target_percent / cfg.stop_percent, 2),
        }
    }
}

/// Stateless scoring engine bound to one strategy profile.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: StrategyConfig,
}

impl Scorer {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn score(&self, live: &LiveSnapshot, technical: &TechnicalSnapshot) -> ScoredResult {
        let cfg = &self.config;
        let metrics = DerivedMetrics::derive(live, technical);

        let outcome = evaluate_rules(RULES, &metrics, cfg);
        let score = outcome.total.clamp(0.0, MAX_SCORE);

        // Score alone is not enough: buyer power and traded volume must confirm independently.
        let is_strong_buy = score >= cfg.score_threshold
            && metrics.power_ratio >= cfg.confirm_power_ratio
            && metrics.volume_ratio >= cfg.min_volume_to_base;

        let levels = RiskLevels::for_entry(metrics.last_price, cfg);

        let symbol_name = live
            .label()
            .or_else(|| technical.name())
            .unwrap_or(UNKNOWN_SYMBOL)
            .to_string();

        ScoredResult {
            symbol_id: technical.symbol_id.clone(),
            symbol_name,
            score: round_to(score, 1),
            is_strong_buy,
            reasons: outcome.reasons,
            power_ratio: metrics.power_ratio,
            volume_ratio: round_to(metrics.volume_ratio, 2),
            rsi: metrics.momentum,
            atr: metrics.atr,
            last_price: metrics.last_price.trunc() as i64,
            percent_change: percent_change(metrics.last_price, metrics.previous_close),
            entry: levels.entry,
            target: levels.target,
            stop: levels.stop,
            risk_reward: levels.risk_reward,
            raw_live: live.clone(),
            technical: technical.clone(),
        }
    }
}
