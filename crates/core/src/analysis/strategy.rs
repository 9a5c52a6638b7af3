use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Strategy constants for one scoring profile.
///
/// Passed explicitly to the scorer; nothing in the scoring path reads ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Power ratio that earns the full buyer-power points.
    pub min_power_ratio: f64,
    /// Power ratio for the partial buyer-power tier and the strong-buy confirmation gate.
    pub confirm_power_ratio: f64,
    /// Traded volume over base volume required by the strong-buy gate.
    pub min_volume_to_base: f64,
    pub score_threshold: f64,
    pub target_percent: f64,
    pub stop_percent: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_power_ratio: 2.0,
            confirm_power_ratio: 1.5,
            min_volume_to_base: 0.5,
            score_threshold: 6.0,
            target_percent: 0.05,
            stop_percent: 0.03,
        }
    }
}

impl StrategyConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        override_from_env(&mut out.min_power_ratio, "STRATEGY_MIN_POWER_RATIO");
        override_from_env(&mut out.confirm_power_ratio, "STRATEGY_CONFIRM_POWER_RATIO");
        override_from_env(&mut out.min_volume_to_base, "STRATEGY_MIN_VOLUME_TO_BASE");
        override_from_env(&mut out.score_threshold, "STRATEGY_SCORE_THRESHOLD");
        override_from_env(&mut out.target_percent, "STRATEGY_TARGET_PERCENT");
        override_from_env(&mut out.stop_percent, "STRATEGY_STOP_PERCENT");

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let all = [
            self.min_power_ratio,
            self.confirm_power_ratio,
            self.min_volume_to_base,
            self.score_threshold,
            self.target_percent,
            self.stop_percent,
        ];
        ensure!(
            all.iter().all(|v| v.is_finite() && *v >= 0.0),
            "strategy constants must be finite and non-negative: {:?}",
            self
        );
        ensure!(
            self.target_percent > 0.0,
            "target_percent must be positive (got {})",
            self.target_percent
        );
        ensure!(
            self.stop_percent > 0.0 && self.stop_percent < 1.0,
            "stop_percent must be in (0, 1) (got {})",
            self.stop_percent
        );
        Ok(())
    }
}

fn override_from_env(slot: &mut f64, key: &str) {
    if let Ok(s) = std::env::var(key) {
        match s.trim().parse::<f64>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %s, "ignoring unparseable strategy override"),
        }
    }
}
