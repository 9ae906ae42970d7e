use std::collections::HashMap;
use std::time::Duration;

use market_regime_detector::RegimeThresholds;
use outcome_tracker::TrackerConfig;
use risk_manager::RiskParameters;
use serde::{Deserialize, Serialize};
use signal_engine::SignalConfig;
use strategy_planner::{LevelConfig, SelectorConfig};

/// Coordinator settings plus the configuration of every stage it drives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum spacing between approvals for one symbol (default 3s)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Per-symbol cooldown windows in seconds
    #[serde(default)]
    pub cooldown_overrides: HashMap<String, u64>,
    /// Budget for a single evaluation (default 250ms)
    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,
    /// Explanation lines per proposal, summary included (default 5)
    #[serde(default = "default_max_reasons")]
    pub max_reasons: usize,
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,

    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub regime: RegimeThresholds,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub levels: LevelConfig,
    #[serde(default)]
    pub risk: RiskParameters,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_cooldown_secs() -> u64 { 3 }
fn default_evaluation_timeout_ms() -> u64 { 250 }
fn default_max_reasons() -> usize { 5 }
fn default_max_concurrent_evaluations() -> usize { 8 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            cooldown_overrides: HashMap::new(),
            evaluation_timeout_ms: default_evaluation_timeout_ms(),
            max_reasons: default_max_reasons(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            signals: SignalConfig::default(),
            regime: RegimeThresholds::default(),
            selector: SelectorConfig::default(),
            levels: LevelConfig::default(),
            risk: RiskParameters::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Cooldown window for `symbol`, falling back to the global window
    pub fn cooldown_for(&self, symbol: &str) -> chrono::Duration {
        let secs = self
            .cooldown_overrides
            .get(symbol)
            .copied()
            .unwrap_or(self.cooldown_secs);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_overrides() {
        let mut config = PipelineConfig::default();
        config.cooldown_overrides.insert("NIFTY".to_string(), 10);

        assert_eq!(config.cooldown_for("NIFTY"), chrono::Duration::seconds(10));
        assert_eq!(config.cooldown_for("BANKNIFTY"), chrono::Duration::seconds(3));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"cooldown_secs": 7, "risk": {"min_liquidity": 50.0}}"#)
                .unwrap();

        assert_eq!(config.cooldown_secs, 7);
        assert_eq!(config.evaluation_timeout(), Duration::from_millis(250));
        assert_eq!(config.risk.min_liquidity, 50.0);
        assert_eq!(config.risk.min_confidence_threshold, 0.60);
        assert_eq!(config.max_reasons, 5);
    }
}
