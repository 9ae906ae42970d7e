use decision_core::scoring::clamp_unit;
use decision_core::{
    Direction, Regime, RegimeKind, SignalVector, Strategy, StrategyChoice, SuccessRates,
};
use tracing::debug;

use crate::config::SelectorConfig;

/// Selected strategy with the confidence it was selected at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub choice: StrategyChoice,
    /// 0.0 to 1.0, already scaled by the strategy's historical multiplier
    pub confidence: f64,
}

pub struct StrategySelector {
    config: SelectorConfig,
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategySelector {
    pub fn new() -> Self {
        Self::with_config(SelectorConfig::default())
    }

    pub fn with_config(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Decision table over (regime, direction)
    pub fn choose(&self, regime: RegimeKind, bias: f64) -> StrategyChoice {
        let direction = if bias.abs() < self.config.min_bias {
            Direction::Neutral
        } else {
            Direction::from_sign(bias)
        };

        let strategy = match (regime, direction) {
            (_, Direction::Neutral) if regime.is_directional() => Strategy::Hold,
            (RegimeKind::Trend | RegimeKind::Breakout, _) => Strategy::DirectionalLong,
            (RegimeKind::MeanReversion, Direction::Bullish) => Strategy::BullCallSpread,
            (RegimeKind::MeanReversion, _) => Strategy::BearPutSpread,
            (RegimeKind::Range, _) => Strategy::IronCondor,
            (RegimeKind::HighVolatility, _) => Strategy::Straddle,
            (RegimeKind::LowVolatility, _) => Strategy::Strangle,
            (RegimeKind::Unknown, _) => Strategy::Hold,
        };

        let bias = if strategy.is_directional() {
            direction
        } else {
            Direction::Neutral
        };
        StrategyChoice { strategy, bias }
    }

    pub fn select(
        &self,
        regime: &Regime,
        signals: &SignalVector,
        rates: &dyn SuccessRates,
    ) -> Selection {
        let bias = signals.bias();
        let choice = self.choose(regime.kind, bias);

        let strength = signals.strength();
        let regime_weight = 0.5 + 0.5 * regime.confidence;
        let base = if choice.strategy.is_directional() {
            let conviction = self.conviction(strength);
            (0.5 * bias.abs() * conviction + 0.5 * strength) * regime_weight
        } else {
            strength * regime_weight
        };
        let confidence = clamp_unit(base * rates.strategy_multiplier(choice.strategy));

        debug!(
            regime = regime.kind.as_str(),
            strategy = choice.strategy.as_str(),
            bias = choice.bias.as_str(),
            confidence,
            "Selected strategy"
        );

        Selection { choice, confidence }
    }

    /// Share of the bias term a vector of this strength earns, 0.0 to 1.0
    fn conviction(&self, strength: f64) -> f64 {
        let full = self.config.full_conviction_strength;
        if full <= 0.0 {
            return 1.0;
        }
        clamp_unit(strength / full)
    }
}
