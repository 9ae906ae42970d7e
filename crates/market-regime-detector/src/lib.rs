use decision_core::scoring::clamp_unit;
use decision_core::{
    CheckedSnapshot, Direction, Regime, RegimeKind, SignalId, SignalVector, VolatilityRegime,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Fixed thresholds for the rule-based classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// Minimum |bias| for a trend
    #[serde(default = "default_trend_bias")]
    pub trend_min_bias: f64,
    /// Minimum mean magnitude of the signals aligned with the bias
    #[serde(default = "default_trend_aligned_mean")]
    pub trend_min_aligned_mean: f64,
    #[serde(default = "default_trend_aligned_count")]
    pub trend_min_aligned_count: usize,

    /// Distance to a level, as a fraction of the level, that counts as testing it
    #[serde(default = "default_breakout_band")]
    pub breakout_band: f64,
    /// Expected-move breach or volume anomaly needed to confirm a breakout
    #[serde(default = "default_breakout_trigger")]
    pub breakout_trigger: f64,

    /// Fraction of the support/resistance range treated as its edge
    #[serde(default = "default_edge_fraction")]
    pub mean_reversion_edge: f64,
    /// Bias below this has no direction
    #[serde(default = "default_direction_dead_zone")]
    pub direction_dead_zone: f64,

    #[serde(default = "default_range_max_bias")]
    pub range_max_bias: f64,
    #[serde(default = "default_range_min_strength")]
    pub range_min_strength: f64,

    #[serde(default = "default_high_vol_expansion")]
    pub high_vol_expansion: f64,
    #[serde(default = "default_low_vol_expansion")]
    pub low_vol_max_expansion: f64,
    #[serde(default = "default_low_vol_confidence")]
    pub low_vol_confidence: f64,

    /// Confidence of the range fallback when no rule is satisfied
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,
}

fn default_trend_bias() -> f64 { 0.5 }
fn default_trend_aligned_mean() -> f64 { 0.4 }
fn default_trend_aligned_count() -> usize { 2 }
fn default_breakout_band() -> f64 { 0.0025 }
fn default_breakout_trigger() -> f64 { 0.5 }
fn default_edge_fraction() -> f64 { 0.15 }
fn default_direction_dead_zone() -> f64 { 0.25 }
fn default_range_max_bias() -> f64 { 0.3 }
fn default_range_min_strength() -> f64 { 0.2 }
fn default_high_vol_expansion() -> f64 { 0.5 }
fn default_low_vol_expansion() -> f64 { 0.1 }
fn default_low_vol_confidence() -> f64 { 0.6 }
fn default_fallback_confidence() -> f64 { 0.25 }

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            trend_min_bias: default_trend_bias(),
            trend_min_aligned_mean: default_trend_aligned_mean(),
            trend_min_aligned_count: default_trend_aligned_count(),
            breakout_band: default_breakout_band(),
            breakout_trigger: default_breakout_trigger(),
            mean_reversion_edge: default_edge_fraction(),
            direction_dead_zone: default_direction_dead_zone(),
            range_max_bias: default_range_max_bias(),
            range_min_strength: default_range_min_strength(),
            high_vol_expansion: default_high_vol_expansion(),
            low_vol_max_expansion: default_low_vol_expansion(),
            low_vol_confidence: default_low_vol_confidence(),
            fallback_confidence: default_fallback_confidence(),
        }
    }
}

/// Regime detection result with confidence
#[derive(Debug, Clone, Serialize)]
pub struct RegimeDetectionResult {
    pub regime: Regime,
    pub metrics: RegimeMetrics,
    pub reasoning: String,
}

/// Aggregates the rules were evaluated against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeMetrics {
    /// Net signal bias (-1.0 to 1.0)
    pub bias: f64,

    /// Mean of the strongest signals
    pub strength: f64,

    /// Mean magnitude of the signals aligned with the bias
    pub aligned_mean: f64,

    pub aligned_count: usize,

    /// Volatility expansion magnitude
    pub expansion: f64,

    /// Position of spot inside the support/resistance range (0.0 = support, 1.0 = resistance)
    pub range_position: Option<f64>,
}

/// Rule-based market regime detector
pub struct MarketRegimeDetector {
    thresholds: RegimeThresholds,
}

impl MarketRegimeDetector {
    pub fn new() -> Self {
        Self::with_thresholds(RegimeThresholds::default())
    }

    pub fn with_thresholds(thresholds: RegimeThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify the snapshot into exactly one regime. Rules are checked in
    /// priority order and the first satisfied rule wins.
    pub fn detect_regime(
        &self,
        signals: &SignalVector,
        snapshot: &CheckedSnapshot,
    ) -> RegimeDetectionResult {
        let metrics = self.calculate_metrics(signals, snapshot);
        let (regime, reasoning) = self.classify_regime(signals, snapshot, &metrics);

        debug!(
            "{}: regime {} ({:.2}) - {}",
            snapshot.symbol,
            regime.kind.as_str(),
            regime.confidence,
            reasoning
        );

        RegimeDetectionResult {
            regime,
            metrics,
            reasoning,
        }
    }

    fn calculate_metrics(
        &self,
        signals: &SignalVector,
        snapshot: &CheckedSnapshot,
    ) -> RegimeMetrics {
        let bias = signals.bias();
        let direction = Direction::from_sign(bias);
        let range_position = match (snapshot.support, snapshot.range_width()) {
            (Some(support), Some(width)) if width > 0.0 => Some((snapshot.spot - support) / width),
            _ => None,
        };

        RegimeMetrics {
            bias,
            strength: signals.strength(),
            aligned_mean: signals.aligned_mean(direction),
            aligned_count: signals.aligned_count(direction),
            expansion: signals.magnitude(SignalId::VolatilityExpansion),
            range_position,
        }
    }

    fn classify_regime(
        &self,
        signals: &SignalVector,
        snapshot: &CheckedSnapshot,
        metrics: &RegimeMetrics,
    ) -> (Regime, String) {
        let rules: [(RegimeKind, Option<f64>); 6] = [
            (RegimeKind::Trend, self.trend(metrics)),
            (RegimeKind::Breakout, self.breakout(signals, snapshot)),
            (RegimeKind::MeanReversion, self.mean_reversion(snapshot, metrics)),
            (RegimeKind::Range, self.range(metrics)),
            (RegimeKind::HighVolatility, self.high_volatility(snapshot, metrics)),
            (RegimeKind::LowVolatility, self.low_volatility(snapshot, metrics)),
        ];

        let summary = format!(
            "bias: {:.2}, strength: {:.2}, aligned: {} @ {:.2}, expansion: {:.2}",
            metrics.bias,
            metrics.strength,
            metrics.aligned_count,
            metrics.aligned_mean,
            metrics.expansion
        );

        for (kind, satisfied) in rules {
            if let Some(confidence) = satisfied {
                let regime = Regime {
                    kind,
                    confidence: clamp_unit(confidence),
                };
                return (regime, format!("{} ({})", kind.as_str(), summary));
            }
        }

        (
            Regime {
                kind: RegimeKind::Range,
                confidence: self.thresholds.fallback_confidence,
            },
            format!("no rule satisfied, defaulting to range ({})", summary),
        )
    }

    fn trend(&self, m: &RegimeMetrics) -> Option<f64> {
        let t = &self.thresholds;
        let satisfied = m.bias.abs() >= t.trend_min_bias
            && m.aligned_mean >= t.trend_min_aligned_mean
            && m.aligned_count >= t.trend_min_aligned_count;
        satisfied.then(|| (m.bias.abs() + m.aligned_mean) / 2.0)
    }

    fn breakout(&self, signals: &SignalVector, snapshot: &CheckedSnapshot) -> Option<f64> {
        let t = &self.thresholds;
        let trigger = signals
            .magnitude(SignalId::ExpectedMoveBreach)
            .max(signals.magnitude(SignalId::VolumeAnomaly));
        if trigger < t.breakout_trigger {
            return None;
        }

        let spot = snapshot.spot;
        let beyond = snapshot.resistance.is_some_and(|r| spot > r)
            || snapshot.support.is_some_and(|s| spot < s);
        let testing = snapshot
            .resistance
            .is_some_and(|r| spot >= r * (1.0 - t.breakout_band))
            || snapshot
                .support
                .is_some_and(|s| spot <= s * (1.0 + t.breakout_band));

        if beyond {
            Some(trigger)
        } else if testing {
            Some(trigger * 0.8)
        } else {
            None
        }
    }

    fn mean_reversion(&self, snapshot: &CheckedSnapshot, m: &RegimeMetrics) -> Option<f64> {
        let t = &self.thresholds;
        let position = m.range_position?;
        if !(0.0..=1.0).contains(&position) || snapshot.net_gamma.unwrap_or(0.0) < 0.0 {
            return None;
        }
        if m.bias.abs() < t.direction_dead_zone || t.mean_reversion_edge <= 0.0 {
            return None;
        }

        // Bullish bias near support, bearish bias near resistance
        let edge_distance = if m.bias > 0.0 { position } else { 1.0 - position };
        if edge_distance > t.mean_reversion_edge {
            return None;
        }
        Some(0.5 * (1.0 - edge_distance / t.mean_reversion_edge) + 0.5 * m.bias.abs())
    }

    fn range(&self, m: &RegimeMetrics) -> Option<f64> {
        let t = &self.thresholds;
        let inside = m.range_position.is_some_and(|p| (0.0..=1.0).contains(&p));
        let satisfied =
            inside && m.bias.abs() < t.range_max_bias && m.strength >= t.range_min_strength;
        satisfied.then(|| 0.5 * (1.0 - m.bias.abs() / t.range_max_bias) + 0.5 * m.strength)
    }

    fn high_volatility(&self, snapshot: &CheckedSnapshot, m: &RegimeMetrics) -> Option<f64> {
        let tagged = matches!(
            snapshot.volatility_regime,
            VolatilityRegime::High | VolatilityRegime::Extreme
        );
        let satisfied = tagged || m.expansion >= self.thresholds.high_vol_expansion;
        satisfied.then(|| m.expansion.max(snapshot.volatility_regime.severity()))
    }

    fn low_volatility(&self, snapshot: &CheckedSnapshot, m: &RegimeMetrics) -> Option<f64> {
        let satisfied = snapshot.volatility_regime == VolatilityRegime::Low
            && m.expansion < self.thresholds.low_vol_max_expansion;
        satisfied.then_some(self.thresholds.low_vol_confidence)
    }
}

impl Default for MarketRegimeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use decision_core::{MetricsSnapshot, NoHistory, Signal};
    use signal_engine::SignalEngine;

    fn signal(id: SignalId, direction: Direction, magnitude: f64) -> Signal {
        Signal {
            id,
            direction,
            magnitude,
            detail: String::new(),
        }
    }

    fn ranged(spot: f64) -> CheckedSnapshot {
        let mut snapshot = MetricsSnapshot::new("NIFTY", spot, Utc::now());
        snapshot.support = Some(100.0);
        snapshot.resistance = Some(200.0);
        snapshot.validate().unwrap()
    }

    #[test]
    fn test_bearish_trend_detection() {
        let mut snapshot = MetricsSnapshot::new("BANKNIFTY", 45500.0, Utc::now());
        snapshot.support = Some(44700.0);
        snapshot.resistance = Some(45900.0);
        snapshot.pcr = Some(1.45);
        snapshot.net_gamma = Some(-40000.0);
        snapshot.oi_change = Some(500.0);
        let snapshot = snapshot.validate().unwrap();
        let signals = SignalEngine::new().derive(&snapshot, &NoHistory);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);

        assert_eq!(result.regime.kind, RegimeKind::Trend);
        assert!(result.metrics.bias < 0.0);
        assert!(result.regime.confidence > 0.8);
    }

    #[test]
    fn test_trend_outranks_high_volatility() {
        let snapshot = {
            let mut s = MetricsSnapshot::new("X", 150.0, Utc::now());
            s.volatility_regime = VolatilityRegime::Extreme;
            s.validate().unwrap()
        };
        let signals = SignalVector::new(vec![
            signal(SignalId::PcrSentiment, Direction::Bullish, 0.6),
            signal(SignalId::FlowImbalance, Direction::Bullish, 0.5),
            signal(SignalId::VolatilityExpansion, Direction::Neutral, 0.9),
        ]);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);
        assert_eq!(result.regime.kind, RegimeKind::Trend);
    }

    #[test]
    fn test_breakout_above_resistance() {
        let snapshot = ranged(201.0);
        let signals = SignalVector::new(vec![
            signal(SignalId::ExpectedMoveBreach, Direction::Bullish, 0.7),
            signal(SignalId::OiSkew, Direction::Bearish, 0.3),
        ]);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);
        assert_eq!(result.regime.kind, RegimeKind::Breakout);
        assert!((result.regime.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_mean_reversion_near_support() {
        let snapshot = ranged(105.0);
        let signals = SignalVector::new(vec![signal(
            SignalId::PcrSentiment,
            Direction::Bullish,
            0.3,
        )]);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);
        assert_eq!(result.regime.kind, RegimeKind::MeanReversion);
    }

    #[test]
    fn test_range_inside_levels() {
        let snapshot = ranged(150.0);
        let signals = SignalVector::new(vec![
            signal(SignalId::PcrSentiment, Direction::Bullish, 0.3),
            signal(SignalId::GammaRegime, Direction::Bearish, 0.3),
        ]);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);
        assert_eq!(result.regime.kind, RegimeKind::Range);
        assert!(result.regime.confidence > 0.25);
    }

    #[test]
    fn test_low_volatility() {
        let snapshot = {
            let mut s = MetricsSnapshot::new("X", 150.0, Utc::now());
            s.volatility_regime = VolatilityRegime::Low;
            s.validate().unwrap()
        };
        let signals = SignalVector::new(vec![]);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);
        assert_eq!(result.regime.kind, RegimeKind::LowVolatility);
        assert_eq!(result.regime.confidence, 0.6);
    }

    #[test]
    fn test_fallback_is_low_confidence_range() {
        let snapshot = MetricsSnapshot::new("X", 150.0, Utc::now()).validate().unwrap();
        let signals = SignalVector::new(vec![signal(
            SignalId::PcrSentiment,
            Direction::Bullish,
            0.1,
        )]);

        let result = MarketRegimeDetector::new().detect_regime(&signals, &snapshot);
        assert_eq!(result.regime.kind, RegimeKind::Range);
        assert_eq!(result.regime.confidence, 0.25);
    }

    #[test]
    fn test_classification_is_reproducible() {
        let snapshot = ranged(120.0);
        let signals = SignalVector::new(vec![
            signal(SignalId::PcrSentiment, Direction::Bullish, 0.45),
            signal(SignalId::DeltaSkew, Direction::Bearish, 0.2),
        ]);
        let detector = MarketRegimeDetector::new();
        let first = detector.detect_regime(&signals, &snapshot);
        let second = detector.detect_regime(&signals, &snapshot);
        assert_eq!(first.regime, second.regime);
        assert_eq!(first.reasoning, second.reasoning);
    }
}
