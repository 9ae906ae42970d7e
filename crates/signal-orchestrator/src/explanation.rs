use std::cmp::Ordering;

use decision_core::{Regime, ReasonCode, Signal, SignalVector, StrategyChoice};

/// Turns a decision into a short, deterministic list of human-readable reasons
pub struct ExplanationComposer {
    max_reasons: usize,
}

impl ExplanationComposer {
    pub fn new(max_reasons: usize) -> Self {
        Self { max_reasons }
    }

    /// Strongest active signals first, then one summary line. The summary
    /// always fits: signal lines are capped at `max_reasons - 1`.
    pub fn compose(
        &self,
        signals: &SignalVector,
        regime: &Regime,
        choice: &StrategyChoice,
        verdict: ReasonCode,
    ) -> Vec<String> {
        if self.max_reasons == 0 {
            return Vec::new();
        }

        let mut active: Vec<&Signal> = signals.iter().filter(|s| s.is_active()).collect();
        active.sort_by(|a, b| {
            b.magnitude
                .partial_cmp(&a.magnitude)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });

        let mut lines: Vec<String> = active
            .into_iter()
            .take(self.max_reasons - 1)
            .map(describe)
            .collect();

        lines.push(format!(
            "regime {} ({:.0}%), strategy {} {}, verdict {}",
            regime.kind,
            regime.confidence * 100.0,
            choice.strategy,
            choice.bias.as_str(),
            verdict
        ));
        lines
    }
}

fn describe(signal: &Signal) -> String {
    if signal.detail.is_empty() {
        format!("{} {} {:.2}", signal.id, signal.direction.as_str(), signal.magnitude)
    } else {
        format!(
            "{} {} {:.2}: {}",
            signal.id,
            signal.direction.as_str(),
            signal.magnitude,
            signal.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_core::{Direction, RegimeKind, SignalId, Strategy};

    fn signal(id: SignalId, direction: Direction, magnitude: f64) -> Signal {
        Signal {
            id,
            direction,
            magnitude,
            detail: String::new(),
        }
    }

    fn vector() -> SignalVector {
        SignalVector::new(vec![
            signal(SignalId::PcrSentiment, Direction::Bearish, 0.7),
            signal(SignalId::OiSkew, Direction::Neutral, 0.0),
            signal(SignalId::GammaRegime, Direction::Bearish, 0.66),
            signal(SignalId::VolumeAnomaly, Direction::Neutral, 0.3),
            signal(SignalId::DeltaSkew, Direction::Bearish, 0.3),
            signal(SignalId::OiVelocity, Direction::Neutral, 0.46),
            signal(SignalId::FlowImbalance, Direction::Bullish, 0.1),
        ])
    }

    fn regime() -> Regime {
        Regime {
            kind: RegimeKind::Trend,
            confidence: 0.84,
        }
    }

    fn choice() -> StrategyChoice {
        StrategyChoice {
            strategy: Strategy::DirectionalLong,
            bias: Direction::Bearish,
        }
    }

    #[test]
    fn test_ranked_with_stable_tie_break() {
        let lines = ExplanationComposer::new(5).compose(
            &vector(),
            &regime(),
            &choice(),
            ReasonCode::Approved,
        );

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("pcr_sentiment"));
        assert!(lines[1].starts_with("gamma_regime"));
        assert!(lines[2].starts_with("oi_velocity"));
        // Equal magnitudes fall back to id order
        assert!(lines[3].starts_with("delta_skew"));
        assert_eq!(
            lines[4],
            "regime trend (84%), strategy directional_long bearish, verdict approved"
        );
    }

    #[test]
    fn test_inactive_signals_never_listed() {
        let lines = ExplanationComposer::new(20).compose(
            &vector(),
            &regime(),
            &choice(),
            ReasonCode::Approved,
        );
        assert_eq!(lines.len(), 7);
        assert!(lines.iter().all(|l| !l.starts_with("oi_skew")));
    }

    #[test]
    fn test_cap_of_one_keeps_summary() {
        let lines = ExplanationComposer::new(1).compose(
            &vector(),
            &regime(),
            &choice(),
            ReasonCode::ConfidenceBelowMinimum,
        );
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("verdict confidence_below_minimum"));
    }
}
