#[cfg(test)]
mod tests {
    use super::super::derivation::*;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use decision_core::{
        CheckedSnapshot, Direction, MetricsSnapshot, NoHistory, SignalId, Strategy,
        SuccessRates, VolatilityRegime,
    };

    // Bearish option-chain snapshot used across the pipeline tests
    fn bearish_snapshot() -> CheckedSnapshot {
        let mut snapshot = MetricsSnapshot::new("BANKNIFTY", 45500.0, Utc::now());
        snapshot.support = Some(44700.0);
        snapshot.resistance = Some(45900.0);
        snapshot.pcr = Some(1.45);
        snapshot.net_gamma = Some(-40000.0);
        snapshot.oi_change = Some(500.0);
        snapshot.validate().unwrap()
    }

    struct Boosted(f64);

    impl SuccessRates for Boosted {
        fn signal_multiplier(&self, _id: SignalId) -> f64 {
            self.0
        }

        fn strategy_multiplier(&self, _strategy: Strategy) -> f64 {
            1.0
        }
    }

    #[test]
    fn test_fixed_cardinality_and_order() {
        let engine = SignalEngine::new();
        let empty = MetricsSnapshot::new("X", 100.0, Utc::now()).validate().unwrap();
        let vector = engine.derive(&empty, &NoHistory);

        assert_eq!(vector.len(), 10);
        let ids: Vec<SignalId> = vector.iter().map(|s| s.id).collect();
        assert_eq!(ids, SignalId::ALL.to_vec());
        // Nothing to work with: every signal neutral
        assert!(vector.iter().all(|s| s.magnitude == 0.0));
        assert_eq!(vector.bias(), 0.0);
    }

    #[test]
    fn test_bearish_snapshot_signals() {
        let engine = SignalEngine::new();
        let vector = engine.derive(&bearish_snapshot(), &NoHistory);

        let pcr = vector.get(SignalId::PcrSentiment).unwrap();
        assert_eq!(pcr.direction, Direction::Bearish);
        assert_relative_eq!(pcr.magnitude, 0.7, epsilon = 1e-9);

        let gamma = vector.get(SignalId::GammaRegime).unwrap();
        assert_eq!(gamma.direction, Direction::Bearish);
        assert_relative_eq!(gamma.magnitude, 0.8f64.tanh(), epsilon = 1e-9);

        // No price change: OI velocity has magnitude but no direction
        let velocity = vector.get(SignalId::OiVelocity).unwrap();
        assert_eq!(velocity.direction, Direction::Neutral);
        assert_relative_eq!(velocity.magnitude, 0.5f64.tanh(), epsilon = 1e-9);

        assert_eq!(vector.magnitude(SignalId::VolatilityExpansion), 0.0);
        assert_relative_eq!(vector.bias(), -1.0);
        assert_eq!(vector.direction(0.25), Direction::Bearish);
    }

    #[test]
    fn test_bullish_pcr_and_flow() {
        let mut snapshot = MetricsSnapshot::new("X", 100.0, Utc::now());
        snapshot.pcr = Some(0.65);
        snapshot.call_volume = Some(3000.0);
        snapshot.put_volume = Some(1000.0);
        let vector = SignalEngine::new().derive(&snapshot.validate().unwrap(), &NoHistory);

        let pcr = vector.get(SignalId::PcrSentiment).unwrap();
        assert_eq!(pcr.direction, Direction::Bullish);
        assert_relative_eq!(pcr.magnitude, 0.5, epsilon = 1e-9);

        let flow = vector.get(SignalId::FlowImbalance).unwrap();
        assert_eq!(flow.direction, Direction::Bullish);
        assert_relative_eq!(flow.magnitude, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_volume_and_expected_move() {
        let mut snapshot = MetricsSnapshot::new("X", 100.0, Utc::now());
        snapshot.volume = Some(5_000.0);
        snapshot.avg_volume = Some(2_000.0);
        snapshot.price_change_pct = Some(-1.5);
        snapshot.expected_move_pct = Some(1.0);
        let vector = SignalEngine::new().derive(&snapshot.validate().unwrap(), &NoHistory);

        let volume = vector.get(SignalId::VolumeAnomaly).unwrap();
        assert_eq!(volume.direction, Direction::Bearish);
        assert_relative_eq!(volume.magnitude, 0.5, epsilon = 1e-9);

        let breach = vector.get(SignalId::ExpectedMoveBreach).unwrap();
        assert_eq!(breach.direction, Direction::Bearish);
        assert_relative_eq!(breach.magnitude, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_volatility_expansion_prefers_iv_hv() {
        let mut snapshot = MetricsSnapshot::new("X", 100.0, Utc::now());
        snapshot.volatility_regime = VolatilityRegime::Extreme;
        let checked = snapshot.clone().validate().unwrap();
        let tag_only = SignalEngine::new().derive(&checked, &NoHistory);
        assert_relative_eq!(tag_only.magnitude(SignalId::VolatilityExpansion), 0.9);

        snapshot.implied_volatility = Some(30.0);
        snapshot.historical_volatility = Some(20.0);
        let ratio = SignalEngine::new().derive(&snapshot.validate().unwrap(), &NoHistory);
        assert_relative_eq!(
            ratio.magnitude(SignalId::VolatilityExpansion),
            0.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_gamma_flip_proximity() {
        let mut snapshot = MetricsSnapshot::new("X", 100.0, Utc::now());
        snapshot.gamma_flip_level = Some(99.5);
        let vector = SignalEngine::new().derive(&snapshot.validate().unwrap(), &NoHistory);
        let flip = vector.get(SignalId::GammaFlipProximity).unwrap();
        assert_eq!(flip.direction, Direction::Bullish);
        assert_relative_eq!(flip.magnitude, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_history_scales_without_flipping() {
        let engine = SignalEngine::new();
        let snapshot = bearish_snapshot();
        let boosted = engine.derive(&snapshot, &Boosted(1.5));
        let damped = engine.derive(&snapshot, &Boosted(0.5));

        let pcr_up = boosted.get(SignalId::PcrSentiment).unwrap();
        assert_eq!(pcr_up.direction, Direction::Bearish);
        assert_eq!(pcr_up.magnitude, 1.0);

        let pcr_down = damped.get(SignalId::PcrSentiment).unwrap();
        assert_eq!(pcr_down.direction, Direction::Bearish);
        assert_relative_eq!(pcr_down.magnitude, 0.35, epsilon = 1e-9);
    }
}
