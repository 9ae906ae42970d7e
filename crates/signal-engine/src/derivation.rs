use decision_core::scoring::{clamp_unit, ramp, squash};
use decision_core::{CheckedSnapshot, Direction, Signal, SignalId, SignalVector, SuccessRates};
use tracing::debug;

use crate::config::SignalConfig;

/// Derives the fixed signal catalog from a validated snapshot.
/// Missing inputs degrade a signal to neutral; derivation itself never fails.
pub struct SignalEngine {
    config: SignalConfig,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEngine {
    pub fn new() -> Self {
        Self::with_config(SignalConfig::default())
    }

    pub fn with_config(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn derive(&self, snapshot: &CheckedSnapshot, rates: &dyn SuccessRates) -> SignalVector {
        let raw = [
            self.pcr_sentiment(snapshot),
            self.oi_skew(snapshot),
            self.gamma_regime(snapshot),
            self.volume_anomaly(snapshot),
            self.expected_move_breach(snapshot),
            self.delta_skew(snapshot),
            self.volatility_expansion(snapshot),
            self.oi_velocity(snapshot),
            self.gamma_flip_proximity(snapshot),
            self.flow_imbalance(snapshot),
        ];

        let signals: Vec<Signal> = raw
            .into_iter()
            .map(|mut signal| {
                // Feedback scales magnitude only; direction is never touched
                let multiplier = rates.signal_multiplier(signal.id);
                signal.magnitude = clamp_unit(signal.magnitude * multiplier);
                signal
            })
            .collect();

        let vector = SignalVector::new(signals);
        debug!(
            symbol = %snapshot.symbol,
            bias = vector.bias(),
            strength = vector.strength(),
            "Derived signals"
        );
        vector
    }

    fn pcr_sentiment(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::PcrSentiment;
        let Some(pcr) = snapshot.pcr else {
            return Signal::neutral(id, "pcr unavailable");
        };
        let c = &self.config;

        if pcr > c.pcr_bearish_threshold {
            directional(
                id,
                Direction::Bearish,
                ramp(pcr, c.pcr_bearish_threshold, c.pcr_span),
                format!("PCR {:.2} above {:.2}", pcr, c.pcr_bearish_threshold),
            )
        } else if pcr < c.pcr_bullish_threshold {
            directional(
                id,
                Direction::Bullish,
                ramp(c.pcr_bullish_threshold - pcr, 0.0, c.pcr_span),
                format!("PCR {:.2} below {:.2}", pcr, c.pcr_bullish_threshold),
            )
        } else {
            Signal::neutral(id, format!("PCR {:.2} inside neutral band", pcr))
        }
    }

    fn oi_skew(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::OiSkew;
        if snapshot.call_oi_change.is_none() && snapshot.put_oi_change.is_none() {
            return Signal::neutral(id, "call/put OI change unavailable");
        }
        let call = snapshot.call_oi_change.unwrap_or(0.0);
        let put = snapshot.put_oi_change.unwrap_or(0.0);
        let gross = call.abs() + put.abs();
        if gross <= f64::EPSILON || put == call {
            return Signal::neutral(id, "balanced OI build-up");
        }

        let direction = if put > call {
            Direction::Bearish
        } else {
            Direction::Bullish
        };
        directional(
            id,
            direction,
            (put - call).abs() / gross,
            format!("put OI change {:.0} vs call OI change {:.0}", put, call),
        )
    }

    fn gamma_regime(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::GammaRegime;
        match snapshot.net_gamma {
            Some(gamma) if gamma != 0.0 => directional(
                id,
                Direction::from_sign(gamma),
                squash(gamma, self.config.gamma_scale),
                format!(
                    "{} net gamma {:.0}",
                    if gamma < 0.0 { "short" } else { "long" },
                    gamma
                ),
            ),
            Some(_) => Signal::neutral(id, "flat net gamma"),
            None => Signal::neutral(id, "net gamma unavailable"),
        }
    }

    fn volume_anomaly(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::VolumeAnomaly;
        let (Some(volume), Some(avg)) = (snapshot.volume, snapshot.avg_volume) else {
            return Signal::neutral(id, "volume baseline unavailable");
        };
        let c = &self.config;
        let ratio = volume / avg;
        if ratio < c.volume_trigger {
            return Signal::neutral(id, format!("volume {:.2}x average", ratio));
        }

        let direction = snapshot
            .price_change_pct
            .map(Direction::from_sign)
            .unwrap_or(Direction::Neutral);
        directional(
            id,
            direction,
            ramp(ratio, c.volume_trigger, c.volume_span),
            format!("volume {:.2}x average", ratio),
        )
    }

    fn expected_move_breach(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::ExpectedMoveBreach;
        let (Some(change), Some(expected)) = (snapshot.price_change_pct, snapshot.expected_move_pct)
        else {
            return Signal::neutral(id, "expected move unavailable");
        };
        let ratio = change.abs() / expected;
        if ratio <= 1.0 {
            return Signal::neutral(id, format!("move {:.2}x expected", ratio));
        }
        directional(
            id,
            Direction::from_sign(change),
            ramp(ratio, 1.0, self.config.expected_move_span),
            format!("move {:.2}% breached expected {:.2}%", change, expected),
        )
    }

    fn delta_skew(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::DeltaSkew;
        if snapshot.call_delta_exposure.is_none() && snapshot.put_delta_exposure.is_none() {
            return Signal::neutral(id, "delta exposure unavailable");
        }
        let call = snapshot.call_delta_exposure.unwrap_or(0.0);
        let put = snapshot.put_delta_exposure.unwrap_or(0.0);
        let gross = call.abs() + put.abs();
        let net = call + put;
        if gross <= f64::EPSILON || net == 0.0 {
            return Signal::neutral(id, "delta exposure balanced");
        }
        directional(
            id,
            Direction::from_sign(net),
            net.abs() / gross,
            format!("net delta exposure {:.0}", net),
        )
    }

    fn volatility_expansion(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::VolatilityExpansion;
        let iv_hv = (snapshot.implied_volatility, snapshot.historical_volatility);
        let (magnitude, detail) = match iv_hv {
            (Some(iv), Some(hv)) => {
                let ratio = iv / hv;
                (
                    ramp(ratio, 1.0, self.config.vol_expansion_span),
                    format!("IV/HV {:.2}", ratio),
                )
            }
            _ => (
                snapshot.volatility_regime.severity(),
                format!("volatility regime {}", snapshot.volatility_regime.as_str()),
            ),
        };
        Signal {
            id,
            direction: Direction::Neutral,
            magnitude,
            detail,
        }
    }

    fn oi_velocity(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::OiVelocity;
        let Some(oi_change) = snapshot.oi_change else {
            return Signal::neutral(id, "OI change unavailable");
        };
        let magnitude = squash(oi_change, self.config.oi_scale);
        // OI building with price confirms the move, OI building against it fades it
        let direction = match snapshot.price_change_pct {
            Some(change) if change != 0.0 => {
                Direction::from_sign(oi_change.signum() * change.signum())
            }
            _ => Direction::Neutral,
        };
        Signal {
            id,
            direction,
            magnitude,
            detail: format!("OI change {:.0}", oi_change),
        }
    }

    fn gamma_flip_proximity(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::GammaFlipProximity;
        let Some(flip) = snapshot.gamma_flip_level else {
            return Signal::neutral(id, "gamma flip unavailable");
        };
        let distance_pct = (snapshot.spot - flip).abs() / snapshot.spot * 100.0;
        let band = self.config.flip_band_pct;
        if band <= 0.0 || distance_pct >= band {
            return Signal::neutral(id, format!("{:.2}% from gamma flip", distance_pct));
        }
        directional(
            id,
            Direction::from_sign(snapshot.spot - flip),
            1.0 - distance_pct / band,
            format!("{:.2}% from gamma flip {:.2}", distance_pct, flip),
        )
    }

    fn flow_imbalance(&self, snapshot: &CheckedSnapshot) -> Signal {
        let id = SignalId::FlowImbalance;
        let (Some(call), Some(put)) = (snapshot.call_volume, snapshot.put_volume) else {
            return Signal::neutral(id, "call/put volume unavailable");
        };
        let total = call + put;
        if total <= 0.0 {
            return Signal::neutral(id, "no option volume");
        }
        let imbalance = (call - put) / total;
        if imbalance.abs() < self.config.flow_dead_zone {
            return Signal::neutral(id, format!("flow imbalance {:.2}", imbalance));
        }
        directional(
            id,
            Direction::from_sign(imbalance),
            imbalance.abs(),
            format!("flow imbalance {:.2}", imbalance),
        )
    }
}

fn directional(id: SignalId, direction: Direction, magnitude: f64, detail: String) -> Signal {
    let magnitude = clamp_unit(magnitude);
    Signal {
        id,
        // A zero-magnitude signal carries no direction
        direction: if magnitude > 0.0 {
            direction
        } else {
            Direction::Neutral
        },
        magnitude,
        detail,
    }
}
