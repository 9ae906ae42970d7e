use decision_core::scoring::clamp_unit;
use decision_core::{CheckedSnapshot, DecisionError, Stage, StrikeLiquidity};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::LevelConfig;

/// Which side of spot a strike must be on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeSide {
    /// At or above spot
    Call,
    /// At or below spot
    Put,
}

/// Outcome of strike selection
#[derive(Debug, Clone, PartialEq)]
pub struct StrikePick {
    pub strike: Decimal,
    /// Liquidity behind the strike, `None` when nothing is known
    pub liquidity: Option<f64>,
    /// Score of the winning candidate; `None` for the at-the-money fallback
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
struct Candidate {
    strike: f64,
    distance: f64,
    score: f64,
    liquidity: f64,
}

pub struct StrikeSelector<'a> {
    config: &'a LevelConfig,
}

impl<'a> StrikeSelector<'a> {
    pub fn new(config: &'a LevelConfig) -> Self {
        Self { config }
    }

    /// Nearest strike on the configured grid
    pub fn atm_strike(&self, spot: Decimal) -> Result<Decimal, DecisionError> {
        let step = self.config.strike_step;
        if step <= Decimal::ZERO {
            return Err(DecisionError::fault(
                Stage::LevelCalculator,
                format!("strike step must be positive, got {}", step),
            ));
        }
        let steps = (spot / step).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Ok(steps * step)
    }

    /// Highest-scoring liquid strike on `side`. Ties go to the strike nearest
    /// spot, then to the lower strike. Falls back to the at-the-money grid strike.
    pub fn select(
        &self,
        snapshot: &CheckedSnapshot,
        side: StrikeSide,
    ) -> Result<StrikePick, DecisionError> {
        let spot = snapshot.spot;
        let on_side: Vec<&StrikeLiquidity> = snapshot
            .strikes
            .iter()
            .filter(|s| match side {
                StrikeSide::Call => s.strike >= spot,
                StrikeSide::Put => s.strike <= spot,
            })
            .collect();

        let mut candidates = self.score(snapshot, &on_side);
        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.distance.total_cmp(&b.distance))
                .then(a.strike.total_cmp(&b.strike))
        });

        if let Some(best) = candidates.first() {
            let strike = Decimal::from_f64(best.strike).ok_or_else(|| {
                DecisionError::fault(
                    Stage::LevelCalculator,
                    format!("strike {} not representable", best.strike),
                )
            })?;
            return Ok(StrikePick {
                strike,
                liquidity: Some(best.liquidity),
                score: Some(best.score),
            });
        }

        let spot = Decimal::from_f64(spot).ok_or_else(|| {
            DecisionError::fault(Stage::LevelCalculator, "spot not representable")
        })?;
        Ok(StrikePick {
            strike: self.atm_strike(spot)?,
            liquidity: self.fallback_liquidity(snapshot, &on_side),
            score: None,
        })
    }

    fn score(&self, snapshot: &CheckedSnapshot, strikes: &[&StrikeLiquidity]) -> Vec<Candidate> {
        let spot = snapshot.spot;
        let max_distance = spot * self.config.max_distance_pct / 100.0;
        if max_distance <= 0.0 {
            return Vec::new();
        }

        let eligible: Vec<&StrikeLiquidity> = strikes
            .iter()
            .copied()
            .filter(|s| (s.strike - spot).abs() <= max_distance)
            .filter(|s| s.liquidity() >= self.config.min_strike_liquidity)
            .collect();

        let max_oi = eligible
            .iter()
            .map(|s| s.open_interest())
            .fold(0.0_f64, f64::max);
        let max_gamma = eligible
            .iter()
            .filter_map(|s| s.gamma.map(f64::abs))
            .fold(0.0_f64, f64::max);

        let weights = &self.config.strike_weights;
        eligible
            .into_iter()
            .map(|s| {
                let distance = (s.strike - spot).abs();
                let oi_score = if max_oi > 0.0 {
                    s.open_interest() / max_oi
                } else {
                    0.0
                };
                let gamma_score = if max_gamma > 0.0 {
                    s.gamma.map(|g| g.abs() / max_gamma).unwrap_or(0.0)
                } else {
                    snapshot
                        .gamma_flip_level
                        .map(|flip| clamp_unit(1.0 - (s.strike - flip).abs() / max_distance))
                        .unwrap_or(0.0)
                };
                Candidate {
                    strike: s.strike,
                    distance,
                    score: weights.distance * (1.0 - distance / max_distance)
                        + weights.open_interest * oi_score
                        + weights.gamma * gamma_score,
                    liquidity: s.liquidity(),
                }
            })
            .collect()
    }

    /// Liquidity estimate when no strike qualified: the best strike on the side
    /// if any were quoted, else session volume, else unknown
    fn fallback_liquidity(
        &self,
        snapshot: &CheckedSnapshot,
        strikes: &[&StrikeLiquidity],
    ) -> Option<f64> {
        if !snapshot.strikes.is_empty() {
            return Some(
                strikes
                    .iter()
                    .map(|s| s.liquidity())
                    .fold(0.0_f64, f64::max),
            );
        }
        snapshot.volume
    }
}
