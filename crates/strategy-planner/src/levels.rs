use decision_core::scoring::to_price;
use decision_core::{
    CheckedSnapshot, DecisionError, Direction, LegSide, LevelBasis, OptionDescriptor, OptionKind,
    OptionLeg, Stage, Strategy, StrategyChoice, TradeLevels,
};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::config::LevelConfig;
use crate::strikes::{StrikePick, StrikeSelector, StrikeSide};

/// Option structure, levels and liquidity for one strategy choice
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
    pub option: OptionDescriptor,
    pub levels: TradeLevels,
    pub liquidity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LevelOutcome {
    /// HOLD: no structure, no levels
    Flat,
    Planned(LevelPlan),
    /// Levels could not reach the minimum reward/risk, even after target extension
    BelowMinimum(LevelPlan),
}

pub struct LevelPlanner {
    config: LevelConfig,
}

impl Default for LevelPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn fault(message: impl Into<String>) -> DecisionError {
    DecisionError::fault(Stage::LevelCalculator, message)
}

/// Round to cents away from the entry: down below it, up above it
fn round_away(value: Decimal, entry: Decimal) -> Decimal {
    let strategy = if value < entry {
        RoundingStrategy::ToNegativeInfinity
    } else {
        RoundingStrategy::ToPositiveInfinity
    };
    value.round_dp_with_strategy(2, strategy)
}

impl LevelPlanner {
    pub fn new() -> Self {
        Self::with_config(LevelConfig::default())
    }

    pub fn with_config(config: LevelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn plan(
        &self,
        choice: &StrategyChoice,
        snapshot: &CheckedSnapshot,
    ) -> Result<LevelOutcome, DecisionError> {
        let spot = to_price(snapshot.spot).ok_or_else(|| fault("spot not representable"))?;
        let strikes = StrikeSelector::new(&self.config);
        // Validates the strike grid for every structure
        strikes.atm_strike(spot)?;

        let outcome = match choice.strategy {
            Strategy::Hold => LevelOutcome::Flat,
            Strategy::DirectionalLong
            | Strategy::BullCallSpread
            | Strategy::BearPutSpread => {
                if choice.bias == Direction::Neutral {
                    return Err(fault(format!(
                        "{} requires a directional bias",
                        choice.strategy
                    )));
                }
                let bullish = choice.bias == Direction::Bullish;
                let (option, liquidity) =
                    self.directional_structure(choice.strategy, bullish, snapshot, &strikes)?;
                let levels = self.underlying_levels(bullish, spot, snapshot)?;
                self.finish(option, levels, liquidity)
            }
            Strategy::Straddle | Strategy::Strangle | Strategy::IronCondor => {
                let (option, liquidity) =
                    self.neutral_structure(choice.strategy, spot, snapshot, &strikes)?;
                let levels = self.premium_levels(choice.strategy, spot, snapshot)?;
                self.finish(option, levels, liquidity)
            }
        };

        if let LevelOutcome::Planned(plan) | LevelOutcome::BelowMinimum(plan) = &outcome {
            debug!(
                symbol = %snapshot.symbol,
                strategy = choice.strategy.as_str(),
                option = %plan.option.label(),
                entry = %plan.levels.entry,
                target = %plan.levels.target,
                stop = %plan.levels.stop,
                "Planned levels"
            );
        }
        Ok(outcome)
    }

    fn finish(
        &self,
        option: OptionDescriptor,
        levels: TradeLevels,
        liquidity: Option<f64>,
    ) -> LevelOutcome {
        let meets_minimum = levels
            .risk_reward()
            .is_some_and(|rr| rr >= self.config.min_risk_reward);
        let plan = LevelPlan {
            option,
            levels,
            liquidity,
        };
        if meets_minimum {
            LevelOutcome::Planned(plan)
        } else {
            LevelOutcome::BelowMinimum(plan)
        }
    }

    /// Support, resistance, gamma flip and high open-interest strikes
    fn clusters(&self, snapshot: &CheckedSnapshot) -> Vec<Decimal> {
        let mut levels: Vec<f64> = [
            snapshot.support,
            snapshot.resistance,
            snapshot.gamma_flip_level,
        ]
        .into_iter()
        .flatten()
        .collect();

        let max_oi = snapshot
            .strikes
            .iter()
            .map(|s| s.open_interest())
            .fold(0.0_f64, f64::max);
        if max_oi > 0.0 {
            let floor = max_oi * self.config.cluster_oi_fraction;
            levels.extend(
                snapshot
                    .strikes
                    .iter()
                    .filter(|s| s.open_interest() >= floor)
                    .map(|s| s.strike),
            );
        }

        levels.into_iter().filter_map(to_price).collect()
    }

    fn range_width(&self, spot: Decimal, snapshot: &CheckedSnapshot) -> Decimal {
        snapshot
            .range_width()
            .and_then(to_price)
            .filter(|w| *w > Decimal::ZERO)
            .unwrap_or(spot * self.config.fallback_range_pct / Decimal::ONE_HUNDRED)
    }

    fn underlying_levels(
        &self,
        bullish: bool,
        spot: Decimal,
        snapshot: &CheckedSnapshot,
    ) -> Result<TradeLevels, DecisionError> {
        let c = &self.config;
        let clusters = self.clusters(snapshot);
        let (adverse, favourable) = if bullish {
            (
                clusters.iter().copied().filter(|l| *l < spot).max(),
                clusters.iter().copied().filter(|l| *l > spot).min(),
            )
        } else {
            (
                clusters.iter().copied().filter(|l| *l > spot).min(),
                clusters.iter().copied().filter(|l| *l < spot).max(),
            )
        };
        let side = if bullish { Decimal::ONE } else { Decimal::NEGATIVE_ONE };

        let buffer = spot * c.stop_buffer_pct / Decimal::ONE_HUNDRED;
        let raw_stop = match adverse {
            Some(level) => level - side * buffer,
            None => spot - side * spot * c.fallback_stop_pct / Decimal::ONE_HUNDRED,
        };
        let stop = round_away(raw_stop, spot);
        let risk = (spot - stop).abs();

        let required = spot + side * c.min_risk_reward * risk;
        let base = favourable.unwrap_or(spot);
        let limit = base + side * c.max_target_extension * self.range_width(spot, snapshot);

        let target = match favourable {
            Some(level) if (level - required) * side >= Decimal::ZERO => level,
            _ if (limit - required) * side >= Decimal::ZERO => required,
            _ => limit,
        };

        let levels = TradeLevels {
            entry: spot,
            target: round_away(target, spot),
            stop,
            basis: LevelBasis::Underlying,
        };
        if levels.stop <= Decimal::ZERO || levels.target <= Decimal::ZERO {
            return Err(fault(format!(
                "levels left the positive price range: stop {}, target {}",
                levels.stop, levels.target
            )));
        }
        Ok(levels)
    }

    /// Debit structures are quoted in call form, the condor credit in put form
    fn premium_levels(
        &self,
        strategy: Strategy,
        spot: Decimal,
        snapshot: &CheckedSnapshot,
    ) -> Result<TradeLevels, DecisionError> {
        let c = &self.config;
        let reference = snapshot
            .expected_move_pct
            .and_then(|pct| to_price(snapshot.spot * pct / 100.0))
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or(self.range_width(spot, snapshot) / Decimal::TWO);

        let levels = match strategy {
            Strategy::IronCondor => {
                let entry = (reference * c.condor_credit_factor).round_dp(2);
                let stop = round_away(entry * (Decimal::ONE + c.condor_stop_fraction), entry);
                let target = (entry - c.min_risk_reward * (stop - entry)).max(Decimal::ZERO);
                TradeLevels {
                    entry,
                    target: round_away(target, entry).max(Decimal::ZERO),
                    stop,
                    basis: LevelBasis::Premium,
                }
            }
            Strategy::Straddle | Strategy::Strangle => {
                let premium = if strategy == Strategy::Strangle {
                    reference * c.strangle_premium_factor
                } else {
                    reference
                };
                let entry = premium.round_dp(2);
                let stop = round_away(entry * (Decimal::ONE - c.debit_stop_fraction), entry);
                let target = entry + c.min_risk_reward * (entry - stop);
                TradeLevels {
                    entry,
                    target: round_away(target, entry),
                    stop,
                    basis: LevelBasis::Premium,
                }
            }
            other => return Err(fault(format!("{} has no premium levels", other))),
        };
        Ok(levels)
    }

    fn directional_structure(
        &self,
        strategy: Strategy,
        bullish: bool,
        snapshot: &CheckedSnapshot,
        strikes: &StrikeSelector<'_>,
    ) -> Result<(OptionDescriptor, Option<f64>), DecisionError> {
        let (side, kind) = if bullish {
            (StrikeSide::Call, OptionKind::Call)
        } else {
            (StrikeSide::Put, OptionKind::Put)
        };
        let pick = strikes.select(snapshot, side)?;
        let mut legs = vec![leg(kind, LegSide::Buy, pick.strike)];

        if strategy != Strategy::DirectionalLong {
            let width = self.wing_width();
            let short_strike = if bullish {
                pick.strike + width
            } else {
                pick.strike - width
            };
            if short_strike <= Decimal::ZERO {
                return Err(fault(format!("spread short strike {} not positive", short_strike)));
            }
            legs.push(leg(kind, LegSide::Sell, short_strike));
        }

        Ok((OptionDescriptor { legs }, pick.liquidity))
    }

    fn neutral_structure(
        &self,
        strategy: Strategy,
        spot: Decimal,
        snapshot: &CheckedSnapshot,
        strikes: &StrikeSelector<'_>,
    ) -> Result<(OptionDescriptor, Option<f64>), DecisionError> {
        let step = self.config.strike_step;
        let call = strikes.select(snapshot, StrikeSide::Call)?;
        let put = strikes.select(snapshot, StrikeSide::Put)?;
        let liquidity = combined_liquidity(&call, &put);

        let legs = match strategy {
            Strategy::Straddle => {
                let atm = strikes.atm_strike(spot)?;
                vec![
                    leg(OptionKind::Call, LegSide::Buy, atm),
                    leg(OptionKind::Put, LegSide::Buy, atm),
                ]
            }
            Strategy::Strangle => {
                let (mut call_strike, mut put_strike) = (call.strike, put.strike);
                if call_strike <= put_strike {
                    call_strike = put_strike + step;
                    put_strike -= step;
                }
                vec![
                    leg(OptionKind::Call, LegSide::Buy, call_strike),
                    leg(OptionKind::Put, LegSide::Buy, put_strike),
                ]
            }
            Strategy::IronCondor => {
                let half_width = self.range_width(spot, snapshot) / Decimal::TWO;
                let lower = snapshot.support.and_then(to_price).unwrap_or(spot - half_width);
                let upper = snapshot.resistance.and_then(to_price).unwrap_or(spot + half_width);
                let short_put = (lower / step).floor() * step;
                let short_call = (upper / step).ceil() * step;
                let wing = self.wing_width();
                vec![
                    leg(OptionKind::Put, LegSide::Buy, short_put - wing),
                    leg(OptionKind::Put, LegSide::Sell, short_put),
                    leg(OptionKind::Call, LegSide::Sell, short_call),
                    leg(OptionKind::Call, LegSide::Buy, short_call + wing),
                ]
            }
            other => return Err(fault(format!("{} is not a neutral structure", other))),
        };

        if legs.iter().any(|l| l.strike <= Decimal::ZERO) {
            return Err(fault("structure produced a non-positive strike"));
        }
        Ok((OptionDescriptor { legs }, liquidity))
    }

    fn wing_width(&self) -> Decimal {
        self.config.strike_step * Decimal::from(self.config.spread_width_steps)
    }
}

fn leg(kind: OptionKind, side: LegSide, strike: Decimal) -> OptionLeg {
    OptionLeg { kind, side, strike }
}

/// Multi-leg structures are only as liquid as their thinnest side
fn combined_liquidity(a: &StrikePick, b: &StrikePick) -> Option<f64> {
    match (a.liquidity, b.liquidity) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}
