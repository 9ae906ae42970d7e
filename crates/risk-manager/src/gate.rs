use decision_core::{DraftProposal, LevelBasis, ReasonCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{AccountState, RiskCheck, RiskParameters};

/// Short-circuiting pre-trade checks. Order is fixed: confidence, liquidity,
/// volatility, per-trade risk, daily loss. Only the first failure is reported.
pub struct RiskGate {
    params: RiskParameters,
}

impl Default for RiskGate {
    fn default() -> Self {
        Self::new(RiskParameters::default())
    }
}

impl RiskGate {
    pub fn new(params: RiskParameters) -> Self {
        Self { params }
    }

    pub fn parameters(&self) -> &RiskParameters {
        &self.params
    }

    pub fn check(&self, draft: &DraftProposal, account: &AccountState) -> RiskCheck {
        let verdict = self.evaluate(draft, account);
        debug!(
            symbol = %draft.symbol,
            can_trade = verdict.can_trade,
            reason = %verdict.reason,
            "Risk gate verdict"
        );
        verdict
    }

    fn evaluate(&self, draft: &DraftProposal, account: &AccountState) -> RiskCheck {
        let params = &self.params;

        // Check confidence threshold
        if draft.confidence < params.min_confidence_threshold {
            return RiskCheck::reject(
                ReasonCode::ConfidenceBelowMinimum,
                format!(
                    "Confidence {:.1}% below minimum threshold {:.1}%",
                    draft.confidence * 100.0,
                    params.min_confidence_threshold * 100.0
                ),
            );
        }

        // Unknown liquidity skips the floor
        if let Some(liquidity) = draft.liquidity {
            if liquidity < params.min_liquidity {
                return RiskCheck::reject(
                    ReasonCode::LiquidityBelowMinimum,
                    format!(
                        "Liquidity {:.0} below minimum {:.0} contracts",
                        liquidity, params.min_liquidity
                    ),
                );
            }
        }

        if draft.volatility > params.max_volatility {
            return RiskCheck::reject(
                ReasonCode::VolatilityAboveCeiling,
                format!(
                    "Volatility regime {} above ceiling {}",
                    draft.volatility.as_str(),
                    params.max_volatility.as_str()
                ),
            );
        }

        let risk_percent = per_trade_risk_percent(draft);
        if risk_percent > params.max_risk_per_trade_percent {
            return RiskCheck::reject(
                ReasonCode::PerTradeRiskExceeded,
                format!(
                    "Risk per trade {:.2}% exceeds maximum {:.2}%",
                    risk_percent, params.max_risk_per_trade_percent
                ),
            );
        }

        let daily_pnl = account.pnl_on(draft.timestamp.date_naive());
        if daily_pnl < 0.0 && daily_pnl <= -params.daily_loss_limit_percent {
            return RiskCheck::reject(
                ReasonCode::DailyLossLimitReached,
                format!(
                    "Daily loss {:.1}% at or beyond limit of {:.1}%",
                    daily_pnl.abs(),
                    params.daily_loss_limit_percent
                ),
            );
        }

        RiskCheck::pass()
    }
}

/// Stop distance as a percentage of entry for underlying levels, premium at
/// risk as a percentage of spot for premium levels
pub fn per_trade_risk_percent(draft: &DraftProposal) -> f64 {
    let levels = &draft.levels;
    let reference = match levels.basis {
        LevelBasis::Underlying => levels.entry,
        LevelBasis::Premium => draft.spot,
    };
    if reference <= Decimal::ZERO {
        return 0.0;
    }
    (levels.risk() / reference * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(f64::INFINITY)
}
