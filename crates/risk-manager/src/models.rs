use chrono::NaiveDate;
use decision_core::{ReasonCode, VolatilityRegime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Maximum risk per trade as percentage (default 2%)
    #[serde(default = "default_max_risk_per_trade")]
    pub max_risk_per_trade_percent: f64,
    /// Maximum daily loss as percentage before halting (default 5%)
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit_percent: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence_threshold: f64,
    /// Minimum tradeable liquidity in contracts (default 500)
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: f64,
    /// Highest volatility regime still tradeable (default high)
    #[serde(default = "default_max_volatility")]
    pub max_volatility: VolatilityRegime,
}

fn default_max_risk_per_trade() -> f64 { 2.0 }
fn default_daily_loss_limit() -> f64 { 5.0 }
fn default_min_confidence() -> f64 { 0.60 }
fn default_min_liquidity() -> f64 { 500.0 }
fn default_max_volatility() -> VolatilityRegime { VolatilityRegime::High }

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            max_risk_per_trade_percent: default_max_risk_per_trade(),
            daily_loss_limit_percent: default_daily_loss_limit(),
            min_confidence_threshold: default_min_confidence(),
            min_liquidity: default_min_liquidity(),
            max_volatility: default_max_volatility(),
        }
    }
}

/// Realized account state the gate checks against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub trading_day: Option<NaiveDate>,
    /// Realized P&L for the trading day, percent of account (negative = loss)
    pub daily_pnl_percent: f64,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            trading_day: None,
            daily_pnl_percent: 0.0,
        }
    }
}

impl AccountState {
    /// Record realized P&L for `day`. A new day discards the previous day's figure.
    pub fn record(&mut self, day: NaiveDate, daily_pnl_percent: f64) {
        self.trading_day = Some(day);
        self.daily_pnl_percent = if daily_pnl_percent.is_finite() {
            daily_pnl_percent
        } else {
            0.0
        };
    }

    /// P&L applicable on `day`; a stale day counts as flat
    pub fn pnl_on(&self, day: NaiveDate) -> f64 {
        match self.trading_day {
            Some(recorded) if recorded == day => self.daily_pnl_percent,
            _ => 0.0,
        }
    }
}

/// Gate verdict: the first failing check, or approval
#[derive(Debug, Clone, PartialEq)]
pub struct RiskCheck {
    pub can_trade: bool,
    pub reason: ReasonCode,
    pub detail: String,
}

impl RiskCheck {
    pub fn pass() -> Self {
        Self {
            can_trade: true,
            reason: ReasonCode::Approved,
            detail: "Trade meets all risk criteria".to_string(),
        }
    }

    pub fn reject(reason: ReasonCode, detail: String) -> Self {
        Self {
            can_trade: false,
            reason,
            detail,
        }
    }
}
