use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Directional regimes with |bias| below this select HOLD (default 0.25)
    #[serde(default = "default_min_bias")]
    pub min_bias: f64,
    /// Signal strength at which a one-sided bias counts in full (default 0.5).
    /// Weaker vectors scale the bias term down proportionally.
    #[serde(default = "default_full_conviction_strength")]
    pub full_conviction_strength: f64,
}

fn default_min_bias() -> f64 { 0.25 }
fn default_full_conviction_strength() -> f64 { 0.5 }

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_bias: default_min_bias(),
            full_conviction_strength: default_full_conviction_strength(),
        }
    }
}

/// Strike-scoring weights: distance from spot, open interest, gamma proximity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeWeights {
    pub distance: f64,
    pub open_interest: f64,
    pub gamma: f64,
}

impl Default for StrikeWeights {
    fn default() -> Self {
        Self {
            distance: 0.40,
            open_interest: 0.35,
            gamma: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Minimum reward/risk for any plan (default 2.0)
    #[serde(default = "default_min_risk_reward")]
    pub min_risk_reward: Decimal,
    /// Stop-hunt buffer beyond the adverse cluster, percent of spot
    #[serde(default = "default_stop_buffer_pct")]
    pub stop_buffer_pct: Decimal,
    /// Stop distance, percent of spot, when no adverse cluster exists
    #[serde(default = "default_fallback_stop_pct")]
    pub fallback_stop_pct: Decimal,
    /// How far past the favourable cluster a target may be pushed, as a multiple of range width
    #[serde(default = "default_max_target_extension")]
    pub max_target_extension: Decimal,
    /// Range width, percent of spot, when support/resistance are absent
    #[serde(default = "default_fallback_range_pct")]
    pub fallback_range_pct: Decimal,

    #[serde(default = "default_strike_step")]
    pub strike_step: Decimal,
    /// Spread and condor wing width, in strike steps
    #[serde(default = "default_spread_width_steps")]
    pub spread_width_steps: u32,

    /// Debit structures: stop at (1 - fraction) of the premium paid
    #[serde(default = "default_debit_stop_fraction")]
    pub debit_stop_fraction: Decimal,
    /// Strangle premium relative to the straddle reference premium
    #[serde(default = "default_strangle_premium_factor")]
    pub strangle_premium_factor: Decimal,
    /// Condor credit relative to the reference premium
    #[serde(default = "default_condor_credit_factor")]
    pub condor_credit_factor: Decimal,
    /// Condor stop at (1 + fraction) of the credit received
    #[serde(default = "default_condor_stop_fraction")]
    pub condor_stop_fraction: Decimal,

    /// Strikes with at least this fraction of the peak open interest count as clusters
    #[serde(default = "default_cluster_oi_fraction")]
    pub cluster_oi_fraction: f64,
    /// Liquidity floor for strike candidates
    #[serde(default = "default_min_strike_liquidity")]
    pub min_strike_liquidity: f64,
    /// Candidate strikes lie within this percent of spot
    #[serde(default = "default_max_distance_pct")]
    pub max_distance_pct: f64,
    #[serde(default)]
    pub strike_weights: StrikeWeights,
}

fn default_min_risk_reward() -> Decimal { dec!(2.0) }
fn default_stop_buffer_pct() -> Decimal { dec!(0.1) }
fn default_fallback_stop_pct() -> Decimal { dec!(1.0) }
fn default_max_target_extension() -> Decimal { dec!(0.5) }
fn default_fallback_range_pct() -> Decimal { dec!(2.0) }
fn default_strike_step() -> Decimal { dec!(50) }
fn default_spread_width_steps() -> u32 { 4 }
fn default_debit_stop_fraction() -> Decimal { dec!(0.35) }
fn default_strangle_premium_factor() -> Decimal { dec!(0.6) }
fn default_condor_credit_factor() -> Decimal { dec!(0.3) }
fn default_condor_stop_fraction() -> Decimal { dec!(0.4) }
fn default_cluster_oi_fraction() -> f64 { 0.5 }
fn default_min_strike_liquidity() -> f64 { 100.0 }
fn default_max_distance_pct() -> f64 { 3.0 }

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            min_risk_reward: default_min_risk_reward(),
            stop_buffer_pct: default_stop_buffer_pct(),
            fallback_stop_pct: default_fallback_stop_pct(),
            max_target_extension: default_max_target_extension(),
            fallback_range_pct: default_fallback_range_pct(),
            strike_step: default_strike_step(),
            spread_width_steps: default_spread_width_steps(),
            debit_stop_fraction: default_debit_stop_fraction(),
            strangle_premium_factor: default_strangle_premium_factor(),
            condor_credit_factor: default_condor_credit_factor(),
            condor_stop_fraction: default_condor_stop_fraction(),
            cluster_oi_fraction: default_cluster_oi_fraction(),
            min_strike_liquidity: default_min_strike_liquidity(),
            max_distance_pct: default_max_distance_pct(),
            strike_weights: StrikeWeights::default(),
        }
    }
}
