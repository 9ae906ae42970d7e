use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DecisionError, Stage};

/// Volatility tag published by the metrics producer.
/// Unrecognised tags deserialize as `Normal`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum VolatilityRegime {
    Low,
    #[default]
    Normal,
    High,
    Extreme,
}

impl VolatilityRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityRegime::Low => "low",
            VolatilityRegime::Normal => "normal",
            VolatilityRegime::High => "high",
            VolatilityRegime::Extreme => "extreme",
        }
    }

    /// Tag-only volatility score (0.0 to 1.0), used when no IV/HV data is present
    pub fn severity(&self) -> f64 {
        match self {
            VolatilityRegime::Low | VolatilityRegime::Normal => 0.0,
            VolatilityRegime::High => 0.6,
            VolatilityRegime::Extreme => 0.9,
        }
    }
}

impl From<String> for VolatilityRegime {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "low" | "calm" | "low_volatility" => VolatilityRegime::Low,
            "high" | "elevated" | "high_volatility" => VolatilityRegime::High,
            "extreme" | "very_high" | "panic" => VolatilityRegime::Extreme,
            _ => VolatilityRegime::Normal,
        }
    }
}

impl From<VolatilityRegime> for String {
    fn from(regime: VolatilityRegime) -> Self {
        regime.as_str().to_string()
    }
}

/// Open interest, volume and gamma at a single strike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeLiquidity {
    pub strike: f64,
    #[serde(default)]
    pub call_oi: f64,
    #[serde(default)]
    pub put_oi: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub gamma: Option<f64>,
}

impl StrikeLiquidity {
    pub fn open_interest(&self) -> f64 {
        self.call_oi + self.put_oi
    }

    /// Tradeable liquidity: resting open interest plus session volume
    pub fn liquidity(&self) -> f64 {
        self.open_interest() + self.volume
    }
}

/// Point-in-time derived market state for one symbol, produced upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub symbol: String,
    pub spot: f64,
    #[serde(default)]
    pub support: Option<f64>,
    #[serde(default)]
    pub resistance: Option<f64>,
    #[serde(default)]
    pub pcr: Option<f64>,
    #[serde(default)]
    pub oi_change: Option<f64>,
    #[serde(default)]
    pub net_gamma: Option<f64>,
    #[serde(default)]
    pub gamma_flip_level: Option<f64>,
    #[serde(default)]
    pub volatility_regime: VolatilityRegime,
    #[serde(default)]
    pub volume: Option<f64>,
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub avg_volume: Option<f64>,
    /// Session price change in percent
    #[serde(default)]
    pub price_change_pct: Option<f64>,
    /// Options-implied expected move for the session, in percent of spot
    #[serde(default)]
    pub expected_move_pct: Option<f64>,
    #[serde(default)]
    pub call_oi_change: Option<f64>,
    #[serde(default)]
    pub put_oi_change: Option<f64>,
    #[serde(default)]
    pub call_delta_exposure: Option<f64>,
    #[serde(default)]
    pub put_delta_exposure: Option<f64>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    #[serde(default)]
    pub historical_volatility: Option<f64>,
    #[serde(default)]
    pub call_volume: Option<f64>,
    #[serde(default)]
    pub put_volume: Option<f64>,
    #[serde(default)]
    pub strikes: Vec<StrikeLiquidity>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn positive(value: Option<f64>) -> Option<f64> {
    finite(value).filter(|v| *v > 0.0)
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    finite(value).filter(|v| *v >= 0.0)
}

impl MetricsSnapshot {
    /// Snapshot with only the required fields set; every optional metric is neutral
    pub fn new(symbol: impl Into<String>, spot: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            spot,
            support: None,
            resistance: None,
            pcr: None,
            oi_change: None,
            net_gamma: None,
            gamma_flip_level: None,
            volatility_regime: VolatilityRegime::Normal,
            volume: None,
            timestamp,
            avg_volume: None,
            price_change_pct: None,
            expected_move_pct: None,
            call_oi_change: None,
            put_oi_change: None,
            call_delta_exposure: None,
            put_delta_exposure: None,
            implied_volatility: None,
            historical_volatility: None,
            call_volume: None,
            put_volume: None,
            strikes: Vec::new(),
        }
    }

    /// Ingress validation. Rejects snapshots without a usable spot price and
    /// degrades every malformed optional field to "absent".
    pub fn validate(mut self) -> Result<CheckedSnapshot, DecisionError> {
        if !self.spot.is_finite() || self.spot <= 0.0 {
            return Err(DecisionError::InvalidInput(format!(
                "spot must be a positive number, got {}",
                self.spot
            )));
        }
        if crate::scoring::to_price(self.spot).is_none() {
            return Err(DecisionError::InvalidInput(format!(
                "spot {} is outside the representable price range",
                self.spot
            )));
        }
        self.symbol = self.symbol.trim().to_string();
        if self.symbol.is_empty() {
            return Err(DecisionError::InvalidInput("symbol is empty".to_string()));
        }

        self.support = positive(self.support);
        self.resistance = positive(self.resistance);
        if let (Some(support), Some(resistance)) = (self.support, self.resistance) {
            if support >= resistance {
                self.support = None;
                self.resistance = None;
            }
        }

        self.pcr = positive(self.pcr);
        self.oi_change = finite(self.oi_change);
        self.net_gamma = finite(self.net_gamma);
        self.gamma_flip_level = positive(self.gamma_flip_level);
        self.volume = non_negative(self.volume);
        self.avg_volume = positive(self.avg_volume);
        self.price_change_pct = finite(self.price_change_pct);
        self.expected_move_pct = positive(self.expected_move_pct);
        self.call_oi_change = finite(self.call_oi_change);
        self.put_oi_change = finite(self.put_oi_change);
        self.call_delta_exposure = finite(self.call_delta_exposure);
        self.put_delta_exposure = finite(self.put_delta_exposure);
        self.implied_volatility = positive(self.implied_volatility);
        self.historical_volatility = positive(self.historical_volatility);
        self.call_volume = non_negative(self.call_volume);
        self.put_volume = non_negative(self.put_volume);

        self.strikes.retain(|s| s.strike.is_finite() && s.strike > 0.0);
        for strike in &mut self.strikes {
            strike.call_oi = non_negative(Some(strike.call_oi)).unwrap_or(0.0);
            strike.put_oi = non_negative(Some(strike.put_oi)).unwrap_or(0.0);
            strike.volume = non_negative(Some(strike.volume)).unwrap_or(0.0);
            strike.gamma = finite(strike.gamma);
        }
        self.strikes.sort_by(|a, b| a.strike.total_cmp(&b.strike));

        Ok(CheckedSnapshot(self))
    }
}

/// A snapshot that passed ingress validation. Stages only accept this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckedSnapshot(MetricsSnapshot);

impl CheckedSnapshot {
    pub fn into_inner(self) -> MetricsSnapshot {
        self.0
    }

    /// Width of the support/resistance band, when both levels are known
    pub fn range_width(&self) -> Option<f64> {
        match (self.0.support, self.0.resistance) {
            (Some(support), Some(resistance)) => Some(resistance - support),
            _ => None,
        }
    }
}

impl Deref for CheckedSnapshot {
    type Target = MetricsSnapshot;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The fixed signal catalog, in derivation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalId {
    PcrSentiment,
    OiSkew,
    GammaRegime,
    VolumeAnomaly,
    ExpectedMoveBreach,
    DeltaSkew,
    VolatilityExpansion,
    OiVelocity,
    GammaFlipProximity,
    FlowImbalance,
}

impl SignalId {
    pub const ALL: [SignalId; 10] = [
        SignalId::PcrSentiment,
        SignalId::OiSkew,
        SignalId::GammaRegime,
        SignalId::VolumeAnomaly,
        SignalId::ExpectedMoveBreach,
        SignalId::DeltaSkew,
        SignalId::VolatilityExpansion,
        SignalId::OiVelocity,
        SignalId::GammaFlipProximity,
        SignalId::FlowImbalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalId::PcrSentiment => "pcr_sentiment",
            SignalId::OiSkew => "oi_skew",
            SignalId::GammaRegime => "gamma_regime",
            SignalId::VolumeAnomaly => "volume_anomaly",
            SignalId::ExpectedMoveBreach => "expected_move_breach",
            SignalId::DeltaSkew => "delta_skew",
            SignalId::VolatilityExpansion => "volatility_expansion",
            SignalId::OiVelocity => "oi_velocity",
            SignalId::GammaFlipProximity => "gamma_flip_proximity",
            SignalId::FlowImbalance => "flow_imbalance",
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalId {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| DecisionError::InvalidInput(format!("unknown signal id '{}'", s)))
    }
}

/// Directional bias of a signal or a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    /// Direction of a signed quantity; zero and NaN map to neutral
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Bullish
        } else if value < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
            Direction::Neutral => "neutral",
        }
    }
}

/// A single named, scored indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub direction: Direction,
    /// 0.0 to 1.0
    pub magnitude: f64,
    pub detail: String,
}

impl Signal {
    pub fn neutral(id: SignalId, detail: impl Into<String>) -> Self {
        Self {
            id,
            direction: Direction::Neutral,
            magnitude: 0.0,
            detail: detail.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.magnitude > 0.0
    }
}

/// Ordered signal set produced by one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalVector {
    signals: Vec<Signal>,
}

impl SignalVector {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, id: SignalId) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id == id)
    }

    pub fn magnitude(&self, id: SignalId) -> f64 {
        self.get(id).map(|s| s.magnitude).unwrap_or(0.0)
    }

    /// Net directional bias (-1.0 to 1.0): signed magnitude over gross
    /// magnitude of the directional signals
    pub fn bias(&self) -> f64 {
        let (net, gross) = self
            .signals
            .iter()
            .filter(|s| s.direction != Direction::Neutral)
            .fold((0.0, 0.0), |(net, gross), s| {
                (net + s.direction.sign() * s.magnitude, gross + s.magnitude)
            });
        if gross <= f64::EPSILON {
            0.0
        } else {
            (net / gross).clamp(-1.0, 1.0)
        }
    }

    /// Sign of the bias, neutral inside `dead_zone`
    pub fn direction(&self, dead_zone: f64) -> Direction {
        let bias = self.bias();
        if bias.abs() < dead_zone {
            Direction::Neutral
        } else {
            Direction::from_sign(bias)
        }
    }

    /// Mean of the three largest magnitudes, regardless of direction
    pub fn strength(&self) -> f64 {
        let mut magnitudes: Vec<f64> = self.signals.iter().map(|s| s.magnitude).collect();
        crate::scoring::top_k_mean(&mut magnitudes, 3)
    }

    pub fn aligned(&self, direction: Direction) -> impl Iterator<Item = &Signal> {
        self.signals
            .iter()
            .filter(move |s| s.direction == direction && s.is_active())
    }

    pub fn aligned_count(&self, direction: Direction) -> usize {
        self.aligned(direction).count()
    }

    /// Mean magnitude of the active signals pointing in `direction`
    pub fn aligned_mean(&self, direction: Direction) -> f64 {
        let magnitudes: Vec<f64> = self.aligned(direction).map(|s| s.magnitude).collect();
        crate::scoring::mean(&magnitudes)
    }
}

/// Regime labels. `Unknown` is never produced by classification; it marks
/// proposals that short-circuited before or failed during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeKind {
    Trend,
    Range,
    Breakout,
    MeanReversion,
    HighVolatility,
    LowVolatility,
    Unknown,
}

impl RegimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeKind::Trend => "trend",
            RegimeKind::Range => "range",
            RegimeKind::Breakout => "breakout",
            RegimeKind::MeanReversion => "mean_reversion",
            RegimeKind::HighVolatility => "high_volatility",
            RegimeKind::LowVolatility => "low_volatility",
            RegimeKind::Unknown => "unknown",
        }
    }

    /// Regimes whose strategies need a directional bias
    pub fn is_directional(&self) -> bool {
        matches!(
            self,
            RegimeKind::Trend | RegimeKind::Breakout | RegimeKind::MeanReversion
        )
    }
}

impl fmt::Display for RegimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regime {
    pub kind: RegimeKind,
    /// 0.0 to 1.0
    pub confidence: f64,
}

impl Regime {
    pub fn unknown() -> Self {
        Self {
            kind: RegimeKind::Unknown,
            confidence: 0.0,
        }
    }
}

/// Strategy catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectionalLong,
    BullCallSpread,
    BearPutSpread,
    IronCondor,
    Straddle,
    Strangle,
    Hold,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::DirectionalLong,
        Strategy::BullCallSpread,
        Strategy::BearPutSpread,
        Strategy::IronCondor,
        Strategy::Straddle,
        Strategy::Strangle,
        Strategy::Hold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectionalLong => "directional_long",
            Strategy::BullCallSpread => "bull_call_spread",
            Strategy::BearPutSpread => "bear_put_spread",
            Strategy::IronCondor => "iron_condor",
            Strategy::Straddle => "straddle",
            Strategy::Strangle => "strangle",
            Strategy::Hold => "hold",
        }
    }

    /// Structures whose levels are expressed on the underlying
    pub fn is_directional(&self) -> bool {
        matches!(
            self,
            Strategy::DirectionalLong | Strategy::BullCallSpread | Strategy::BearPutSpread
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| DecisionError::InvalidInput(format!("unknown strategy '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyChoice {
    pub strategy: Strategy,
    pub bias: Direction,
}

impl StrategyChoice {
    pub fn hold() -> Self {
        Self {
            strategy: Strategy::Hold,
            bias: Direction::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub kind: OptionKind,
    pub side: LegSide,
    pub strike: Decimal,
}

impl fmt::Display for OptionLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            LegSide::Buy => "BUY",
            LegSide::Sell => "SELL",
        };
        let kind = match self.kind {
            OptionKind::Call => "CE",
            OptionKind::Put => "PE",
        };
        write!(f, "{} {} {}", side, self.strike.normalize(), kind)
    }
}

/// Option structure of a proposal; empty for HOLD
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    pub legs: Vec<OptionLeg>,
}

impl OptionDescriptor {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn label(&self) -> String {
        if self.legs.is_empty() {
            return "NONE".to_string();
        }
        self.legs
            .iter()
            .map(|leg| leg.to_string())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// What entry, target and stop are quoted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelBasis {
    Underlying,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: Decimal,
    pub target: Decimal,
    pub stop: Decimal,
    pub basis: LevelBasis,
}

impl TradeLevels {
    pub fn flat(price: Decimal, basis: LevelBasis) -> Self {
        Self {
            entry: price,
            target: price,
            stop: price,
            basis,
        }
    }

    /// Reward over risk. Call form when the target is above entry,
    /// put form when it is below; `None` for inconsistent levels.
    pub fn risk_reward(&self) -> Option<Decimal> {
        let (reward, risk) = if self.target > self.entry && self.stop < self.entry {
            (self.target - self.entry, self.entry - self.stop)
        } else if self.target < self.entry && self.stop > self.entry {
            (self.entry - self.target, self.stop - self.entry)
        } else {
            return None;
        };
        reward.checked_div(risk)
    }

    /// Distance between entry and stop
    pub fn risk(&self) -> Decimal {
        (self.entry - self.stop).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
    Failed,
}

/// Machine-readable reason attached to every proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    Approved,
    InvalidMetrics,
    SignalCooldown,
    ConfidenceBelowMinimum,
    LiquidityBelowMinimum,
    VolatilityAboveCeiling,
    PerTradeRiskExceeded,
    DailyLossLimitReached,
    RiskRewardBelowMinimum,
    NoTradeSetup,
    StageFault(Stage),
    EvaluationTimeout,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ReasonCode::Approved => "approved",
            ReasonCode::InvalidMetrics => "invalid_metrics",
            ReasonCode::SignalCooldown => "signal_cooldown",
            ReasonCode::ConfidenceBelowMinimum => "confidence_below_minimum",
            ReasonCode::LiquidityBelowMinimum => "liquidity_below_minimum",
            ReasonCode::VolatilityAboveCeiling => "volatility_above_ceiling",
            ReasonCode::PerTradeRiskExceeded => "per_trade_risk_exceeded",
            ReasonCode::DailyLossLimitReached => "daily_loss_limit_reached",
            ReasonCode::RiskRewardBelowMinimum => "risk_reward_below_minimum",
            ReasonCode::NoTradeSetup => "no_trade_setup",
            ReasonCode::StageFault(stage) => return write!(f, "stage_fault:{}", stage),
            ReasonCode::EvaluationTimeout => "evaluation_timeout",
        };
        f.write_str(code)
    }
}

/// Proposal as assembled before the risk gate
#[derive(Debug, Clone, PartialEq)]
pub struct DraftProposal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub spot: Decimal,
    pub choice: StrategyChoice,
    pub regime: Regime,
    pub option: OptionDescriptor,
    pub levels: TradeLevels,
    pub confidence: f64,
    /// `None` when the snapshot carried no liquidity data at all
    pub liquidity: Option<f64>,
    pub volatility: VolatilityRegime,
}

/// The externally visible unit of work. One per evaluation, on every path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub symbol: String,
    pub strategy: Strategy,
    pub bias: Direction,
    pub option: OptionDescriptor,
    pub entry: Decimal,
    pub target: Decimal,
    pub stop: Decimal,
    pub level_basis: LevelBasis,
    pub confidence: f64,
    pub risk_reward: Decimal,
    pub regime: RegimeKind,
    pub regime_confidence: f64,
    pub status: ApprovalStatus,
    pub reason: String,
    pub explanation: Vec<String>,
    pub fingerprint: String,
    pub timestamp: DateTime<Utc>,
}

impl TradeProposal {
    /// HOLD shape used by every short-circuit and fail-safe path
    pub fn hold(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        reference_price: Decimal,
        status: ApprovalStatus,
        reason: ReasonCode,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            strategy: Strategy::Hold,
            bias: Direction::Neutral,
            option: OptionDescriptor::none(),
            entry: reference_price,
            target: reference_price,
            stop: reference_price,
            level_basis: LevelBasis::Underlying,
            confidence: 0.0,
            risk_reward: Decimal::ZERO,
            regime: RegimeKind::Unknown,
            regime_confidence: 0.0,
            status,
            reason: reason.to_string(),
            explanation: vec![reason.to_string()],
            fingerprint: String::new(),
            timestamp,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    pub fn levels(&self) -> TradeLevels {
        TradeLevels {
            entry: self.entry,
            target: self.target,
            stop: self.stop,
            basis: self.level_basis,
        }
    }
}

/// Realized classification reported by the settlement process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    TargetHit,
    StopHit,
    Expired,
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::TargetHit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Settlement::TargetHit => "target_hit",
            Settlement::StopHit => "stop_hit",
            Settlement::Expired => "expired",
        }
    }
}

impl FromStr for Settlement {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "target_hit" => Ok(Settlement::TargetHit),
            "stop_hit" => Ok(Settlement::StopHit),
            "expired" => Ok(Settlement::Expired),
            other => Err(DecisionError::InvalidInput(format!(
                "unknown settlement '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub symbol: String,
    pub fingerprint: String,
    pub outcome: Settlement,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}
