use std::any::Any;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::NaiveDate;
use decision_core::scoring::to_price;
use decision_core::{
    ApprovalStatus, CheckedSnapshot, DecisionError, Direction, DraftProposal, LevelBasis,
    MetricsSnapshot, OptionDescriptor, ReasonCode, SignalId, SignalVector, Stage, Strategy,
    SuccessRates, TradeLevels, TradeProposal,
};
use market_regime_detector::MarketRegimeDetector;
use outcome_tracker::{Attribution, OutcomeTracker};
use risk_manager::{AccountState, RiskGate};
use rust_decimal::Decimal;
use signal_engine::SignalEngine;
use strategy_planner::{LevelOutcome, LevelPlan, LevelPlanner, StrategySelector};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::cooldown::{lock, CooldownBook};
use crate::explanation::ExplanationComposer;
use crate::fingerprint::proposal_fingerprint;

/// A fully evaluated proposal plus what produced it
struct Evaluation {
    proposal: TradeProposal,
    attribution: Option<Attribution>,
}

/// Drives one snapshot through every stage and returns exactly one proposal.
/// Stage errors and panics stop here; callers only ever see proposals.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    engine: SignalEngine,
    detector: MarketRegimeDetector,
    selector: StrategySelector,
    planner: LevelPlanner,
    gate: RiskGate,
    composer: ExplanationComposer,
    tracker: Arc<OutcomeTracker>,
    cooldowns: CooldownBook,
    account: RwLock<AccountState>,
}

impl Default for PipelineCoordinator {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl PipelineCoordinator {
    pub fn new(config: PipelineConfig) -> Self {
        let tracker = Arc::new(OutcomeTracker::new(config.tracker.clone()));
        Self::with_tracker(config, tracker)
    }

    /// Share an existing tracker, e.g. one rebuilt from stored history
    pub fn with_tracker(config: PipelineConfig, tracker: Arc<OutcomeTracker>) -> Self {
        Self {
            engine: SignalEngine::with_config(config.signals.clone()),
            detector: MarketRegimeDetector::with_thresholds(config.regime.clone()),
            selector: StrategySelector::with_config(config.selector.clone()),
            planner: LevelPlanner::with_config(config.levels.clone()),
            gate: RiskGate::new(config.risk.clone()),
            composer: ExplanationComposer::new(config.max_reasons),
            tracker,
            cooldowns: CooldownBook::new(),
            account: RwLock::new(AccountState::default()),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<OutcomeTracker> {
        &self.tracker
    }

    pub fn cooldowns(&self) -> &CooldownBook {
        &self.cooldowns
    }

    /// Update realized P&L for the trading day. A new day replaces the old figure.
    pub fn record_daily_pnl(&self, day: NaiveDate, daily_pnl_percent: f64) {
        let mut account = self.account.write().unwrap_or_else(|e| e.into_inner());
        account.record(day, daily_pnl_percent);
        info!(%day, daily_pnl_percent, "Recorded daily P&L");
    }

    pub fn account_state(&self) -> AccountState {
        self.account
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Evaluate one snapshot. Never fails: every path yields a proposal.
    pub fn evaluate(&self, snapshot: MetricsSnapshot) -> TradeProposal {
        let started = Instant::now();
        let symbol = snapshot.symbol.clone();
        let timestamp = snapshot.timestamp;
        let reference = to_price(snapshot.spot).unwrap_or(Decimal::ZERO);

        let checked = match snapshot.validate() {
            Ok(checked) => checked,
            Err(e) => {
                info!(symbol = %symbol, error = %e, "Rejected snapshot at ingress");
                let mut proposal = TradeProposal::hold(
                    symbol,
                    timestamp,
                    reference,
                    ApprovalStatus::Rejected,
                    ReasonCode::InvalidMetrics,
                );
                proposal.explanation = vec![e.to_string()];
                return finalize(proposal);
            }
        };

        // Held for the whole evaluation: one writer per symbol
        let slot = self.cooldowns.slot(&checked.symbol);
        let mut slot = lock(&slot);

        let window = self.config.cooldown_for(&checked.symbol);
        if slot.blocks(checked.timestamp, window) {
            let remaining = slot.remaining(checked.timestamp, window);
            debug!(
                symbol = %checked.symbol,
                remaining_ms = remaining.num_milliseconds(),
                "Symbol in cooldown"
            );
            let mut proposal = TradeProposal::hold(
                checked.symbol.clone(),
                timestamp,
                reference,
                ApprovalStatus::Rejected,
                ReasonCode::SignalCooldown,
            );
            proposal.explanation = vec![format!(
                "signal_cooldown: {}ms left in the {}s window",
                remaining.num_milliseconds(),
                window.num_seconds()
            )];
            return finalize(proposal);
        }

        let rates = self.tracker.snapshot();
        let stage = Cell::new(Stage::SignalDerivation);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(&checked, rates.as_ref(), &stage)
        }));

        let evaluation = match outcome {
            Ok(Ok(evaluation)) => Ok(evaluation),
            Ok(Err(e)) => {
                error!(symbol = %checked.symbol, stage = %e.stage(), error = %e, "Stage fault");
                Err(e.stage())
            }
            Err(panic) => {
                error!(
                    symbol = %checked.symbol,
                    stage = %stage.get(),
                    panic = %panic_message(panic.as_ref()),
                    "Stage panicked"
                );
                Err(stage.get())
            }
        };

        let evaluation = match evaluation {
            Ok(evaluation) => evaluation,
            Err(faulted) => {
                return finalize(self.failed(&checked, ReasonCode::StageFault(faulted)));
            }
        };

        let elapsed = started.elapsed();
        if elapsed >= self.config.evaluation_timeout() {
            warn!(
                symbol = %checked.symbol,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.evaluation_timeout_ms,
                "Evaluation exceeded its time budget"
            );
            return finalize(self.failed(&checked, ReasonCode::EvaluationTimeout));
        }

        let proposal = finalize(evaluation.proposal);
        if proposal.is_approved() {
            slot.record(checked.timestamp);
            info!(
                symbol = %proposal.symbol,
                strategy = %proposal.strategy,
                option = %proposal.option.label(),
                confidence = proposal.confidence,
                risk_reward = %proposal.risk_reward,
                fingerprint = %proposal.fingerprint,
                "Proposal approved"
            );
        } else {
            debug!(
                symbol = %proposal.symbol,
                reason = %proposal.reason,
                "Proposal rejected"
            );
        }

        if let Some(attribution) = evaluation.attribution {
            self.tracker.register(proposal.fingerprint.clone(), attribution);
        }

        debug!(
            symbol = %proposal.symbol,
            elapsed_us = elapsed.as_micros() as u64,
            "Evaluation finished"
        );
        proposal
    }

    /// Evaluate a batch concurrently, bounded by `max_concurrent_evaluations`.
    /// Results come back in input order; a crashed task yields a failed proposal.
    pub async fn evaluate_many(
        self: &Arc<Self>,
        snapshots: Vec<MetricsSnapshot>,
    ) -> Vec<TradeProposal> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_evaluations.max(1)));
        let mut handles = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            let sem = semaphore.clone();
            let coordinator = Arc::clone(self);
            let symbol = snapshot.symbol.clone();
            let timestamp = snapshot.timestamp;
            let reference = to_price(snapshot.spot).unwrap_or(Decimal::ZERO);

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                tokio::task::spawn_blocking(move || coordinator.evaluate(snapshot)).await
            });
            handles.push((symbol, timestamp, reference, handle));
        }

        let mut proposals = Vec::with_capacity(handles.len());
        for (symbol, timestamp, reference, handle) in handles {
            let proposal = match handle.await {
                Ok(Ok(proposal)) => proposal,
                Ok(Err(e)) | Err(e) => {
                    error!(symbol = %symbol, error = %e, "Evaluation task failed");
                    finalize(TradeProposal::hold(
                        symbol,
                        timestamp,
                        reference,
                        ApprovalStatus::Failed,
                        ReasonCode::StageFault(Stage::Coordinator),
                    ))
                }
            };
            proposals.push(proposal);
        }
        proposals
    }

    fn run_stages(
        &self,
        snapshot: &CheckedSnapshot,
        rates: &dyn SuccessRates,
        stage: &Cell<Stage>,
    ) -> Result<Evaluation, DecisionError> {
        let spot = to_price(snapshot.spot)
            .ok_or_else(|| DecisionError::fault(Stage::Coordinator, "spot not representable"))?;

        stage.set(Stage::SignalDerivation);
        let signals = self.engine.derive(snapshot, rates);

        stage.set(Stage::RegimeClassifier);
        let regime = self.detector.detect_regime(&signals, snapshot).regime;

        stage.set(Stage::StrategySelector);
        let selection = self.selector.select(&regime, &signals, rates);
        let choice = selection.choice;

        stage.set(Stage::LevelCalculator);
        let (plan, below_minimum) = match self.planner.plan(&choice, snapshot)? {
            LevelOutcome::Flat => (
                LevelPlan {
                    option: OptionDescriptor::none(),
                    levels: TradeLevels::flat(spot, LevelBasis::Underlying),
                    liquidity: None,
                },
                false,
            ),
            LevelOutcome::Planned(plan) => (plan, false),
            LevelOutcome::BelowMinimum(plan) => (plan, true),
        };

        stage.set(Stage::RiskGate);
        let draft = DraftProposal {
            symbol: snapshot.symbol.clone(),
            timestamp: snapshot.timestamp,
            spot,
            choice,
            regime,
            option: plan.option,
            levels: plan.levels,
            confidence: selection.confidence,
            liquidity: plan.liquidity,
            volatility: snapshot.volatility_regime,
        };
        let verdict = self.gate.check(&draft, &self.account_state());
        let reason = if !verdict.can_trade {
            verdict.reason
        } else if choice.strategy == Strategy::Hold {
            ReasonCode::NoTradeSetup
        } else if below_minimum {
            ReasonCode::RiskRewardBelowMinimum
        } else {
            ReasonCode::Approved
        };

        stage.set(Stage::ExplanationComposer);
        let mut explanation = self.composer.compose(&signals, &regime, &choice, reason);
        if !verdict.can_trade && explanation.len() < self.config.max_reasons {
            explanation.push(verdict.detail.clone());
        }

        stage.set(Stage::Coordinator);
        let attribution = (choice.strategy != Strategy::Hold).then(|| Attribution {
            symbol: draft.symbol.clone(),
            signals: contributing_signals(&signals, choice.bias),
            strategy: choice.strategy,
            confidence: draft.confidence,
            registered_at: draft.timestamp,
        });

        let proposal = if reason == ReasonCode::Approved {
            let risk_reward = draft.levels.risk_reward().ok_or_else(|| {
                DecisionError::fault(Stage::Coordinator, "approved levels carry no risk")
            })?;
            TradeProposal {
                symbol: draft.symbol,
                strategy: choice.strategy,
                bias: choice.bias,
                option: draft.option,
                entry: draft.levels.entry,
                target: draft.levels.target,
                stop: draft.levels.stop,
                level_basis: draft.levels.basis,
                confidence: draft.confidence,
                risk_reward,
                regime: regime.kind,
                regime_confidence: regime.confidence,
                status: ApprovalStatus::Approved,
                reason: reason.to_string(),
                explanation,
                fingerprint: String::new(),
                timestamp: draft.timestamp,
            }
        } else {
            // Rejections keep the analysis but carry no structure
            let mut hold = TradeProposal::hold(
                draft.symbol,
                draft.timestamp,
                spot,
                ApprovalStatus::Rejected,
                reason,
            );
            hold.confidence = draft.confidence;
            hold.regime = regime.kind;
            hold.regime_confidence = regime.confidence;
            hold.explanation = explanation;
            hold
        };

        Ok(Evaluation {
            proposal,
            attribution,
        })
    }

    /// Fail-safe HOLD: regime unknown, no structure
    fn failed(&self, snapshot: &CheckedSnapshot, reason: ReasonCode) -> TradeProposal {
        TradeProposal::hold(
            snapshot.symbol.clone(),
            snapshot.timestamp,
            to_price(snapshot.spot).unwrap_or(Decimal::ZERO),
            ApprovalStatus::Failed,
            reason,
        )
    }
}

/// Signals credited with a proposal's outcome: active ones agreeing with
/// the bias, or every active one for neutral structures
fn contributing_signals(signals: &SignalVector, bias: Direction) -> Vec<SignalId> {
    signals
        .iter()
        .filter(|s| s.is_active())
        .filter(|s| bias == Direction::Neutral || s.direction == bias)
        .map(|s| s.id)
        .collect()
}

fn finalize(mut proposal: TradeProposal) -> TradeProposal {
    proposal.fingerprint = proposal_fingerprint(
        &proposal.symbol,
        proposal.timestamp,
        proposal.strategy,
        &proposal.levels(),
    );
    proposal
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
