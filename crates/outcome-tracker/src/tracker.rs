use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use decision_core::{OutcomeRecord, SignalId, Strategy, SuccessRates};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationReport;
use crate::history::OutcomeStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Unknown proposal fingerprint: {0}")]
    UnknownFingerprint(String),

    #[error("Outcome for {fingerprint} names {found}, proposal was for {expected}")]
    SymbolMismatch {
        fingerprint: String,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Attempts required before a rate moves its multiplier off 1.0
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    /// Pseudo-samples at 50% success blended into every rate
    #[serde(default = "default_prior_weight")]
    pub prior_weight: f64,
    #[serde(default = "default_steepness")]
    pub steepness: f64,
    #[serde(default = "default_half_span")]
    pub half_span: f64,
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,
    /// Attributions registered this long before the newest one are dropped,
    /// settled or not (default 168 h)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
    /// Upper bound on retained attributions; the oldest go first (default 10 000)
    #[serde(default = "default_max_attributions")]
    pub max_attributions: usize,
}

fn default_min_samples() -> u64 { 20 }
fn default_prior_weight() -> f64 { 20.0 }
fn default_steepness() -> f64 { 4.0 }
fn default_half_span() -> f64 { 0.5 }
fn default_min_multiplier() -> f64 { 0.5 }
fn default_max_multiplier() -> f64 { 1.5 }
fn default_retention_hours() -> i64 { 168 }
fn default_max_attributions() -> usize { 10_000 }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            prior_weight: default_prior_weight(),
            steepness: default_steepness(),
            half_span: default_half_span(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
            retention_hours: default_retention_hours(),
            max_attributions: default_max_attributions(),
        }
    }
}

/// What produced a proposal, kept until its outcome settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub symbol: String,
    pub signals: Vec<SignalId>,
    pub strategy: Strategy,
    /// Confidence the proposal was issued at
    pub confidence: f64,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessStats {
    pub successes: u64,
    pub attempts: u64,
}

impl SuccessStats {
    pub fn rate(&self) -> Option<f64> {
        (self.attempts > 0).then(|| self.successes as f64 / self.attempts as f64)
    }

    fn record(&mut self, success: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        }
    }
}

/// Immutable view of the success statistics, republished after every ingestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessSnapshot {
    pub signals: BTreeMap<SignalId, SuccessStats>,
    pub strategies: BTreeMap<Strategy, SuccessStats>,
    pub config: TrackerConfig,
}

impl SuccessSnapshot {
    /// `1 + half_span * tanh(k * (r - 0.5))`, with `r` shrunk toward 0.5 by the
    /// prior, clamped to the configured bounds. Neutral below `min_samples`.
    pub fn multiplier(&self, stats: Option<&SuccessStats>) -> f64 {
        let c = &self.config;
        let Some(stats) = stats.filter(|s| s.attempts >= c.min_samples && s.attempts > 0) else {
            return 1.0;
        };
        let prior = c.prior_weight.max(0.0);
        let shrunk =
            (stats.successes as f64 + 0.5 * prior) / (stats.attempts as f64 + prior);
        let multiplier = 1.0 + c.half_span * (c.steepness * (shrunk - 0.5)).tanh();
        if multiplier.is_finite() {
            multiplier.clamp(c.min_multiplier, c.max_multiplier)
        } else {
            1.0
        }
    }
}

impl SuccessRates for SuccessSnapshot {
    fn signal_multiplier(&self, id: SignalId) -> f64 {
        self.multiplier(self.signals.get(&id))
    }

    fn strategy_multiplier(&self, strategy: Strategy) -> f64 {
        self.multiplier(self.strategies.get(&strategy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Recorded,
    /// The fingerprint already had an outcome; nothing changed
    Duplicate,
}

/// Counts from rebuilding the tracker out of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub attributions: usize,
    pub outcomes: usize,
    pub duplicates: usize,
    pub orphaned: usize,
}

#[derive(Default)]
struct TrackerState {
    attributions: HashMap<String, Attribution>,
    /// Registration order, oldest first
    registered: BTreeSet<(DateTime<Utc>, String)>,
    settled: HashMap<String, bool>,
    signals: BTreeMap<SignalId, SuccessStats>,
    strategies: BTreeMap<Strategy, SuccessStats>,
    /// (issued confidence, success) per settled proposal
    calibration: Vec<(f64, bool)>,
}

pub struct OutcomeTracker {
    config: TrackerConfig,
    state: RwLock<TrackerState>,
    published: RwLock<Arc<SuccessSnapshot>>,
}

impl Default for OutcomeTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl OutcomeTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let snapshot = SuccessSnapshot {
            config: config.clone(),
            ..SuccessSnapshot::default()
        };
        Self {
            config,
            state: RwLock::new(TrackerState::default()),
            published: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TrackerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TrackerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current statistics. May trail the latest ingestion by one update.
    pub fn snapshot(&self) -> Arc<SuccessSnapshot> {
        self.published
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|e| Arc::clone(&e.into_inner()))
    }

    /// Remember what produced a proposal. The first registration of a fingerprint wins.
    pub fn register(&self, fingerprint: impl Into<String>, attribution: Attribution) -> bool {
        let fingerprint = fingerprint.into();
        let mut state = self.write_state();
        if state.attributions.contains_key(&fingerprint) {
            return false;
        }
        debug!(
            fingerprint = %fingerprint,
            symbol = %attribution.symbol,
            strategy = attribution.strategy.as_str(),
            "Registered attribution"
        );
        state
            .registered
            .insert((attribution.registered_at, fingerprint.clone()));
        state.attributions.insert(fingerprint, attribution);

        let evicted = self.evict(&mut state);
        if evicted > 0 {
            debug!(evicted, retained = state.attributions.len(), "Evicted stale attributions");
        }
        true
    }

    /// Drop attributions older than the retention window, measured from the
    /// newest registration, then the oldest beyond `max_attributions`.
    /// A settled fingerprint is forgotten with its attribution.
    fn evict(&self, state: &mut TrackerState) -> usize {
        let Some(newest) = state.registered.last().map(|(at, _)| *at) else {
            return 0;
        };
        let cutoff = newest - Duration::hours(self.config.retention_hours.max(0));

        let mut evicted = 0;
        while let Some((at, fingerprint)) = state.registered.first().cloned() {
            if at >= cutoff && state.registered.len() <= self.config.max_attributions {
                break;
            }
            state.registered.remove(&(at, fingerprint.clone()));
            state.attributions.remove(&fingerprint);
            state.settled.remove(&fingerprint);
            evicted += 1;
        }
        evicted
    }

    /// Attributions currently retained, settled or not
    pub fn retained(&self) -> usize {
        self.read_state().attributions.len()
    }

    pub fn attribution(&self, fingerprint: &str) -> Option<Attribution> {
        self.read_state().attributions.get(fingerprint).cloned()
    }

    /// Attributions still waiting for an outcome
    pub fn pending(&self) -> usize {
        let state = self.read_state();
        state
            .attributions
            .keys()
            .filter(|fp| !state.settled.contains_key(*fp))
            .count()
    }

    /// Append one settled outcome. Idempotent per fingerprint.
    pub fn ingest(&self, record: &OutcomeRecord) -> Result<IngestStatus, TrackerError> {
        {
            let mut state = self.write_state();
            let attribution = state
                .attributions
                .get(&record.fingerprint)
                .cloned()
                .ok_or_else(|| TrackerError::UnknownFingerprint(record.fingerprint.clone()))?;

            if attribution.symbol != record.symbol {
                return Err(TrackerError::SymbolMismatch {
                    fingerprint: record.fingerprint.clone(),
                    expected: attribution.symbol,
                    found: record.symbol.clone(),
                });
            }
            if state.settled.contains_key(&record.fingerprint) {
                return Ok(IngestStatus::Duplicate);
            }

            let success = record.outcome.is_success();
            state.settled.insert(record.fingerprint.clone(), success);
            for id in &attribution.signals {
                state.signals.entry(*id).or_default().record(success);
            }
            state
                .strategies
                .entry(attribution.strategy)
                .or_default()
                .record(success);
            state.calibration.push((attribution.confidence, success));

            // Published under the state lock so snapshots go out in ingestion order
            let snapshot = SuccessSnapshot {
                signals: state.signals.clone(),
                strategies: state.strategies.clone(),
                config: self.config.clone(),
            };
            let mut published = self.published.write().unwrap_or_else(|e| e.into_inner());
            *published = Arc::new(snapshot);
        }

        debug!(
            fingerprint = %record.fingerprint,
            outcome = record.outcome.as_str(),
            "Ingested outcome"
        );
        Ok(IngestStatus::Recorded)
    }

    pub fn calibration_report(&self) -> CalibrationReport {
        CalibrationReport::from_pairs(&self.read_state().calibration)
    }

    /// Rebuild statistics from a store. Attributions go in registration order,
    /// each followed by its outcomes in append order, so history older than the
    /// retention window still counts before it is evicted.
    pub async fn replay(&self, store: &dyn OutcomeStore) -> anyhow::Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        let attributions = store.load_attributions().await?;
        let mut outcomes: HashMap<String, Vec<OutcomeRecord>> = HashMap::new();
        for record in store.load_outcomes().await? {
            outcomes
                .entry(record.fingerprint.clone())
                .or_default()
                .push(record);
        }

        for (fingerprint, attribution) in attributions {
            let settled = outcomes.remove(&fingerprint).unwrap_or_default();
            if self.register(fingerprint, attribution) {
                summary.attributions += 1;
            }
            for record in &settled {
                match self.ingest(record) {
                    Ok(IngestStatus::Recorded) => summary.outcomes += 1,
                    Ok(IngestStatus::Duplicate) => summary.duplicates += 1,
                    Err(e) => {
                        warn!("Skipping stored outcome: {}", e);
                        summary.orphaned += 1;
                    }
                }
            }
        }

        for record in outcomes.values().flatten() {
            warn!(fingerprint = %record.fingerprint, "Stored outcome has no attribution");
            summary.orphaned += 1;
        }

        info!(
            attributions = summary.attributions,
            outcomes = summary.outcomes,
            duplicates = summary.duplicates,
            orphaned = summary.orphaned,
            "Replayed outcome history"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use decision_core::Settlement;

    fn attribution(signals: Vec<SignalId>, strategy: Strategy) -> Attribution {
        Attribution {
            symbol: "NIFTY".to_string(),
            signals,
            strategy,
            confidence: 0.7,
            registered_at: Utc::now(),
        }
    }

    fn outcome(fingerprint: &str, outcome: Settlement) -> OutcomeRecord {
        OutcomeRecord {
            symbol: "NIFTY".to_string(),
            fingerprint: fingerprint.to_string(),
            outcome,
            settled_at: None,
        }
    }

    fn settle(tracker: &OutcomeTracker, count: usize, successes: usize, signal: SignalId) {
        for i in 0..count {
            let fp = format!("{:?}-{}", signal, i);
            tracker.register(&fp, attribution(vec![signal], Strategy::DirectionalLong));
            let result = if i < successes {
                Settlement::TargetHit
            } else {
                Settlement::StopHit
            };
            tracker.ingest(&outcome(&fp, result)).unwrap();
        }
    }

    #[test]
    fn test_neutral_below_min_samples() {
        let tracker = OutcomeTracker::default();
        settle(&tracker, 19, 19, SignalId::PcrSentiment);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.signals[&SignalId::PcrSentiment].attempts, 19);
        assert_eq!(snapshot.signal_multiplier(SignalId::PcrSentiment), 1.0);
    }

    #[test]
    fn test_strong_history_raises_multiplier_within_clamp() {
        let tracker = OutcomeTracker::default();
        settle(&tracker, 50, 40, SignalId::GammaRegime);

        let snapshot = tracker.snapshot();
        let m = snapshot.signal_multiplier(SignalId::GammaRegime);
        let shrunk: f64 = (40.0 + 10.0) / 70.0;
        assert_relative_eq!(m, 1.0 + 0.5 * (4.0 * (shrunk - 0.5)).tanh(), epsilon = 1e-12);
        assert!(m > 1.0 && m <= 1.5);
        // Untouched ids stay neutral
        assert_eq!(snapshot.signal_multiplier(SignalId::OiSkew), 1.0);
    }

    #[test]
    fn test_poor_history_lowers_multiplier() {
        let tracker = OutcomeTracker::default();
        settle(&tracker, 60, 6, SignalId::FlowImbalance);

        let m = tracker.snapshot().signal_multiplier(SignalId::FlowImbalance);
        assert!(m < 1.0 && m >= 0.5);
    }

    #[test]
    fn test_multipliers_are_independent() {
        let tracker = OutcomeTracker::default();
        settle(&tracker, 30, 30, SignalId::PcrSentiment);

        let snapshot = tracker.snapshot();
        assert!(snapshot.signal_multiplier(SignalId::PcrSentiment) > 1.0);
        assert!(snapshot.strategy_multiplier(Strategy::DirectionalLong) > 1.0);
        assert_eq!(snapshot.strategy_multiplier(Strategy::IronCondor), 1.0);
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let tracker = OutcomeTracker::default();
        tracker.register("fp-1", attribution(vec![SignalId::OiSkew], Strategy::Straddle));

        assert_eq!(
            tracker.ingest(&outcome("fp-1", Settlement::TargetHit)),
            Ok(IngestStatus::Recorded)
        );
        assert_eq!(
            tracker.ingest(&outcome("fp-1", Settlement::StopHit)),
            Ok(IngestStatus::Duplicate)
        );

        let stats = tracker.snapshot().strategies[&Strategy::Straddle];
        assert_eq!(stats, SuccessStats { successes: 1, attempts: 1 });
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn test_unknown_fingerprint_is_reported() {
        let tracker = OutcomeTracker::default();
        let err = tracker
            .ingest(&outcome("missing", Settlement::Expired))
            .unwrap_err();
        assert_eq!(err, TrackerError::UnknownFingerprint("missing".to_string()));
    }

    #[test]
    fn test_expired_counts_as_attempt_only() {
        let tracker = OutcomeTracker::default();
        tracker.register("fp", attribution(vec![SignalId::DeltaSkew], Strategy::Strangle));
        tracker.ingest(&outcome("fp", Settlement::Expired)).unwrap();

        let stats = tracker.snapshot().signals[&SignalId::DeltaSkew];
        assert_eq!(stats, SuccessStats { successes: 0, attempts: 1 });
    }

    #[test]
    fn test_first_registration_wins() {
        let tracker = OutcomeTracker::default();
        assert!(tracker.register("fp", attribution(vec![], Strategy::Straddle)));
        assert!(!tracker.register("fp", attribution(vec![], Strategy::Strangle)));
        assert_eq!(tracker.attribution("fp").unwrap().strategy, Strategy::Straddle);
    }

    fn registered_at(at: DateTime<Utc>) -> Attribution {
        Attribution {
            registered_at: at,
            ..attribution(vec![SignalId::OiSkew], Strategy::IronCondor)
        }
    }

    #[test]
    fn test_stale_attributions_are_evicted() {
        let tracker = OutcomeTracker::default();
        let start = Utc::now();
        tracker.register("old", registered_at(start));
        tracker.register("settled", registered_at(start + Duration::hours(1)));
        tracker.ingest(&outcome("settled", Settlement::TargetHit)).unwrap();
        tracker.register("fresh", registered_at(start + Duration::hours(100)));
        assert_eq!(tracker.retained(), 3);

        // 170 h after the first registration: both early ones age out
        tracker.register("newest", registered_at(start + Duration::hours(170)));
        assert_eq!(tracker.retained(), 2);
        assert!(tracker.attribution("old").is_none());
        assert!(tracker.attribution("settled").is_none());
        assert_eq!(tracker.pending(), 2);

        // Statistics outlive the attributions they came from
        let stats = tracker.snapshot().strategies[&Strategy::IronCondor];
        assert_eq!(stats, SuccessStats { successes: 1, attempts: 1 });
        assert_eq!(
            tracker.ingest(&outcome("settled", Settlement::TargetHit)),
            Err(TrackerError::UnknownFingerprint("settled".to_string()))
        );
    }

    #[test]
    fn test_attribution_count_is_capped() {
        let config = TrackerConfig {
            max_attributions: 100,
            ..TrackerConfig::default()
        };
        let tracker = OutcomeTracker::new(config);
        let start = Utc::now();
        for i in 0..1000 {
            tracker.register(format!("tick-{}", i), registered_at(start + Duration::seconds(i)));
        }

        assert_eq!(tracker.retained(), 100);
        assert_eq!(tracker.pending(), 100);
        assert!(tracker.attribution("tick-899").is_none());
        assert!(tracker.attribution("tick-900").is_some());
        assert!(tracker.attribution("tick-999").is_some());
    }

    #[test]
    fn test_concurrent_ingests_publish_latest_statistics() {
        let tracker = OutcomeTracker::default();
        for i in 0..200 {
            tracker.register(format!("fp-{}", i), attribution(vec![], Strategy::Straddle));
        }

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let tracker = &tracker;
                scope.spawn(move || {
                    for i in (worker..200).step_by(8) {
                        let fp = format!("fp-{}", i);
                        tracker.ingest(&outcome(&fp, Settlement::TargetHit)).unwrap();
                    }
                });
            }
        });

        let stats = tracker.snapshot().strategies[&Strategy::Straddle];
        assert_eq!(stats, SuccessStats { successes: 200, attempts: 200 });
    }
}
