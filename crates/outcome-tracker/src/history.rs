//! Outcome History Module
//!
//! Append-only persistence for proposal attributions and settled outcomes,
//! so the tracker can be rebuilt after a restart.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use decision_core::{OutcomeRecord, Settlement, SignalId, Strategy};
use sqlx::FromRow;

use crate::tracker::Attribution;

#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn append_attribution(&self, fingerprint: &str, attribution: &Attribution) -> Result<()>;

    async fn append_outcome(&self, record: &OutcomeRecord) -> Result<()>;

    /// All attributions in registration order
    async fn load_attributions(&self) -> Result<Vec<(String, Attribution)>>;

    /// All outcomes in append order
    async fn load_outcomes(&self) -> Result<Vec<OutcomeRecord>>;

    /// Delete attributions registered before `before` that never settled.
    /// Returns the number removed.
    async fn prune_attributions(&self, before: DateTime<Utc>) -> Result<u64>;
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Internal DB row type with String dates (compatible with sqlx Any backend)
#[derive(Debug, FromRow)]
struct AttributionRow {
    fingerprint: String,
    symbol: String,
    strategy: String,
    signals: String,
    confidence: f64,
    registered_at: String,
}

impl AttributionRow {
    fn into_attribution(self) -> Result<(String, Attribution)> {
        let signals: Vec<String> = serde_json::from_str(&self.signals)
            .with_context(|| format!("bad signal list for {}", self.fingerprint))?;
        let signals = signals
            .iter()
            .map(|s| s.parse::<SignalId>())
            .collect::<Result<Vec<_>, _>>()?;
        let strategy: Strategy = self.strategy.parse()?;

        Ok((
            self.fingerprint,
            Attribution {
                symbol: self.symbol,
                signals,
                strategy,
                confidence: self.confidence,
                registered_at: self
                    .registered_at
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
            },
        ))
    }
}

#[derive(Debug, FromRow)]
struct OutcomeRow {
    fingerprint: String,
    symbol: String,
    outcome: String,
    settled_at: Option<String>,
}

impl OutcomeRow {
    fn into_record(self) -> Result<OutcomeRecord> {
        let outcome: Settlement = self.outcome.parse()?;
        Ok(OutcomeRecord {
            symbol: self.symbol,
            fingerprint: self.fingerprint,
            outcome,
            settled_at: self
                .settled_at
                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        })
    }
}

/// Store for outcome history data
pub struct SqlOutcomeStore {
    pool: sqlx::AnyPool,
}

impl SqlOutcomeStore {
    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self { pool }
    }

    /// Create the history tables if they do not exist (called on startup)
    pub async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proposal_attributions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL UNIQUE,
                symbol TEXT NOT NULL,
                strategy TEXT NOT NULL,
                signals TEXT NOT NULL,
                confidence REAL NOT NULL,
                registered_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating proposal_attributions")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outcome_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL,
                symbol TEXT NOT NULL,
                outcome TEXT NOT NULL,
                settled_at TEXT,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("creating outcome_records")?;

        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for SqlOutcomeStore {
    async fn append_attribution(&self, fingerprint: &str, attribution: &Attribution) -> Result<()> {
        let signals: Vec<&str> = attribution.signals.iter().map(|s| s.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO proposal_attributions (
                fingerprint, symbol, strategy, signals, confidence, registered_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (fingerprint) DO NOTHING
            "#,
        )
        .bind(fingerprint)
        .bind(&attribution.symbol)
        .bind(attribution.strategy.as_str())
        .bind(serde_json::to_string(&signals)?)
        .bind(attribution.confidence)
        .bind(timestamp(attribution.registered_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_outcome(&self, record: &OutcomeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outcome_records (fingerprint, symbol, outcome, settled_at, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.fingerprint)
        .bind(&record.symbol)
        .bind(record.outcome.as_str())
        .bind(record.settled_at.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_attributions(&self) -> Result<Vec<(String, Attribution)>> {
        let rows: Vec<AttributionRow> = sqlx::query_as(
            r#"
            SELECT fingerprint, symbol, strategy, signals, confidence, registered_at
            FROM proposal_attributions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_attribution()).collect()
    }

    async fn load_outcomes(&self) -> Result<Vec<OutcomeRecord>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            r#"
            SELECT fingerprint, symbol, outcome, settled_at
            FROM outcome_records
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_record()).collect()
    }

    async fn prune_attributions(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM proposal_attributions
            WHERE registered_at < ?
              AND fingerprint NOT IN (SELECT fingerprint FROM outcome_records)
            "#,
        )
        .bind(timestamp(before))
        .execute(&self.pool)
        .await
        .context("pruning proposal_attributions")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{IngestStatus, OutcomeTracker};
    use decision_core::SuccessRates;

    async fn setup_store() -> SqlOutcomeStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory SQLite");
        let store = SqlOutcomeStore::new(pool);
        store.init_tables().await.unwrap();
        store
    }

    fn attribution(strategy: Strategy) -> Attribution {
        attribution_at(strategy, Utc::now())
    }

    fn attribution_at(strategy: Strategy, registered_at: DateTime<Utc>) -> Attribution {
        Attribution {
            symbol: "BANKNIFTY".to_string(),
            signals: vec![SignalId::PcrSentiment, SignalId::GammaRegime],
            strategy,
            confidence: 0.74,
            registered_at,
        }
    }

    fn record(fingerprint: &str, outcome: Settlement) -> OutcomeRecord {
        OutcomeRecord {
            symbol: "BANKNIFTY".to_string(),
            fingerprint: fingerprint.to_string(),
            outcome,
            settled_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_attribution_round_trip() {
        let store = setup_store().await;
        store
            .append_attribution("fp-1", &attribution(Strategy::DirectionalLong))
            .await
            .unwrap();
        // Second append of the same fingerprint is ignored
        store
            .append_attribution("fp-1", &attribution(Strategy::Straddle))
            .await
            .unwrap();

        let loaded = store.load_attributions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "fp-1");
        assert_eq!(loaded[0].1.strategy, Strategy::DirectionalLong);
        assert_eq!(
            loaded[0].1.signals,
            vec![SignalId::PcrSentiment, SignalId::GammaRegime]
        );
    }

    #[tokio::test]
    async fn test_outcomes_keep_append_order() {
        let store = setup_store().await;
        store.append_outcome(&record("a", Settlement::TargetHit)).await.unwrap();
        store.append_outcome(&record("b", Settlement::Expired)).await.unwrap();

        let loaded = store.load_outcomes().await.unwrap();
        let order: Vec<&str> = loaded.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(loaded[1].outcome, Settlement::Expired);
        assert!(loaded[0].settled_at.is_some());
    }

    #[tokio::test]
    async fn test_replay_rebuilds_statistics() {
        let store = setup_store().await;
        for i in 0..25 {
            let fp = format!("fp-{}", i);
            store
                .append_attribution(&fp, &attribution(Strategy::DirectionalLong))
                .await
                .unwrap();
            let outcome = if i < 20 {
                Settlement::TargetHit
            } else {
                Settlement::StopHit
            };
            store.append_outcome(&record(&fp, outcome)).await.unwrap();
        }
        // Duplicate and orphaned outcomes are tolerated
        store.append_outcome(&record("fp-0", Settlement::StopHit)).await.unwrap();
        store.append_outcome(&record("ghost", Settlement::TargetHit)).await.unwrap();

        let tracker = OutcomeTracker::default();
        let summary = tracker.replay(&store).await.unwrap();

        assert_eq!(summary.attributions, 25);
        assert_eq!(summary.outcomes, 25);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.orphaned, 1);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.signals[&SignalId::PcrSentiment].successes, 20);
        assert!(snapshot.signal_multiplier(SignalId::PcrSentiment) > 1.0);
        assert_eq!(
            tracker.ingest(&record("fp-3", Settlement::TargetHit)),
            Ok(IngestStatus::Duplicate)
        );
    }

    #[tokio::test]
    async fn test_prune_drops_only_stale_unsettled_attributions() {
        let store = setup_store().await;
        let now = Utc::now();
        let old = now - chrono::Duration::days(30);
        store
            .append_attribution("stale", &attribution_at(Strategy::IronCondor, old))
            .await
            .unwrap();
        store
            .append_attribution("settled", &attribution_at(Strategy::IronCondor, old))
            .await
            .unwrap();
        store.append_outcome(&record("settled", Settlement::StopHit)).await.unwrap();
        store
            .append_attribution("recent", &attribution_at(Strategy::IronCondor, now))
            .await
            .unwrap();

        let removed = store.prune_attributions(now - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);

        let kept: Vec<String> = store
            .load_attributions()
            .await
            .unwrap()
            .into_iter()
            .map(|(fp, _)| fp)
            .collect();
        assert_eq!(kept, vec!["settled".to_string(), "recent".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_counts_history_older_than_retention() {
        let store = setup_store().await;
        let start = Utc::now() - chrono::Duration::days(60);
        for i in 0..30 {
            let fp = format!("fp-{}", i);
            let at = start + chrono::Duration::days(i);
            store
                .append_attribution(&fp, &attribution_at(Strategy::Straddle, at))
                .await
                .unwrap();
            store.append_outcome(&record(&fp, Settlement::TargetHit)).await.unwrap();
        }

        let tracker = OutcomeTracker::default();
        let summary = tracker.replay(&store).await.unwrap();

        assert_eq!(summary.outcomes, 30);
        assert_eq!(summary.orphaned, 0);
        assert_eq!(tracker.snapshot().strategies[&Strategy::Straddle].attempts, 30);
        // Only the last week of attributions stays in memory
        assert!(tracker.retained() < 30);
    }
}
