use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use decision_core::MetricsSnapshot;
use outcome_tracker::{IngestStatus, OutcomeStore, OutcomeTracker, SqlOutcomeStore};
use signal_orchestrator::PipelineCoordinator;
use tokio::io::{AsyncBufReadExt, AsyncWrite};

mod config;
mod io;
mod metrics;

use config::AgentConfig;
use metrics::PipelineMetrics;

/// Quiet period after which a partial batch is evaluated
const BATCH_WINDOW: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // Proposals go to stdout, logs to stderr
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting options signal agent");

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    let pipeline = config.pipeline_config();
    tracing::info!("Configuration loaded and validated");
    tracing::info!(
        "  Cooldown: {}s ({} overrides)",
        config.cooldown_seconds,
        config.cooldown_overrides.len()
    );
    tracing::info!("  Risk per trade: {}%", config.max_risk_per_trade_percent);
    tracing::info!("  Daily loss limit: {}%", config.max_daily_loss_percent);
    tracing::info!("  Min confidence: {:.0}%", config.min_confidence * 100.0);
    tracing::info!("  Min reward/risk: {}", config.min_risk_reward);
    tracing::info!(
        "  Evaluation budget: {}ms (max {} concurrent)",
        config.evaluation_timeout_ms,
        config.max_concurrent_evaluations
    );

    // 3. Rebuild outcome statistics from stored history
    let tracker = Arc::new(OutcomeTracker::new(pipeline.tracker.clone()));
    let store = match &config.database_url {
        Some(url) => {
            sqlx::any::install_default_drivers();
            let pool = sqlx::AnyPool::connect(url)
                .await
                .with_context(|| format!("connecting to {}", url))?;
            let store = SqlOutcomeStore::new(pool);
            store.init_tables().await?;
            let cutoff = Utc::now() - chrono::Duration::hours(config.attribution_retention_hours);
            let pruned = store.prune_attributions(cutoff).await?;
            if pruned > 0 {
                tracing::info!(pruned, "Dropped unsettled attributions past retention");
            }
            let summary = tracker.replay(&store).await?;
            if summary.orphaned > 0 {
                tracing::warn!("{} stored outcomes have no attribution", summary.orphaned);
            }
            Some(store)
        }
        None => {
            tracing::info!("No DATABASE_URL set, outcome history kept in memory only");
            None
        }
    };

    let mut agent_metrics = PipelineMetrics::new(config.metrics_log_interval);

    // 4. Settlements reported since the last run
    if let Some(path) = &config.outcomes_path {
        ingest_outcomes(path, &tracker, store.as_ref(), &mut agent_metrics).await?;
    }

    // 5. Coordinator
    let coordinator = Arc::new(PipelineCoordinator::with_tracker(
        pipeline,
        Arc::clone(&tracker),
    ));
    if let Some(pnl) = config.daily_pnl_percent {
        coordinator.record_daily_pnl(Utc::now().date_naive(), pnl);
    }

    // 6. Main loop with graceful shutdown
    let input = io::open_input(config.snapshot_path.as_deref()).await?;
    let mut lines = input.lines();
    let mut stdout = tokio::io::stdout();
    let mut batch: Vec<MetricsSnapshot> = Vec::new();
    let mut line_no = 0;

    tracing::info!(
        source = config.snapshot_path.as_deref().unwrap_or("stdin"),
        "Reading snapshots"
    );

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading snapshot input")? else {
                    break;
                };
                line_no += 1;
                let Some(snapshot) = io::parse_snapshot(&line, line_no) else {
                    if !line.trim().is_empty() {
                        agent_metrics.malformed_lines += 1;
                    }
                    continue;
                };

                // One snapshot per symbol per batch keeps per-symbol order
                let repeated = batch.iter().any(|s| s.symbol == snapshot.symbol);
                if repeated || batch.len() >= config.max_concurrent_evaluations {
                    let store = store.as_ref();
                    flush_batch(&coordinator, &mut batch, store, &mut agent_metrics, &mut stdout)
                        .await?;
                }
                batch.push(snapshot);
            }
            _ = tokio::time::sleep(BATCH_WINDOW), if !batch.is_empty() => {
                let store = store.as_ref();
                flush_batch(&coordinator, &mut batch, store, &mut agent_metrics, &mut stdout)
                    .await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    flush_batch(
        &coordinator,
        &mut batch,
        store.as_ref(),
        &mut agent_metrics,
        &mut stdout,
    )
    .await?;
    agent_metrics.log_metrics();

    let report = tracker.calibration_report();
    if report.sample_size > 0 {
        tracing::info!(
            samples = report.sample_size,
            hit_rate = format!("{:.1}%", report.hit_rate * 100.0),
            ece = format!("{:.3}", report.ece),
            brier = format!("{:.3}", report.brier_score),
            "Calibration: {}",
            report.assessment()
        );
        if report.is_overconfident() {
            tracing::warn!("High-confidence proposals settle below their issued confidence");
        } else if report.is_underconfident() {
            tracing::info!("High-confidence proposals settle above their issued confidence");
        }
    }
    tracing::info!(pending = tracker.pending(), "Signal agent stopped");
    Ok(())
}

async fn flush_batch<W: AsyncWrite + Unpin>(
    coordinator: &Arc<PipelineCoordinator>,
    batch: &mut Vec<MetricsSnapshot>,
    store: Option<&SqlOutcomeStore>,
    agent_metrics: &mut PipelineMetrics,
    out: &mut W,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let started = Instant::now();
    let proposals = coordinator.evaluate_many(std::mem::take(batch)).await;
    agent_metrics.record_batch(&proposals, started);

    if let Some(store) = store {
        for proposal in &proposals {
            let fingerprint = &proposal.fingerprint;
            let Some(attribution) = coordinator.tracker().attribution(fingerprint) else {
                continue;
            };
            if let Err(e) = store.append_attribution(fingerprint, &attribution).await {
                tracing::warn!(%fingerprint, "Failed to persist attribution: {:#}", e);
            }
        }
    }

    io::write_proposals(out, &proposals).await
}

async fn ingest_outcomes(
    path: &str,
    tracker: &OutcomeTracker,
    store: Option<&SqlOutcomeStore>,
    agent_metrics: &mut PipelineMetrics,
) -> Result<()> {
    let (records, malformed) = io::read_outcomes(path).await?;
    agent_metrics.outcomes_skipped += malformed;

    for record in &records {
        match tracker.ingest(record) {
            Ok(IngestStatus::Recorded) => {
                agent_metrics.outcomes_recorded += 1;
                if let Some(store) = store {
                    if let Err(e) = store.append_outcome(record).await {
                        tracing::warn!(
                            fingerprint = %record.fingerprint,
                            "Failed to persist outcome: {:#}",
                            e
                        );
                    }
                }
            }
            Ok(IngestStatus::Duplicate) => {
                tracing::debug!(fingerprint = %record.fingerprint, "Outcome already settled");
                agent_metrics.outcomes_skipped += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Outcome rejected");
                agent_metrics.outcomes_skipped += 1;
            }
        }
    }

    tracing::info!(
        path,
        recorded = agent_metrics.outcomes_recorded,
        skipped = agent_metrics.outcomes_skipped,
        "Outcomes ingested"
    );
    Ok(())
}
