use std::collections::HashMap;
use std::env;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signal_orchestrator::PipelineConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // Coordinator
    pub cooldown_seconds: u64,                   // 3
    pub cooldown_overrides: HashMap<String, u64>, // SYMBOL=secs,...
    pub evaluation_timeout_ms: u64,              // 250
    pub max_concurrent_evaluations: usize,       // 8

    // Risk gate
    pub max_risk_per_trade_percent: f64, // 2%
    pub max_daily_loss_percent: f64,     // 5%
    pub min_confidence: f64,             // 0.60
    pub min_liquidity: f64,              // 500 contracts
    pub daily_pnl_percent: Option<f64>,  // realized P&L for today, if known

    // Levels
    pub min_risk_reward: Decimal, // 2.0
    pub strike_step: Decimal,     // 50

    // I/O
    pub snapshot_path: Option<String>, // stdin when unset
    pub outcomes_path: Option<String>,
    pub database_url: Option<String>,

    // Outcome history
    pub attribution_retention_hours: i64, // 168
    pub max_attributions: usize,          // 10000

    // Telemetry
    pub metrics_log_interval: u64, // evaluations between summaries
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            cooldown_seconds: env::var("COOLDOWN_SECONDS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("COOLDOWN_SECONDS")?,
            cooldown_overrides: parse_overrides(
                &env::var("COOLDOWN_OVERRIDES").unwrap_or_default(),
            )?,
            evaluation_timeout_ms: env::var("EVALUATION_TIMEOUT_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .context("EVALUATION_TIMEOUT_MS")?,
            max_concurrent_evaluations: env::var("MAX_CONCURRENT_EVALUATIONS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .context("MAX_CONCURRENT_EVALUATIONS")?,

            max_risk_per_trade_percent: env::var("MAX_RISK_PER_TRADE")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse()
                .context("MAX_RISK_PER_TRADE")?,
            max_daily_loss_percent: env::var("MAX_DAILY_LOSS")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()
                .context("MAX_DAILY_LOSS")?,
            min_confidence: env::var("MIN_CONFIDENCE")
                .unwrap_or_else(|_| "0.60".to_string())
                .parse()
                .context("MIN_CONFIDENCE")?,
            min_liquidity: env::var("MIN_LIQUIDITY")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("MIN_LIQUIDITY")?,
            daily_pnl_percent: env::var("DAILY_PNL_PERCENT")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("DAILY_PNL_PERCENT")?,

            min_risk_reward: env::var("MIN_RISK_REWARD")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse()
                .context("MIN_RISK_REWARD")?,
            strike_step: env::var("STRIKE_STEP")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("STRIKE_STEP")?,

            snapshot_path: env::var("SNAPSHOT_PATH").ok().filter(|s| !s.is_empty()),
            outcomes_path: env::var("OUTCOMES_PATH").ok().filter(|s| !s.is_empty()),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),

            attribution_retention_hours: env::var("ATTRIBUTION_RETENTION_HOURS")
                .unwrap_or_else(|_| "168".to_string())
                .parse()
                .context("ATTRIBUTION_RETENTION_HOURS")?,
            max_attributions: env::var("MAX_ATTRIBUTIONS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("MAX_ATTRIBUTIONS")?,

            metrics_log_interval: env::var("METRICS_LOG_INTERVAL")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("METRICS_LOG_INTERVAL")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!("MIN_CONFIDENCE must be within [0, 1], got {}", self.min_confidence);
        }
        if self.strike_step <= Decimal::ZERO {
            bail!("STRIKE_STEP must be positive, got {}", self.strike_step);
        }
        if self.min_risk_reward <= Decimal::ZERO {
            bail!("MIN_RISK_REWARD must be positive, got {}", self.min_risk_reward);
        }
        if self.max_concurrent_evaluations == 0 {
            bail!("MAX_CONCURRENT_EVALUATIONS must be at least 1");
        }
        if self.attribution_retention_hours <= 0 {
            bail!(
                "ATTRIBUTION_RETENTION_HOURS must be positive, got {}",
                self.attribution_retention_hours
            );
        }
        if self.max_attributions == 0 {
            bail!("MAX_ATTRIBUTIONS must be at least 1");
        }
        Ok(())
    }

    /// Pipeline configuration with the environment overrides applied
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut pipeline = PipelineConfig {
            cooldown_secs: self.cooldown_seconds,
            cooldown_overrides: self.cooldown_overrides.clone(),
            evaluation_timeout_ms: self.evaluation_timeout_ms,
            max_concurrent_evaluations: self.max_concurrent_evaluations,
            ..PipelineConfig::default()
        };
        pipeline.risk.max_risk_per_trade_percent = self.max_risk_per_trade_percent;
        pipeline.risk.daily_loss_limit_percent = self.max_daily_loss_percent;
        pipeline.risk.min_confidence_threshold = self.min_confidence;
        pipeline.risk.min_liquidity = self.min_liquidity;
        pipeline.levels.min_risk_reward = self.min_risk_reward;
        pipeline.levels.strike_step = self.strike_step;
        pipeline.tracker.retention_hours = self.attribution_retention_hours;
        pipeline.tracker.max_attributions = self.max_attributions;
        pipeline
    }
}

/// Parse `NIFTY=5,BANKNIFTY=10` into per-symbol cooldown seconds
fn parse_overrides(raw: &str) -> Result<HashMap<String, u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, secs) = entry.split_once('=').with_context(|| {
                format!("COOLDOWN_OVERRIDES entry '{}' is not SYMBOL=SECONDS", entry)
            })?;
            let secs = secs
                .trim()
                .parse()
                .with_context(|| format!("bad cooldown for {}", symbol.trim()))?;
            Ok((symbol.trim().to_string(), secs))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_overrides() {
        let overrides = parse_overrides(" NIFTY=5, BANKNIFTY = 10 ,").unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides["NIFTY"], 5);
        assert_eq!(overrides["BANKNIFTY"], 10);

        assert!(parse_overrides("").unwrap().is_empty());
        assert!(parse_overrides("NIFTY").is_err());
        assert!(parse_overrides("NIFTY=soon").is_err());
    }

    #[test]
    fn test_pipeline_config_carries_overrides() {
        let config = AgentConfig {
            cooldown_seconds: 9,
            cooldown_overrides: HashMap::from([("NIFTY".to_string(), 1)]),
            evaluation_timeout_ms: 100,
            max_concurrent_evaluations: 2,
            max_risk_per_trade_percent: 1.5,
            max_daily_loss_percent: 3.0,
            min_confidence: 0.7,
            min_liquidity: 1000.0,
            daily_pnl_percent: None,
            min_risk_reward: dec!(2.5),
            strike_step: dec!(100),
            snapshot_path: None,
            outcomes_path: None,
            database_url: None,
            attribution_retention_hours: 24,
            max_attributions: 500,
            metrics_log_interval: 10,
        };
        assert!(config.validate().is_ok());

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.cooldown_for("NIFTY"), chrono::Duration::seconds(1));
        assert_eq!(pipeline.cooldown_for("BANKNIFTY"), chrono::Duration::seconds(9));
        assert_eq!(pipeline.risk.min_confidence_threshold, 0.7);
        assert_eq!(pipeline.levels.strike_step, dec!(100));
        assert_eq!(pipeline.levels.min_risk_reward, dec!(2.5));
        assert_eq!(pipeline.max_reasons, 5);
        assert_eq!(pipeline.tracker.retention_hours, 24);
        assert_eq!(pipeline.tracker.max_attributions, 500);
    }
}
