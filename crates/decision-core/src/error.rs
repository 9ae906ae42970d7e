use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage names, used to tag faults and fail-safe proposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    SignalDerivation,
    RegimeClassifier,
    StrategySelector,
    LevelCalculator,
    RiskGate,
    ExplanationComposer,
    Coordinator,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::SignalDerivation => "signal_derivation",
            Stage::RegimeClassifier => "regime_classifier",
            Stage::StrategySelector => "strategy_selector",
            Stage::LevelCalculator => "level_calculator",
            Stage::RiskGate => "risk_gate",
            Stage::ExplanationComposer => "explanation_composer",
            Stage::Coordinator => "coordinator",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Stage fault in {stage}: {message}")]
    StageFault { stage: Stage, message: String },
}

impl DecisionError {
    pub fn fault(stage: Stage, message: impl Into<String>) -> Self {
        DecisionError::StageFault {
            stage,
            message: message.into(),
        }
    }

    /// Stage the error originated in. Input errors belong to ingress validation.
    pub fn stage(&self) -> Stage {
        match self {
            DecisionError::InvalidInput(_) => Stage::Validation,
            DecisionError::StageFault { stage, .. } => *stage,
        }
    }
}
