//! Outcome Tracker
//!
//! Pairs settled outcomes with the signals and strategy that produced each
//! proposal, and turns the resulting success rates into bounded confidence
//! multipliers for the next evaluations.

pub mod calibration;
pub mod history;
pub mod tracker;

pub use calibration::{BucketStats, CalibrationReport};
pub use history::{OutcomeStore, SqlOutcomeStore};
pub use tracker::{
    Attribution, IngestStatus, OutcomeTracker, ReplaySummary, SuccessSnapshot, SuccessStats,
    TrackerConfig, TrackerError,
};
