use crate::{SignalId, Strategy};

/// Read side of the outcome feedback loop. Stages hold this by reference and
/// never see how the multipliers were produced.
pub trait SuccessRates: Send + Sync {
    /// Magnitude multiplier for a signal, 1.0 when history is insufficient
    fn signal_multiplier(&self, id: SignalId) -> f64;

    /// Confidence multiplier for a strategy, 1.0 when history is insufficient
    fn strategy_multiplier(&self, strategy: Strategy) -> f64;
}

/// Neutral rates, used before any outcome has been recorded
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl SuccessRates for NoHistory {
    fn signal_multiplier(&self, _id: SignalId) -> f64 {
        1.0
    }

    fn strategy_multiplier(&self, _strategy: Strategy) -> f64 {
        1.0
    }
}
