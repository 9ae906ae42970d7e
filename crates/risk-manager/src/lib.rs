pub mod gate;
pub mod models;

pub use gate::RiskGate;
pub use models::*;
