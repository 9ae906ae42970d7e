pub mod config;
pub mod cooldown;
pub mod coordinator;
pub mod explanation;
pub mod fingerprint;


pub use config::PipelineConfig;
pub use cooldown::{CooldownBook, CooldownSlot};
pub use coordinator::PipelineCoordinator;
pub use explanation::ExplanationComposer;
pub use fingerprint::proposal_fingerprint;
