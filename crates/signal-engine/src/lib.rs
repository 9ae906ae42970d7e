pub mod config;
pub mod derivation;

#[cfg(test)]
mod derivation_tests;

pub use config::*;
pub use derivation::*;
