pub mod config;
pub mod levels;
pub mod selector;
pub mod strikes;


pub use config::*;
pub use levels::*;
pub use selector::*;
pub use strikes::*;
