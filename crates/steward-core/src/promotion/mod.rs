//! # Promotion Module
//!
//! Dual-track tier promotion: points gate strategies, the composite growth
//! track, progression state, gap reports and the promotion ceremony.

mod ceremony;
mod engine;
mod gap;
mod gate;
mod growth;

pub use ceremony::*;
pub use engine::*;
pub use gap::*;
pub use gate::*;
pub use growth::*;
