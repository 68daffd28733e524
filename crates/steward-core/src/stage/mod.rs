//! # Stage Module
//!
//! Behavioral-adoption stage engine and stage-gated display permissions.

mod display;
mod engine;

pub use display::*;
pub use engine::*;
