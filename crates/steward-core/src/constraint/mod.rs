//! # Constraint Module
//!
//! Violation policies, protection waivers, demotion with observation, and
//! exit/recovery processing.

mod exit;
mod violation;

pub use exit::*;
pub use violation::*;
