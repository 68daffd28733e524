//! # Steward Application Library
//!
//! HTTP API and CLI surfaces over `steward-core`. Exposed as a library so
//! the integration tests can build the router directly.

pub mod api;
pub mod cli;
