//! # Formats Module
//!
//! Byte-level framing for persisted participant state. File I/O lives in the
//! storage backends and the app layer.

mod persistence;

pub use persistence::*;
