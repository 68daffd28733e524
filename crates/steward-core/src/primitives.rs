//! # Innate Primitives
//!
//! Hardcoded constants that are part of the engine's contract rather than
//! its configuration. Tunable values (point minimums, penalties, windows)
//! live in [`crate::config::GovernanceConfig::builtin`].

/// Magic bytes for the Steward participant snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"STWD";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum length of a participant identifier.
pub const MAX_PARTICIPANT_ID_LENGTH: usize = 128;

/// Maximum length of a free-text description or reason.
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

/// Longest configurable window (protection, observation, appeal), in days.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Longest configurable recovery window, in months.
pub const MAX_RECOVERY_MONTHS: u32 = 1_200;
