//! # Core Type Definitions
//!
//! This module contains the closed vocabularies the governance engine works with:
//! - Participant identifiers (`ParticipantId`)
//! - Behavioral-adoption stages (`Stage`) and mentorship tiers (`Tier`, `TierPair`)
//! - Point balances (`PointBalances`, `PointTrack`)
//! - Violation and exit kinds (`ViolationKind`, `ExitKind`)
//! - Error types (`StewardError`) and precondition failures (`PreconditionFailure`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for counters to prevent overflow

use crate::primitives::MAX_PARTICIPANT_ID_LENGTH;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// PARTICIPANT IDENTIFIER
// =============================================================================

/// Opaque identifier of a program participant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create a new identifier without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an identifier, rejecting empty or oversized input.
    pub fn parse(id: &str) -> Result<Self, StewardError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(StewardError::InvalidInput(
                "Participant id must not be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_PARTICIPANT_ID_LENGTH {
            return Err(StewardError::InvalidInput(format!(
                "Participant id length {} exceeds maximum {} bytes",
                trimmed.len(),
                MAX_PARTICIPANT_ID_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// STAGE
// =============================================================================

/// Behavioral-adoption stages, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// S0: Authorization
    S0,
    /// S1: Awareness
    S1,
    /// S2: Trial
    S2,
    /// S3: Pathway
    S3,
    /// S4: Internalization
    S4,
    /// S5: Graduation
    S5,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Stage; 6] = [
        Stage::S0,
        Stage::S1,
        Stage::S2,
        Stage::S3,
        Stage::S4,
        Stage::S5,
    ];

    /// Get the stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::S0 => "Authorization",
            Stage::S1 => "Awareness",
            Stage::S2 => "Trial",
            Stage::S3 => "Pathway",
            Stage::S4 => "Internalization",
            Stage::S5 => "Graduation",
        }
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::S0 => Some(Stage::S1),
            Stage::S1 => Some(Stage::S2),
            Stage::S2 => Some(Stage::S3),
            Stage::S3 => Some(Stage::S4),
            Stage::S4 => Some(Stage::S5),
            Stage::S5 => None,
        }
    }

    /// Check if this stage is terminal (S5).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::S5)
    }

    /// Check whether moving from `from` to `to` is a legal stage move.
    ///
    /// Legal moves: hold, advance by exactly one, and the single S3 → S2 regression.
    #[must_use]
    pub fn is_legal_move(from: Stage, to: Stage) -> bool {
        from == to || from.next() == Some(to) || (from == Stage::S3 && to == Stage::S2)
    }

    /// Parse the short code ("S0".."S5").
    pub fn from_code(code: &str) -> Option<Stage> {
        match code.trim().to_ascii_uppercase().as_str() {
            "S0" => Some(Stage::S0),
            "S1" => Some(Stage::S1),
            "S2" => Some(Stage::S2),
            "S3" => Some(Stage::S3),
            "S4" => Some(Stage::S4),
            "S5" => Some(Stage::S5),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self, self.name())
    }
}

// =============================================================================
// TIER
// =============================================================================

/// Mentorship tier.
///
/// `Removed` is the terminal marker set by an ethics-redline exit. It orders
/// below `L0` so that no comparison can mistake a removed participant for a
/// senior one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Removed,
    L0,
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl Tier {
    /// Numeric level, `None` for `Removed`.
    #[must_use]
    pub fn level(&self) -> Option<u8> {
        match self {
            Tier::Removed => None,
            Tier::L0 => Some(0),
            Tier::L1 => Some(1),
            Tier::L2 => Some(2),
            Tier::L3 => Some(3),
            Tier::L4 => Some(4),
            Tier::L5 => Some(5),
        }
    }

    /// Next tier, `None` at L5 and for `Removed`.
    #[must_use]
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Removed | Tier::L5 => None,
            Tier::L0 => Some(Tier::L1),
            Tier::L1 => Some(Tier::L2),
            Tier::L2 => Some(Tier::L3),
            Tier::L3 => Some(Tier::L4),
            Tier::L4 => Some(Tier::L5),
        }
    }

    /// Previous tier, `None` at L0 and for `Removed`.
    #[must_use]
    pub fn previous(&self) -> Option<Tier> {
        match self {
            Tier::Removed | Tier::L0 => None,
            Tier::L1 => Some(Tier::L0),
            Tier::L2 => Some(Tier::L1),
            Tier::L3 => Some(Tier::L2),
            Tier::L4 => Some(Tier::L3),
            Tier::L5 => Some(Tier::L4),
        }
    }

    /// Check if this is the highest tier.
    #[must_use]
    pub fn is_max(&self) -> bool {
        matches!(self, Tier::L5)
    }

    /// Parse "L0".."L5" (or "removed").
    pub fn from_code(code: &str) -> Option<Tier> {
        match code.trim().to_ascii_uppercase().as_str() {
            "L0" => Some(Tier::L0),
            "L1" => Some(Tier::L1),
            "L2" => Some(Tier::L2),
            "L3" => Some(Tier::L3),
            "L4" => Some(Tier::L4),
            "L5" => Some(Tier::L5),
            "REMOVED" => Some(Tier::Removed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Removed => f.write_str("removed"),
            other => write!(f, "{:?}", other),
        }
    }
}

// =============================================================================
// TIER PAIR
// =============================================================================

/// A promotion step between two adjacent tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TierPair {
    #[serde(rename = "L0_L1")]
    L0L1,
    #[serde(rename = "L1_L2")]
    L1L2,
    #[serde(rename = "L2_L3")]
    L2L3,
    #[serde(rename = "L3_L4")]
    L3L4,
    #[serde(rename = "L4_L5")]
    L4L5,
}

impl TierPair {
    /// All tier pairs in promotion order.
    pub const ALL: [TierPair; 5] = [
        TierPair::L0L1,
        TierPair::L1L2,
        TierPair::L2L3,
        TierPair::L3L4,
        TierPair::L4L5,
    ];

    /// Configuration key ("L0_L1" ...).
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            TierPair::L0L1 => "L0_L1",
            TierPair::L1L2 => "L1_L2",
            TierPair::L2L3 => "L2_L3",
            TierPair::L3L4 => "L3_L4",
            TierPair::L4L5 => "L4_L5",
        }
    }

    /// Resolve a configuration key. Unknown keys are configuration errors.
    pub fn from_key(key: &str) -> Result<TierPair, StewardError> {
        let normalized = key.trim().to_ascii_uppercase().replace(['-', '>'], "_");
        TierPair::ALL
            .into_iter()
            .find(|pair| pair.key() == normalized)
            .ok_or_else(|| StewardError::UnknownTierPair(key.to_string()))
    }

    /// The pair that promotes out of `tier`, if any.
    #[must_use]
    pub fn starting_at(tier: Tier) -> Option<TierPair> {
        match tier {
            Tier::L0 => Some(TierPair::L0L1),
            Tier::L1 => Some(TierPair::L1L2),
            Tier::L2 => Some(TierPair::L2L3),
            Tier::L3 => Some(TierPair::L3L4),
            Tier::L4 => Some(TierPair::L4L5),
            Tier::L5 | Tier::Removed => None,
        }
    }

    #[must_use]
    pub fn from_tier(&self) -> Tier {
        match self {
            TierPair::L0L1 => Tier::L0,
            TierPair::L1L2 => Tier::L1,
            TierPair::L2L3 => Tier::L2,
            TierPair::L3L4 => Tier::L3,
            TierPair::L4L5 => Tier::L4,
        }
    }

    #[must_use]
    pub fn to_tier(&self) -> Tier {
        match self {
            TierPair::L0L1 => Tier::L1,
            TierPair::L1L2 => Tier::L2,
            TierPair::L2L3 => Tier::L3,
            TierPair::L3L4 => Tier::L4,
            TierPair::L4L5 => Tier::L5,
        }
    }
}

impl std::fmt::Display for TierPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from_tier(), self.to_tier())
    }
}

// =============================================================================
// POINTS
// =============================================================================

/// The three independent point counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointTrack {
    Growth,
    Contribution,
    Influence,
}

impl PointTrack {
    pub const ALL: [PointTrack; 3] = [
        PointTrack::Growth,
        PointTrack::Contribution,
        PointTrack::Influence,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PointTrack::Growth => "growth",
            PointTrack::Contribution => "contribution",
            PointTrack::Influence => "influence",
        }
    }
}

/// Growth, contribution and influence balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointBalances {
    pub growth: u64,
    pub contribution: u64,
    pub influence: u64,
}

impl PointBalances {
    #[must_use]
    pub const fn new(growth: u64, contribution: u64, influence: u64) -> Self {
        Self {
            growth,
            contribution,
            influence,
        }
    }

    /// Balance of a single counter.
    #[must_use]
    pub fn get(&self, track: PointTrack) -> u64 {
        match track {
            PointTrack::Growth => self.growth,
            PointTrack::Contribution => self.contribution,
            PointTrack::Influence => self.influence,
        }
    }

    /// Deduct up to `amount` from one counter, returning what was actually deducted.
    pub fn deduct(&mut self, track: PointTrack, amount: u64) -> u64 {
        let slot = self.slot_mut(track);
        let taken = amount.min(*slot);
        *slot = slot.saturating_sub(taken);
        taken
    }

    /// Credit one counter with saturating addition.
    pub fn credit(&mut self, track: PointTrack, amount: u64) {
        let slot = self.slot_mut(track);
        *slot = slot.saturating_add(amount);
    }

    /// Reset all counters to zero.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Sum of all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.growth
            .saturating_add(self.contribution)
            .saturating_add(self.influence)
    }

    fn slot_mut(&mut self, track: PointTrack) -> &mut u64 {
        match track {
            PointTrack::Growth => &mut self.growth,
            PointTrack::Contribution => &mut self.contribution,
            PointTrack::Influence => &mut self.influence,
        }
    }
}

// =============================================================================
// VIOLATION & EXIT KINDS
// =============================================================================

/// The five violation severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MinorComplaint,
    FirstOverreach,
    SecondOverreach,
    EthicsRedline,
    KpiUnderperformance,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::MinorComplaint,
        ViolationKind::FirstOverreach,
        ViolationKind::SecondOverreach,
        ViolationKind::EthicsRedline,
        ViolationKind::KpiUnderperformance,
    ];

    /// Configuration key.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            ViolationKind::MinorComplaint => "minor_complaint",
            ViolationKind::FirstOverreach => "first_overreach",
            ViolationKind::SecondOverreach => "second_overreach",
            ViolationKind::EthicsRedline => "ethics_redline",
            ViolationKind::KpiUnderperformance => "kpi_underperformance",
        }
    }

    /// Resolve a configuration key. Unknown keys are configuration errors.
    pub fn from_key(key: &str) -> Result<ViolationKind, StewardError> {
        let normalized = key.trim().to_ascii_lowercase().replace('-', "_");
        ViolationKind::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .ok_or_else(|| StewardError::UnknownViolationKind(key.to_string()))
    }

    /// Check if this kind always ends in a forced exit.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ViolationKind::EthicsRedline)
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// How a participant left the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    Voluntary,
    Forced,
}

impl ExitKind {
    pub fn from_key(key: &str) -> Option<ExitKind> {
        match key.trim().to_ascii_lowercase().as_str() {
            "voluntary" => Some(ExitKind::Voluntary),
            "forced" => Some(ExitKind::Forced),
            _ => None,
        }
    }
}

// =============================================================================
// PRECONDITION FAILURES
// =============================================================================

/// Caller-recoverable precondition failures, reported as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionFailure {
    /// Ceremony requested while the evaluation is not READY_TO_PROMOTE.
    NotReadyToPromote,
    /// Ceremony requested from the highest tier.
    MaximumTierReached,
    /// Ceremony requested for a tier the participant does not hold.
    TierMismatch,
    /// Participant has been removed from the program.
    ParticipantRemoved,
    /// Participant has exited and not been reinstated.
    ParticipantExited,
    /// Recovery requested without an exit record.
    NoExitRecord,
    /// Recovery requested for an exit type that does not allow it.
    ExitNotRecoverable,
    /// Recovery window has elapsed.
    RecoveryWindowExpired,
    /// Participant was already reinstated.
    AlreadyReinstated,
    /// Violation id not present in the history.
    UnknownViolation,
    /// Violation is not open for appeal or resolution.
    ViolationNotOpen,
    /// Appeal filed after the appeal deadline.
    AppealWindowClosed,
    /// Re-evaluation requested without an active observation window.
    NoActiveObservation,
    /// Re-evaluation did not pass.
    ReevaluationFailed,
}

impl PreconditionFailure {
    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotReadyToPromote => "promotion requires the READY_TO_PROMOTE state",
            Self::MaximumTierReached => "participant already holds the highest tier",
            Self::TierMismatch => "participant does not currently hold the requested tier",
            Self::ParticipantRemoved => "participant has been removed from the program",
            Self::ParticipantExited => "participant has exited the program",
            Self::NoExitRecord => "no exit record exists for this participant",
            Self::ExitNotRecoverable => "this exit type does not permit recovery",
            Self::RecoveryWindowExpired => "the recovery window has elapsed",
            Self::AlreadyReinstated => "participant has already been reinstated",
            Self::UnknownViolation => "no violation with this id is on record",
            Self::ViolationNotOpen => "violation is not open",
            Self::AppealWindowClosed => "the appeal deadline has passed",
            Self::NoActiveObservation => "no observation period is active",
            Self::ReevaluationFailed => "capability re-evaluation was not passed",
        }
    }
}

impl std::fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Steward engine.
///
/// - Configuration errors are fatal and must not be retried
/// - Precondition failures are NOT errors; they travel as data in results
/// - The engine should never panic; all errors are returned
#[derive(Debug, Error)]
pub enum StewardError {
    /// A tier-pair key that names no known promotion step.
    #[error("Unknown tier pair: {0}")]
    UnknownTierPair(String),

    /// A violation key that names no known violation kind.
    #[error("Unknown violation kind: {0}")]
    UnknownViolationKind(String),

    /// The loaded configuration has no threshold for this tier pair.
    #[error("No promotion threshold configured for {0:?}")]
    MissingThreshold(TierPair),

    /// The loaded configuration has no policy for this violation kind.
    #[error("No violation policy configured for {0}")]
    MissingPolicy(ViolationKind),

    /// The configuration could not be parsed or is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stage or tier move outside the sanctioned paths (logic defect).
    #[error("Domain invariant breach: {0}")]
    InvariantBreach(String),

    /// An external collaborator failed to answer.
    #[error("Provider error: {0}")]
    Provider(String),

    /// No state is stored for this participant.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    /// Caller-supplied input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Enrollment attempted for an existing participant.
    #[error("Participant already enrolled: {0}")]
    AlreadyEnrolled(ParticipantId),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl StewardError {
    /// Check if this error indicates a deployment/configuration defect.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTierPair(_)
                | Self::UnknownViolationKind(_)
                | Self::MissingThreshold(_)
                | Self::MissingPolicy(_)
                | Self::InvalidConfig(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
