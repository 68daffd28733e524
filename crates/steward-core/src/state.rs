//! # Participant Lifecycle State
//!
//! The single mutable record the engine owns. It is created at enrollment,
//! passed into every operation and returned updated; it is never deleted,
//! only marked exited.
//!
//! The record is persisted with `postcard`, so it uses no internally tagged
//! enums and no `skip_serializing_if` attributes.

use crate::types::{
    ExitKind, ParticipantId, PointBalances, Stage, StewardError, Tier, ViolationKind,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// VIOLATION RECORD
// =============================================================================

/// Resolution status of a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Recorded, appeal window may still be open.
    Open,
    /// Appeal filed, awaiting the reviewer.
    Appealed,
    /// Reviewer confirmed the violation.
    Upheld,
    /// Reviewer overturned the violation; deducted points were refunded.
    Overturned,
}

impl ResolutionStatus {
    /// Unresolved records count toward the "first unresolved violation" rule.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Open | Self::Appealed)
    }
}

/// Points actually taken by a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppliedPenalty {
    /// Points removed, per counter.
    pub deducted: PointBalances,
    /// Every balance was cleared.
    pub cleared: bool,
    /// The policy penalty was waived by the protection period.
    pub waived: bool,
}

impl AppliedPenalty {
    /// Total points removed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.deducted.total()
    }
}

/// One entry of the append-only violation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub id: String,
    pub kind: ViolationKind,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub penalty: AppliedPenalty,
    pub action_taken: String,
    pub appeal_deadline: DateTime<Utc>,
    pub reviewer: String,
    pub resolution: ResolutionStatus,
}

// =============================================================================
// EXIT RECORD
// =============================================================================

/// Record of a participant leaving the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub kind: ExitKind,
    pub reason: String,
    pub exited_at: DateTime<Utc>,
    /// Balances held at exit (frozen for voluntary exits, cleared for forced).
    pub points_at_exit: PointBalances,
    pub points_frozen: bool,
    pub points_cleared: bool,
    /// Tier held when the participant left.
    pub tier_at_exit: Tier,
    pub recovery_eligible: bool,
    pub recovery_deadline: Option<DateTime<Utc>>,
    pub reinstated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// OBSERVATION PERIOD
// =============================================================================

/// Window opened by a second-overreach demotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationPeriod {
    pub demoted_from: Tier,
    pub demoted_to: Tier,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl ObservationPeriod {
    /// Check if the window is open at `now` (end inclusive).
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.started_at && now <= self.ends_at
    }
}

// =============================================================================
// PARTICIPANT LIFECYCLE STATE
// =============================================================================

/// Lifecycle state of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantLifecycleState {
    pub participant_id: ParticipantId,
    pub enrolled_at: DateTime<Utc>,

    pub current_stage: Stage,
    pub stage_entered_at: DateTime<Utc>,
    /// Unbroken run of passing stability windows.
    pub stability_counter_days: u32,
    pub graduated_at: Option<DateTime<Utc>>,

    pub current_tier: Tier,
    pub tier_entered_at: DateTime<Utc>,

    pub points: PointBalances,
    pub points_frozen: bool,

    /// First violations inside this window may be waived.
    pub protection_until: Option<DateTime<Utc>>,
    pub observation: Option<ObservationPeriod>,
    pub supervision_until: Option<DateTime<Utc>>,

    pub violation_history: Vec<ViolationRecord>,
    pub exit_record: Option<ExitRecord>,
}

impl ParticipantLifecycleState {
    /// Create the enrollment state: S0, L0, zero points.
    #[must_use]
    pub fn enroll(participant_id: ParticipantId, now: DateTime<Utc>) -> Self {
        Self {
            participant_id,
            enrolled_at: now,
            current_stage: Stage::S0,
            stage_entered_at: now,
            stability_counter_days: 0,
            graduated_at: None,
            current_tier: Tier::L0,
            tier_entered_at: now,
            points: PointBalances::default(),
            points_frozen: false,
            protection_until: None,
            observation: None,
            supervision_until: None,
            violation_history: Vec::new(),
            exit_record: None,
        }
    }

    /// Whole days spent in the current stage.
    #[must_use]
    pub fn days_in_stage(&self, now: DateTime<Utc>) -> u32 {
        whole_days_between(self.stage_entered_at, now)
    }

    /// Whole days spent in the current tier.
    #[must_use]
    pub fn days_in_tier(&self, now: DateTime<Utc>) -> u32 {
        whole_days_between(self.tier_entered_at, now)
    }

    /// Check if the participant has graduated from S5.
    #[must_use]
    pub fn is_graduated(&self) -> bool {
        self.graduated_at.is_some()
    }

    /// Check if the participant is currently outside the program.
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.exit_record
            .as_ref()
            .is_some_and(|exit| exit.reinstated_at.is_none())
    }

    /// Check if the participant carries the terminal removed marker.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.current_tier == Tier::Removed
    }

    /// Check if the protection window is open at `now`.
    #[must_use]
    pub fn is_protected(&self, now: DateTime<Utc>) -> bool {
        self.protection_until.is_some_and(|until| now < until)
    }

    /// Number of violations not yet upheld or overturned.
    #[must_use]
    pub fn unresolved_violations(&self) -> usize {
        self.violation_history
            .iter()
            .filter(|v| v.resolution.is_unresolved())
            .count()
    }

    /// Find a violation by id.
    #[must_use]
    pub fn violation(&self, id: &str) -> Option<&ViolationRecord> {
        self.violation_history.iter().find(|v| v.id == id)
    }

    /// Check whether a violation of `kind` is on record.
    #[must_use]
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violation_history.iter().any(|v| v.kind == kind)
    }

    /// Next sequential violation id.
    #[must_use]
    pub fn next_violation_id(&self) -> String {
        format!("V-{:04}", self.violation_history.len().saturating_add(1))
    }
}

/// Whole days from `start` to `now`, zero when `now` precedes `start`.
#[must_use]
pub fn whole_days_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (now - start).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// End of a configured window of `days` starting at `start`.
///
/// A window that leaves the representable calendar is a configuration error.
pub fn add_days(start: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, StewardError> {
    start
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            StewardError::InvalidConfig(format!(
                "window of {} days after {} is out of range",
                days, start
            ))
        })
}

// =============================================================================
// TESTS
// =============================================================================
