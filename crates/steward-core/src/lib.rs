//! # steward-core
//!
//! Deterministic member lifecycle governance for mentorship programs - THE
//! LOGIC.
//!
//! Three engines share one participant record:
//! - `stage`: behavioral-adoption stages S0 → S5 with a rolling stability counter
//! - `promotion`: dual-track (points + growth) tier promotion L0 → L5
//! - `constraint`: violations, protection waivers, demotion, exit and recovery
//!
//! ## Architectural Constraints
//!
//! - Pure functions over explicitly passed state: no engine-side cache
//! - No wall-clock reads: every time-sensitive call takes `now`
//! - Closed enums for stages, tier pairs and violation kinds; unknown keys
//!   are configuration errors
//! - Integer arithmetic only
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod constraint;
pub mod engine;
pub mod formats;
pub mod primitives;
pub mod promotion;
pub mod providers;
pub mod stage;
pub mod state;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    ExitKind, ParticipantId, PointBalances, PointTrack, PreconditionFailure, Stage, StewardError,
    Tier, TierPair, ViolationKind,
};

pub use config::{
    CeremonySpec, GateMode, GovernanceConfig, PeerRequirement, PointPenalty, PromotionThreshold,
    ProtectionRules, StabilityRules, StageRules, ViolationPolicy,
};
pub use state::{
    AppliedPenalty, ExitRecord, ObservationPeriod, ParticipantLifecycleState, ResolutionStatus,
    ViolationRecord,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use constraint::{
    ConstraintEngine, Demotion, ExitEngine, RECOVERY_STEPS, RecoveryOutcome, ReevaluationOutcome,
    ReinstatementOutcome, ReviewOutcome, ViolationOutcome,
};
pub use engine::GovernanceEngine;
pub use promotion::{
    AdvisoryGate, CeremonyOutcome, DualTrackResult, Gap, GapAnalyzer, GapCategory, GapReport,
    GrowthResult, MandatoryGate, PointsGate, PointsResult, ProgressionState, PromotionEngine,
    PromotionOrchestrator,
};
pub use providers::{
    CapabilityProvider, Collaborators, CompanionProvider, CompanionSummary, ExamProvider,
    FactSource, ParticipantFacts, PointsBalanceProvider, PromotionFacts, StaticFacts,
};
pub use stage::{
    DisplayPermissions, InfoCategory, StabilityWindow, StageEngine, StageEvaluation, StageMetrics,
    StageOutcome, StageProgress, StageReason, get_display_permissions,
};

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

#[cfg(feature = "crypto-hash")]
pub use formats::state_crypto_hash;
pub use formats::{PersistenceHeader, state_checksum, state_from_bytes, state_to_bytes};
pub use storage::{MemoryStore, ParticipantStore, RedbStore};
