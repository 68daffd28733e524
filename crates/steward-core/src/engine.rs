//! # Governance Engine
//!
//! Single entry point over the stage, promotion and constraint engines,
//! bound to one shared configuration.
//!
//! The engine holds no participant state. Every operation takes the state
//! explicitly and, where it changes it, mutates it in place; callers persist
//! the result. Time-sensitive operations take the evaluation time `now`.
//!
//! Operations on the same participant must be serialized by the caller for
//! the whole read → evaluate → write sequence.

use crate::config::GovernanceConfig;
use crate::constraint::{
    ConstraintEngine, ExitEngine, RecoveryOutcome, ReevaluationOutcome, ReinstatementOutcome,
    ReviewOutcome, ViolationOutcome,
};
use crate::primitives::MAX_DESCRIPTION_LENGTH;
use crate::promotion::{
    CeremonyOutcome, DualTrackResult, GapAnalyzer, GapReport, PromotionEngine,
    PromotionOrchestrator,
};
use crate::providers::{Collaborators, PointsBalanceProvider, PromotionFacts};
use crate::stage::{
    DisplayPermissions, StabilityWindow, StageEngine, StageEvaluation, StageMetrics,
    StageProgress, get_display_permissions,
};
use crate::state::{ExitRecord, ParticipantLifecycleState};
use crate::types::{ExitKind, ParticipantId, Stage, StewardError, Tier, TierPair, ViolationKind};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Lifecycle governance over a shared configuration.
#[derive(Debug, Clone)]
pub struct GovernanceEngine {
    config: Arc<GovernanceConfig>,
}

impl Default for GovernanceEngine {
    fn default() -> Self {
        Self::new(Arc::new(GovernanceConfig::builtin()))
    }
}

impl GovernanceEngine {
    #[must_use]
    pub fn new(config: Arc<GovernanceConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    #[must_use]
    pub fn shared_config(&self) -> Arc<GovernanceConfig> {
        Arc::clone(&self.config)
    }

    /// Create the enrollment state for a validated participant id.
    pub fn enroll(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<ParticipantLifecycleState, StewardError> {
        Ok(ParticipantLifecycleState::enroll(ParticipantId::parse(id)?, now))
    }

    // =========================================================================
    // STAGE
    // =========================================================================

    /// Evaluate and apply a stage transition.
    pub fn evaluate_stage(
        &self,
        state: &mut ParticipantLifecycleState,
        metrics: &StageMetrics,
        now: DateTime<Utc>,
    ) -> Result<StageEvaluation, StewardError> {
        let engine = StageEngine::new(&self.config.stage_rules);
        let evaluation = engine.evaluate(state, metrics, now);
        engine.apply(state, &evaluation, now)?;
        Ok(evaluation)
    }

    /// Record one stability window; true once verified stable.
    pub fn check_stability(
        &self,
        state: &mut ParticipantLifecycleState,
        window: &StabilityWindow,
    ) -> bool {
        StageEngine::new(&self.config.stage_rules).check_stability(state, window)
    }

    #[must_use]
    pub fn display_permissions(&self, stage: Stage) -> DisplayPermissions {
        get_display_permissions(stage)
    }

    #[must_use]
    pub fn stage_progress(
        &self,
        state: &ParticipantLifecycleState,
        now: DateTime<Utc>,
    ) -> StageProgress {
        StageEngine::new(&self.config.stage_rules).progress(state, now)
    }

    // =========================================================================
    // PROMOTION
    // =========================================================================

    /// Overwrite balances from the points provider.
    ///
    /// Frozen or exited participants keep their balances; returns whether
    /// the balances were refreshed.
    pub fn refresh_points(
        &self,
        state: &mut ParticipantLifecycleState,
        provider: &dyn PointsBalanceProvider,
    ) -> Result<bool, StewardError> {
        if state.points_frozen || state.is_exited() || state.is_removed() {
            return Ok(false);
        }
        state.points = provider.balances(&state.participant_id)?;
        Ok(true)
    }

    /// Dual-track check for a tier-pair key such as `"L0_L1"`.
    pub fn check_promotion(
        &self,
        state: &ParticipantLifecycleState,
        pair_key: &str,
        facts: &PromotionFacts,
        now: DateTime<Utc>,
    ) -> Result<DualTrackResult, StewardError> {
        PromotionEngine::new(&self.config).check_key(state, pair_key, facts, now)
    }

    /// Dual-track check with the facts gathered from `sources`.
    pub fn check_promotion_with(
        &self,
        state: &ParticipantLifecycleState,
        pair_key: &str,
        sources: Collaborators<'_>,
        now: DateTime<Utc>,
    ) -> Result<DualTrackResult, StewardError> {
        let pair = TierPair::from_key(pair_key)?;
        let facts = sources.gather(&state.participant_id, self.config.threshold(pair)?)?;
        PromotionEngine::new(&self.config).check(state, pair, &facts, now)
    }

    #[must_use]
    pub fn analyze_gaps(&self, result: &DualTrackResult) -> GapReport {
        GapAnalyzer::analyze(result)
    }

    pub fn initiate_ceremony(
        &self,
        state: &mut ParticipantLifecycleState,
        from_tier: Tier,
        facts: &PromotionFacts,
        now: DateTime<Utc>,
    ) -> Result<CeremonyOutcome, StewardError> {
        PromotionOrchestrator::new(&self.config).initiate_ceremony(state, from_tier, facts, now)
    }

    /// Ceremony whose eligibility facts come from `sources` at ceremony time.
    pub fn initiate_ceremony_with(
        &self,
        state: &mut ParticipantLifecycleState,
        from_tier: Tier,
        sources: Collaborators<'_>,
        now: DateTime<Utc>,
    ) -> Result<CeremonyOutcome, StewardError> {
        PromotionOrchestrator::new(&self.config)
            .initiate_ceremony_with(state, from_tier, sources, now)
    }

    // =========================================================================
    // CONSTRAINTS
    // =========================================================================

    /// Record a violation given its key (`"minor_complaint"`, ...).
    pub fn process_violation(
        &self,
        state: &mut ParticipantLifecycleState,
        kind_key: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<ViolationOutcome, StewardError> {
        let kind = ViolationKind::from_key(kind_key)?;
        self.process_violation_kind(state, kind, description, now)
    }

    pub fn process_violation_kind(
        &self,
        state: &mut ParticipantLifecycleState,
        kind: ViolationKind,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<ViolationOutcome, StewardError> {
        check_text("description", description)?;
        ConstraintEngine::new(&self.config).process_violation(state, kind, description, now)
    }

    #[must_use]
    pub fn classify_overreach(&self, state: &ParticipantLifecycleState) -> ViolationKind {
        ConstraintEngine::new(&self.config).classify_overreach(state)
    }

    pub fn file_appeal(
        &self,
        state: &mut ParticipantLifecycleState,
        violation_id: &str,
        now: DateTime<Utc>,
    ) -> ReviewOutcome {
        ConstraintEngine::new(&self.config).file_appeal(state, violation_id, now)
    }

    pub fn resolve_violation(
        &self,
        state: &mut ParticipantLifecycleState,
        violation_id: &str,
        upheld: bool,
    ) -> ReviewOutcome {
        ConstraintEngine::new(&self.config).resolve_violation(state, violation_id, upheld)
    }

    pub fn request_reevaluation(
        &self,
        state: &mut ParticipantLifecycleState,
        passed: bool,
        now: DateTime<Utc>,
    ) -> ReevaluationOutcome {
        ConstraintEngine::new(&self.config).request_reevaluation(state, passed, now)
    }

    // =========================================================================
    // EXIT / RECOVERY
    // =========================================================================

    pub fn process_exit(
        &self,
        state: &mut ParticipantLifecycleState,
        kind: ExitKind,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ExitRecord, StewardError> {
        check_text("reason", reason)?;
        ExitEngine::new(&self.config).process_exit(state, kind, reason, now)
    }

    #[must_use]
    pub fn request_recovery(
        &self,
        state: &ParticipantLifecycleState,
        now: DateTime<Utc>,
    ) -> RecoveryOutcome {
        ExitEngine::new(&self.config).request_recovery(state, now)
    }

    pub fn reinstate(
        &self,
        state: &mut ParticipantLifecycleState,
        now: DateTime<Utc>,
    ) -> ReinstatementOutcome {
        ExitEngine::new(&self.config).reinstate(state, now)
    }
}

fn check_text(field: &str, text: &str) -> Result<(), StewardError> {
    if text.len() > MAX_DESCRIPTION_LENGTH {
        return Err(StewardError::InvalidInput(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            text.len(),
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}
