//! # Promotion Ceremony
//!
//! The only operation that raises `current_tier`. Eligibility is re-checked
//! at ceremony time, so a ceremony never promotes on a stale evaluation.
//! With [`PromotionOrchestrator::initiate_ceremony_with`] the facts are also
//! gathered from the collaborators at that point, after the preconditions
//! pass. Every failure leaves the state untouched.

use super::engine::{ProgressionState, PromotionEngine};
use super::gap::{Gap, GapAnalyzer};
use crate::config::{GovernanceConfig, PromotionThreshold};
use crate::providers::{Collaborators, PromotionFacts};
use crate::state::{ParticipantLifecycleState, add_days};
use crate::types::{PreconditionFailure, StewardError, Tier, TierPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a ceremony attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyOutcome {
    pub success: bool,
    pub previous_tier: Tier,
    pub new_tier: Option<Tier>,
    pub ceremony_name: Option<String>,
    pub symbol: Option<String>,
    /// Contracts to sign for this specific transition.
    pub contracts: Option<Vec<String>>,
    pub protection_until: Option<DateTime<Utc>>,
    pub failure: Option<PreconditionFailure>,
    pub failure_reason: Option<String>,
    /// Evaluation state at ceremony time, when an evaluation ran.
    pub progression: Option<ProgressionState>,
    pub gaps: Vec<Gap>,
}

impl CeremonyOutcome {
    fn failed(previous_tier: Tier, failure: PreconditionFailure) -> Self {
        Self {
            success: false,
            previous_tier,
            new_tier: None,
            ceremony_name: None,
            symbol: None,
            contracts: None,
            protection_until: None,
            failure: Some(failure),
            failure_reason: Some(failure.message().to_string()),
            progression: None,
            gaps: Vec::new(),
        }
    }
}

/// Runs promotion ceremonies.
#[derive(Debug, Clone, Copy)]
pub struct PromotionOrchestrator<'a> {
    config: &'a GovernanceConfig,
}

impl<'a> PromotionOrchestrator<'a> {
    #[must_use]
    pub fn new(config: &'a GovernanceConfig) -> Self {
        Self { config }
    }

    /// Promote `state` out of `from_tier` if it is READY_TO_PROMOTE now.
    ///
    /// Precondition failures come back as data in [`CeremonyOutcome`];
    /// `Err` is reserved for configuration errors and invariant breaches.
    pub fn initiate_ceremony(
        &self,
        state: &mut ParticipantLifecycleState,
        from_tier: Tier,
        facts: &PromotionFacts,
        now: DateTime<Utc>,
    ) -> Result<CeremonyOutcome, StewardError> {
        self.run(state, from_tier, now, |_| Ok(facts.clone()))
    }

    /// Like [`Self::initiate_ceremony`], asking `sources` for the facts.
    ///
    /// Provider failures are returned as `Err` and leave the state untouched.
    pub fn initiate_ceremony_with(
        &self,
        state: &mut ParticipantLifecycleState,
        from_tier: Tier,
        sources: Collaborators<'_>,
        now: DateTime<Utc>,
    ) -> Result<CeremonyOutcome, StewardError> {
        let participant = state.participant_id.clone();
        self.run(state, from_tier, now, |threshold| {
            sources.gather(&participant, threshold)
        })
    }

    fn run(
        &self,
        state: &mut ParticipantLifecycleState,
        from_tier: Tier,
        now: DateTime<Utc>,
        facts: impl FnOnce(&PromotionThreshold) -> Result<PromotionFacts, StewardError>,
    ) -> Result<CeremonyOutcome, StewardError> {
        let current = state.current_tier;
        if state.is_removed() {
            return Ok(CeremonyOutcome::failed(
                current,
                PreconditionFailure::ParticipantRemoved,
            ));
        }
        if state.is_exited() {
            return Ok(CeremonyOutcome::failed(
                current,
                PreconditionFailure::ParticipantExited,
            ));
        }
        if from_tier.is_max() {
            return Ok(CeremonyOutcome::failed(
                current,
                PreconditionFailure::MaximumTierReached,
            ));
        }
        if from_tier != current {
            return Ok(CeremonyOutcome::failed(
                current,
                PreconditionFailure::TierMismatch,
            ));
        }
        let Some(pair) = TierPair::starting_at(current) else {
            return Ok(CeremonyOutcome::failed(
                current,
                PreconditionFailure::MaximumTierReached,
            ));
        };

        let threshold = self.config.threshold(pair)?;
        let facts = facts(threshold)?;
        let result = PromotionEngine::new(self.config).check(state, pair, &facts, now)?;
        if !result.is_ready() {
            let report = GapAnalyzer::analyze(&result);
            let mut outcome =
                CeremonyOutcome::failed(current, PreconditionFailure::NotReadyToPromote);
            outcome.progression = Some(result.state);
            outcome.gaps = report.gaps;
            return Ok(outcome);
        }

        let new_tier = pair.to_tier();
        if current.next() != Some(new_tier) {
            return Err(StewardError::InvariantBreach(format!(
                "promotion {:?} -> {:?} skips a tier",
                current, new_tier
            )));
        }

        let protection_until = add_days(now, self.config.protection.protection_days)?;
        state.current_tier = new_tier;
        state.tier_entered_at = now;
        state.protection_until = Some(protection_until);

        Ok(CeremonyOutcome {
            success: true,
            previous_tier: current,
            new_tier: Some(new_tier),
            ceremony_name: Some(threshold.ceremony.name.clone()),
            symbol: Some(threshold.ceremony.symbol.clone()),
            contracts: Some(threshold.ceremony.contracts.clone()),
            protection_until: Some(protection_until),
            failure: None,
            failure_reason: None,
            progression: Some(result.state),
            gaps: Vec::new(),
        })
    }
}
