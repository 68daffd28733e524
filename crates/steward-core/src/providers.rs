//! # Collaborator Interfaces
//!
//! Facts the engine consumes but does not own: point balances, companion
//! (peer) validation, exam/ethics results and capability requirements.
//!
//! Each provider is a plain query with no engine-side caching. Implementors
//! should be stateless from the engine's point of view and must be
//! `Send + Sync` so hosts can share them across request handlers.
//!
//! [`Collaborators`] bundles the three promotion-time providers. The
//! provider-driven engine entry points gather [`PromotionFacts`] through it
//! at evaluation time, so a ceremony always sees current answers.

use crate::config::PromotionThreshold;
use crate::types::{ParticipantId, PointBalances, StewardError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// PROVIDER TRAITS
// =============================================================================

/// Source of externally earned point balances.
pub trait PointsBalanceProvider: Send + Sync {
    fn balances(&self, participant: &ParticipantId) -> Result<PointBalances, StewardError>;
}

/// Companion-tracking collaborator.
pub trait CompanionProvider: Send + Sync {
    fn companions(&self, participant: &ParticipantId) -> Result<CompanionSummary, StewardError>;
}

/// Exam and ethics results. Unknown exams are reported as not passed.
pub trait ExamProvider: Send + Sync {
    fn exam_passed(&self, participant: &ParticipantId, exam: &str) -> Result<bool, StewardError>;
}

/// Capability requirement checks.
pub trait CapabilityProvider: Send + Sync {
    fn capability_met(
        &self,
        participant: &ParticipantId,
        capability: &str,
    ) -> Result<bool, StewardError>;
}

/// One collaborator that answers every promotion-time query.
///
/// Implemented for anything that implements all three provider traits.
pub trait FactSource: Send + Sync {
    fn collaborators(&self) -> Collaborators<'_>;
}

impl<T> FactSource for T
where
    T: CompanionProvider + ExamProvider + CapabilityProvider,
{
    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            companions: self,
            exams: self,
            capabilities: self,
        }
    }
}

/// The providers consulted when a promotion is evaluated.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub companions: &'a dyn CompanionProvider,
    pub exams: &'a dyn ExamProvider,
    pub capabilities: &'a dyn CapabilityProvider,
}

impl Collaborators<'_> {
    /// Ask the providers for the requirements of `threshold`.
    pub fn gather(
        &self,
        participant: &ParticipantId,
        threshold: &PromotionThreshold,
    ) -> Result<PromotionFacts, StewardError> {
        PromotionFacts::gather(
            participant,
            threshold,
            self.companions,
            self.exams,
            self.capabilities,
        )
    }
}

// =============================================================================
// FACT BUNDLES
// =============================================================================

/// Companion counts for one participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionSummary {
    /// Validated companions.
    pub total: u32,
    /// Companions that have progressed at least one stage.
    pub progressed: u32,
    /// Companions that reached an advanced stage.
    pub advanced: u32,
}

/// Everything the growth track needs besides the participant state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionFacts {
    pub companions: CompanionSummary,
    pub exams: BTreeMap<String, bool>,
    pub ethics: BTreeMap<String, bool>,
    pub capabilities: BTreeMap<String, bool>,
}

impl PromotionFacts {
    /// Query the collaborators for exactly the requirements of `threshold`.
    pub fn gather(
        participant: &ParticipantId,
        threshold: &PromotionThreshold,
        companions: &dyn CompanionProvider,
        exams: &dyn ExamProvider,
        capabilities: &dyn CapabilityProvider,
    ) -> Result<Self, StewardError> {
        let mut facts = Self {
            companions: companions.companions(participant)?,
            ..Self::default()
        };
        for exam in &threshold.exams {
            facts
                .exams
                .insert(exam.clone(), exams.exam_passed(participant, exam)?);
        }
        for ethics in &threshold.ethics {
            facts
                .ethics
                .insert(ethics.clone(), exams.exam_passed(participant, ethics)?);
        }
        for capability in &threshold.capabilities {
            facts.capabilities.insert(
                capability.clone(),
                capabilities.capability_met(participant, capability)?,
            );
        }
        Ok(facts)
    }

    #[must_use]
    pub fn exam_passed(&self, exam: &str) -> bool {
        self.exams.get(exam).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn ethics_passed(&self, ethics: &str) -> bool {
        self.ethics.get(ethics).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn capability_met(&self, capability: &str) -> bool {
        self.capabilities.get(capability).copied().unwrap_or(false)
    }
}

// =============================================================================
// STATIC FACTS
// =============================================================================

/// Facts for one participant inside a [`StaticFacts`] snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantFacts {
    pub points: Option<PointBalances>,
    pub companions: CompanionSummary,
    /// Exam and ethics results by name.
    pub results: BTreeMap<String, bool>,
    pub capabilities: BTreeMap<String, bool>,
}

/// In-memory snapshot of collaborator answers, e.g. a nightly export from
/// the companion-tracking and exam systems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticFacts {
    pub participants: BTreeMap<ParticipantId, ParticipantFacts>,
}

impl StaticFacts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one participant's facts.
    pub fn insert(&mut self, participant: ParticipantId, facts: ParticipantFacts) {
        self.participants.insert(participant, facts);
    }

    fn lookup(&self, participant: &ParticipantId) -> Result<&ParticipantFacts, StewardError> {
        self.participants.get(participant).ok_or_else(|| {
            StewardError::Provider(format!("no facts recorded for {}", participant))
        })
    }
}

impl PointsBalanceProvider for StaticFacts {
    fn balances(&self, participant: &ParticipantId) -> Result<PointBalances, StewardError> {
        self.lookup(participant)?.points.ok_or_else(|| {
            StewardError::Provider(format!("no point balances recorded for {}", participant))
        })
    }
}

impl CompanionProvider for StaticFacts {
    fn companions(&self, participant: &ParticipantId) -> Result<CompanionSummary, StewardError> {
        Ok(self.lookup(participant)?.companions)
    }
}

impl ExamProvider for StaticFacts {
    fn exam_passed(&self, participant: &ParticipantId, exam: &str) -> Result<bool, StewardError> {
        Ok(self
            .lookup(participant)?
            .results
            .get(exam)
            .copied()
            .unwrap_or(false))
    }
}

impl CapabilityProvider for StaticFacts {
    fn capability_met(
        &self,
        participant: &ParticipantId,
        capability: &str,
    ) -> Result<bool, StewardError> {
        Ok(self
            .lookup(participant)?
            .capabilities
            .get(capability)
            .copied()
            .unwrap_or(false))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernanceConfig;
    use crate::types::TierPair;

    #[test]
    fn gather_queries_only_listed_requirements() {
        let config = GovernanceConfig::builtin();
        let threshold = config.threshold(TierPair::L2L3).expect("threshold");
        let id = ParticipantId::new("p-7");

        let mut snapshot = StaticFacts::new();
        let mut results = BTreeMap::new();
        results.insert("mentor_certification".to_string(), true);
        results.insert("ethics_review".to_string(), false);
        results.insert("unrelated".to_string(), true);
        snapshot.insert(
            id.clone(),
            ParticipantFacts {
                companions: CompanionSummary {
                    total: 6,
                    progressed: 3,
                    advanced: 2,
                },
                results,
                ..ParticipantFacts::default()
            },
        );

        let facts = PromotionFacts::gather(&id, threshold, &snapshot, &snapshot, &snapshot)
            .expect("gather");
        assert!(facts.exam_passed("mentor_certification"));
        assert!(!facts.ethics_passed("ethics_review"));
        assert!(!facts.exams.contains_key("unrelated"));
        assert_eq!(facts.companions.total, 6);
    }

    #[test]
    fn fact_source_answers_through_each_provider() {
        let config = GovernanceConfig::builtin();
        let threshold = config.threshold(TierPair::L0L1).expect("threshold");
        let id = ParticipantId::new("p-2");
        let mut snapshot = StaticFacts::new();
        snapshot.insert(
            id.clone(),
            ParticipantFacts {
                companions: CompanionSummary {
                    total: 4,
                    progressed: 2,
                    advanced: 1,
                },
                ..ParticipantFacts::default()
            },
        );

        let source: &dyn FactSource = &snapshot;
        let facts = source
            .collaborators()
            .gather(&id, threshold)
            .expect("gather");
        assert_eq!(facts.companions.progressed, 2);

        let missing = source
            .collaborators()
            .gather(&ParticipantId::new("p-3"), threshold);
        assert!(matches!(missing, Err(StewardError::Provider(_))));
    }

    #[test]
    fn unknown_participant_is_provider_error() {
        let snapshot = StaticFacts::new();
        assert!(matches!(
            snapshot.companions(&ParticipantId::new("ghost")),
            Err(StewardError::Provider(_))
        ));
    }

    #[test]
    fn missing_results_count_as_not_passed() {
        let facts = PromotionFacts::default();
        assert!(!facts.exam_passed("anything"));
        assert!(!facts.capability_met("anything"));
    }
}
