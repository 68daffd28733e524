//! # Dual-Track Evaluation
//!
//! Runs the points track and the growth track for one tier pair and derives
//! the progression state:
//!
//! | Points | Growth | State |
//! |--------|--------|-------|
//! | fail | fail | `NORMAL_GROWTH` |
//! | pass | fail | `AWAITING_VERIFY` |
//! | fail | pass | `GROWTH_FIRST` |
//! | pass | pass | `READY_TO_PROMOTE` |

use super::gate::{PointsResult, gate_for};
use super::growth::{GrowthInputs, GrowthResult, evaluate_growth};
use crate::config::GovernanceConfig;
use crate::providers::PromotionFacts;
use crate::state::ParticipantLifecycleState;
use crate::types::{ParticipantId, StewardError, TierPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualification state for one tier pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressionState {
    NormalGrowth,
    AwaitingVerify,
    GrowthFirst,
    ReadyToPromote,
}

impl ProgressionState {
    /// Pure function of the two track verdicts.
    #[must_use]
    pub fn determine(points_passed: bool, growth_passed: bool) -> Self {
        match (points_passed, growth_passed) {
            (false, false) => Self::NormalGrowth,
            (true, false) => Self::AwaitingVerify,
            (false, true) => Self::GrowthFirst,
            (true, true) => Self::ReadyToPromote,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NormalGrowth => "NORMAL_GROWTH",
            Self::AwaitingVerify => "AWAITING_VERIFY",
            Self::GrowthFirst => "GROWTH_FIRST",
            Self::ReadyToPromote => "READY_TO_PROMOTE",
        }
    }

    /// Participant-facing guidance for this state.
    #[must_use]
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::NormalGrowth => {
                "Keep growing: both your points and your behavioral growth are still building toward the next tier."
            }
            Self::AwaitingVerify => {
                "Your points are sufficient. Promotion is waiting on behavioral verification: peers, stability, time in tier and exams."
            }
            Self::GrowthFirst => {
                "Your growth is verified. Keep contributing to reach the point minimums for the next tier."
            }
            Self::ReadyToPromote => {
                "You are ready for the promotion ceremony."
            }
        }
    }
}

impl fmt::Display for ProgressionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of checking one tier pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualTrackResult {
    pub participant_id: ParticipantId,
    pub pair: TierPair,
    pub state: ProgressionState,
    pub points: PointsResult,
    pub growth: GrowthResult,
}

impl DualTrackResult {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ProgressionState::ReadyToPromote
    }
}

/// Dual-track evaluator bound to one configuration.
#[derive(Debug, Clone, Copy)]
pub struct PromotionEngine<'a> {
    config: &'a GovernanceConfig,
}

impl<'a> PromotionEngine<'a> {
    #[must_use]
    pub fn new(config: &'a GovernanceConfig) -> Self {
        Self { config }
    }

    /// Evaluate both tracks for `pair`.
    ///
    /// Reads the state only; the same state, facts and `now` always give the
    /// same result. Fails only when the pair has no configured threshold.
    pub fn check(
        &self,
        state: &ParticipantLifecycleState,
        pair: TierPair,
        facts: &PromotionFacts,
        now: DateTime<Utc>,
    ) -> Result<DualTrackResult, StewardError> {
        let threshold = self.config.threshold(pair)?;

        let points = gate_for(threshold.gate).evaluate(&state.points, &threshold.min_points);
        let growth = evaluate_growth(
            threshold,
            facts,
            GrowthInputs {
                stability_counter_days: state.stability_counter_days,
                stability_required_days: self.config.stage_rules.stability.required_days,
                days_in_tier: state.days_in_tier(now),
            },
        );

        Ok(DualTrackResult {
            participant_id: state.participant_id.clone(),
            pair,
            state: ProgressionState::determine(points.passed, growth.passed),
            points,
            growth,
        })
    }

    /// Same as [`check`](Self::check) with a string tier-pair key.
    pub fn check_key(
        &self,
        state: &ParticipantLifecycleState,
        pair_key: &str,
        facts: &PromotionFacts,
        now: DateTime<Utc>,
    ) -> Result<DualTrackResult, StewardError> {
        self.check(state, TierPair::from_key(pair_key)?, facts, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointBalances;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    #[test]
    fn state_table_is_exact() {
        assert_eq!(
            ProgressionState::determine(false, false),
            ProgressionState::NormalGrowth
        );
        assert_eq!(
            ProgressionState::determine(true, false),
            ProgressionState::AwaitingVerify
        );
        assert_eq!(
            ProgressionState::determine(false, true),
            ProgressionState::GrowthFirst
        );
        assert_eq!(
            ProgressionState::determine(true, true),
            ProgressionState::ReadyToPromote
        );
    }

    #[test]
    fn guidance_messages_are_distinct() {
        let states = [
            ProgressionState::NormalGrowth,
            ProgressionState::AwaitingVerify,
            ProgressionState::GrowthFirst,
            ProgressionState::ReadyToPromote,
        ];
        for a in states {
            for b in states {
                if a != b {
                    assert_ne!(a.guidance(), b.guidance());
                }
            }
        }
    }

    #[test]
    fn state_serializes_screaming_snake() {
        let json = serde_json::to_string(&ProgressionState::AwaitingVerify).expect("serialize");
        assert_eq!(json, "\"AWAITING_VERIFY\"");
    }

    #[test]
    fn soft_gate_passes_low_balances() {
        let config = GovernanceConfig::builtin();
        let engine = PromotionEngine::new(&config);
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p-1"), t0());
        state.current_tier = crate::types::Tier::L1;
        state.points = PointBalances::new(10, 0, 0);

        let result = engine
            .check(&state, TierPair::L1L2, &PromotionFacts::default(), t0())
            .expect("check");
        assert!(result.points.passed);
        assert_eq!(result.points.shortfalls().count(), 2);
        assert_eq!(result.state, ProgressionState::AwaitingVerify);
    }

    #[test]
    fn unknown_pair_key_is_configuration_error() {
        let config = GovernanceConfig::builtin();
        let engine = PromotionEngine::new(&config);
        let state = ParticipantLifecycleState::enroll(ParticipantId::new("p-1"), t0());
        assert!(matches!(
            engine.check_key(&state, "L2_L9", &PromotionFacts::default(), t0()),
            Err(StewardError::UnknownTierPair(_))
        ));
    }
}
