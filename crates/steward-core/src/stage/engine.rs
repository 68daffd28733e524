//! # Stage Engine
//!
//! Decides, from externally computed behavioral metrics, whether a
//! participant advances, holds or regresses their adoption stage, and keeps
//! the rolling stability counter.
//!
//! ## Transition Table
//!
//! | From | Advance when | Backward edge |
//! |------|--------------|---------------|
//! | S0 | authorization signed AND initial assessment completed | none |
//! | S1 | weekly feedback ≥ minimum AND ≥ 1 interruption point | none (hold) |
//! | S2 | completed trial attempts ≥ minimum | none, volatility holds |
//! | S3 | adherence ≥ advance level AND minimum dwell | S2 iff severe flag AND adherence < floor |
//! | S4 | stability counter ≥ required days | none (hold) |
//! | S5 | ceremony completed → graduated | none |

use crate::config::{StabilityRules, StageRules};
use crate::state::ParticipantLifecycleState;
use crate::types::{Stage, StewardError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// METRICS
// =============================================================================

/// Behavioral metrics supplied by the caller for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageMetrics {
    pub authorization_signed: bool,
    pub initial_assessment_completed: bool,
    pub weekly_feedback_count: u32,
    pub interruption_points_identified: u32,
    pub trial_attempts_completed: u32,
    /// Swing in trial attempt outcomes. Never causes an S2 regression.
    pub attempt_volatility_percent: u8,
    pub severe_regression: bool,
    pub pathway_adherence_percent: u8,
    pub ceremony_completed: bool,
}

/// Observations for one stability evaluation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityWindow {
    pub retention_percent: u8,
    pub max_gap_days: u32,
    pub coach_interventions: u32,
}

impl StabilityWindow {
    /// Check all three stability conditions at once.
    #[must_use]
    pub fn holds(&self, rules: &StabilityRules) -> bool {
        self.retention_percent >= rules.min_retention_percent
            && self.max_gap_days <= rules.max_gap_days
            && self.coach_interventions == 0
    }
}

// =============================================================================
// EVALUATION RESULT
// =============================================================================

/// Outcome of a stage evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Advanced,
    Stayed,
    RegressedToS2,
    Graduated,
}

/// Why the engine reached its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum StageReason {
    AuthorizationPending,
    AuthorizationComplete,
    FeedbackBelowMinimum { observed: u32, required: u32 },
    NoInterruptionPoint,
    AwarenessEstablished,
    TrialInProgress { completed: u32, required: u32 },
    TrialComplete,
    SevereRegression { adherence: u8, floor: u8 },
    AdherenceBelowAdvance { adherence: u8, required: u8 },
    PathwayDwellPending { days: u32, required: u32 },
    PathwayEstablished,
    StabilityPending { days: u32, required: u32 },
    StabilityVerified,
    CeremonyPending,
    CeremonyCompleted,
    /// Precondition: transition requested from the terminal stage.
    TerminalStage,
    /// Precondition: participant is outside the program.
    ParticipantExited,
}

impl std::fmt::Display for StageReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationPending => {
                f.write_str("authorization signature or initial assessment missing")
            }
            Self::AuthorizationComplete => f.write_str("authorization signed and assessed"),
            Self::FeedbackBelowMinimum { observed, required } => write!(
                f,
                "weekly feedback {} below minimum {}",
                observed, required
            ),
            Self::NoInterruptionPoint => f.write_str("no behavioral interruption point identified"),
            Self::AwarenessEstablished => f.write_str("feedback rhythm and interruption point established"),
            Self::TrialInProgress {
                completed,
                required,
            } => write!(f, "{} of {} trial attempts completed", completed, required),
            Self::TrialComplete => f.write_str("trial attempts complete"),
            Self::SevereRegression { adherence, floor } => write!(
                f,
                "severe regression with adherence {}% below floor {}%",
                adherence, floor
            ),
            Self::AdherenceBelowAdvance {
                adherence,
                required,
            } => write!(
                f,
                "pathway adherence {}% below {}% needed to advance",
                adherence, required
            ),
            Self::PathwayDwellPending { days, required } => {
                write!(f, "{} of {} days on pathway", days, required)
            }
            Self::PathwayEstablished => f.write_str("pathway adherence sustained"),
            Self::StabilityPending { days, required } => {
                write!(f, "stability streak {} of {} days", days, required)
            }
            Self::StabilityVerified => f.write_str("stability verified"),
            Self::CeremonyPending => f.write_str("graduation ceremony not yet confirmed"),
            Self::CeremonyCompleted => f.write_str("graduation ceremony confirmed"),
            Self::TerminalStage => f.write_str("participant has already graduated"),
            Self::ParticipantExited => f.write_str("participant has exited the program"),
        }
    }
}

/// Result of [`StageEngine::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvaluation {
    pub outcome: StageOutcome,
    pub previous_stage: Stage,
    /// The stage after the move; `None` when the stage does not change.
    pub next_stage: Option<Stage>,
    pub reason: StageReason,
}

impl StageEvaluation {
    fn stayed(stage: Stage, reason: StageReason) -> Self {
        Self {
            outcome: StageOutcome::Stayed,
            previous_stage: stage,
            next_stage: None,
            reason,
        }
    }

    fn moved(outcome: StageOutcome, from: Stage, to: Stage, reason: StageReason) -> Self {
        Self {
            outcome,
            previous_stage: from,
            next_stage: Some(to),
            reason,
        }
    }
}

// =============================================================================
// STAGE ENGINE
// =============================================================================

/// Stage engine bound to one set of stage rules.
#[derive(Debug, Clone, Copy)]
pub struct StageEngine<'a> {
    rules: &'a StageRules,
}

impl<'a> StageEngine<'a> {
    #[must_use]
    pub fn new(rules: &'a StageRules) -> Self {
        Self { rules }
    }

    /// Evaluate the transition without touching the state.
    #[must_use]
    pub fn evaluate(
        &self,
        state: &ParticipantLifecycleState,
        metrics: &StageMetrics,
        now: DateTime<Utc>,
    ) -> StageEvaluation {
        let stage = state.current_stage;

        if state.is_exited() {
            return StageEvaluation::stayed(stage, StageReason::ParticipantExited);
        }

        match stage {
            Stage::S0 => {
                if metrics.authorization_signed && metrics.initial_assessment_completed {
                    StageEvaluation::moved(
                        StageOutcome::Advanced,
                        stage,
                        Stage::S1,
                        StageReason::AuthorizationComplete,
                    )
                } else {
                    StageEvaluation::stayed(stage, StageReason::AuthorizationPending)
                }
            }

            Stage::S1 => {
                let required = self.rules.min_weekly_feedback;
                if metrics.weekly_feedback_count < required {
                    StageEvaluation::stayed(
                        stage,
                        StageReason::FeedbackBelowMinimum {
                            observed: metrics.weekly_feedback_count,
                            required,
                        },
                    )
                } else if metrics.interruption_points_identified
                    < self.rules.min_interruption_points.max(1)
                {
                    StageEvaluation::stayed(stage, StageReason::NoInterruptionPoint)
                } else {
                    StageEvaluation::moved(
                        StageOutcome::Advanced,
                        stage,
                        Stage::S2,
                        StageReason::AwarenessEstablished,
                    )
                }
            }

            // No regression out of S2, whatever the volatility.
            Stage::S2 => {
                let required = self.rules.min_trial_attempts;
                if metrics.trial_attempts_completed >= required {
                    StageEvaluation::moved(
                        StageOutcome::Advanced,
                        stage,
                        Stage::S3,
                        StageReason::TrialComplete,
                    )
                } else {
                    StageEvaluation::stayed(
                        stage,
                        StageReason::TrialInProgress {
                            completed: metrics.trial_attempts_completed,
                            required,
                        },
                    )
                }
            }

            Stage::S3 => self.evaluate_pathway(state, metrics, now),

            Stage::S4 => {
                let required = self.rules.stability.required_days;
                if state.stability_counter_days >= required {
                    StageEvaluation::moved(
                        StageOutcome::Advanced,
                        stage,
                        Stage::S5,
                        StageReason::StabilityVerified,
                    )
                } else {
                    StageEvaluation::stayed(
                        stage,
                        StageReason::StabilityPending {
                            days: state.stability_counter_days,
                            required,
                        },
                    )
                }
            }

            Stage::S5 => {
                if state.is_graduated() {
                    StageEvaluation::stayed(stage, StageReason::TerminalStage)
                } else if metrics.ceremony_completed {
                    StageEvaluation {
                        outcome: StageOutcome::Graduated,
                        previous_stage: stage,
                        next_stage: None,
                        reason: StageReason::CeremonyCompleted,
                    }
                } else {
                    StageEvaluation::stayed(stage, StageReason::CeremonyPending)
                }
            }
        }
    }

    fn evaluate_pathway(
        &self,
        state: &ParticipantLifecycleState,
        metrics: &StageMetrics,
        now: DateTime<Utc>,
    ) -> StageEvaluation {
        let stage = Stage::S3;
        let adherence = metrics.pathway_adherence_percent;
        let floor = self.rules.regression_adherence_floor_percent;

        // Both conditions are required; either alone holds.
        if metrics.severe_regression && adherence < floor {
            return StageEvaluation::moved(
                StageOutcome::RegressedToS2,
                stage,
                Stage::S2,
                StageReason::SevereRegression { adherence, floor },
            );
        }

        let required = self.rules.advance_adherence_percent;
        if adherence < required {
            return StageEvaluation::stayed(
                stage,
                StageReason::AdherenceBelowAdvance {
                    adherence,
                    required,
                },
            );
        }

        let days = state.days_in_stage(now);
        if days < self.rules.min_pathway_days {
            return StageEvaluation::stayed(
                stage,
                StageReason::PathwayDwellPending {
                    days,
                    required: self.rules.min_pathway_days,
                },
            );
        }

        StageEvaluation::moved(
            StageOutcome::Advanced,
            stage,
            Stage::S4,
            StageReason::PathwayEstablished,
        )
    }

    /// Apply an evaluation to the state, guarding the stage invariants.
    ///
    /// Returns `InvariantBreach` if the evaluation does not belong to the
    /// state's current stage or names an illegal move.
    pub fn apply(
        &self,
        state: &mut ParticipantLifecycleState,
        evaluation: &StageEvaluation,
        now: DateTime<Utc>,
    ) -> Result<(), StewardError> {
        if evaluation.previous_stage != state.current_stage {
            return Err(StewardError::InvariantBreach(format!(
                "evaluation computed for {:?} applied to participant at {:?}",
                evaluation.previous_stage, state.current_stage
            )));
        }

        match evaluation.outcome {
            StageOutcome::Stayed => Ok(()),
            StageOutcome::Graduated => {
                if state.current_stage != Stage::S5 {
                    return Err(StewardError::InvariantBreach(format!(
                        "graduation from {:?}",
                        state.current_stage
                    )));
                }
                state.graduated_at = Some(now);
                Ok(())
            }
            StageOutcome::Advanced | StageOutcome::RegressedToS2 => {
                let Some(to) = evaluation.next_stage else {
                    return Err(StewardError::InvariantBreach(
                        "stage move without a target stage".to_string(),
                    ));
                };
                let backward = evaluation.outcome == StageOutcome::RegressedToS2;
                if !Stage::is_legal_move(state.current_stage, to)
                    || (backward && to != Stage::S2)
                    || (!backward && to <= state.current_stage)
                {
                    return Err(StewardError::InvariantBreach(format!(
                        "illegal stage move {:?} -> {:?}",
                        state.current_stage, to
                    )));
                }
                state.current_stage = to;
                state.stage_entered_at = now;
                Ok(())
            }
        }
    }

    /// Record one stability window.
    ///
    /// A passing window increments the counter by one; any failing condition
    /// resets it to zero. Returns true once the counter reaches the required
    /// streak.
    pub fn check_stability(
        &self,
        state: &mut ParticipantLifecycleState,
        window: &StabilityWindow,
    ) -> bool {
        if window.holds(&self.rules.stability) {
            state.stability_counter_days = state.stability_counter_days.saturating_add(1);
        } else {
            state.stability_counter_days = 0;
        }
        self.is_verified_stable(state)
    }

    /// Read the stability verdict without recording a window.
    #[must_use]
    pub fn is_verified_stable(&self, state: &ParticipantLifecycleState) -> bool {
        state.stability_counter_days >= self.rules.stability.required_days
    }

    /// Progress summary for display.
    #[must_use]
    pub fn progress(&self, state: &ParticipantLifecycleState, now: DateTime<Utc>) -> StageProgress {
        let required = self.rules.stability.required_days;
        let percent = if required > 0 {
            (u64::from(state.stability_counter_days.min(required)) * 100 / u64::from(required))
                as u8
        } else {
            100
        };
        StageProgress {
            current: state.current_stage,
            next: if state.is_graduated() {
                None
            } else {
                state.current_stage.next()
            },
            graduated: state.is_graduated(),
            days_in_stage: state.days_in_stage(now),
            stability_counter_days: state.stability_counter_days,
            stability_required_days: required,
            stability_percent: percent,
        }
    }
}

/// Read-only stage summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub current: Stage,
    pub next: Option<Stage>,
    pub graduated: bool,
    pub days_in_stage: u32,
    pub stability_counter_days: u32,
    pub stability_required_days: u32,
    pub stability_percent: u8,
}

// =============================================================================
// TESTS
// =============================================================================
