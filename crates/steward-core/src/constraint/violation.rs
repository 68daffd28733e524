//! # Violation Processing
//!
//! Applies the fixed policy of a violation kind: point penalty, the
//! additional action, and the tier consequence.
//!
//! | Kind | Tier consequence |
//! |------|------------------|
//! | minor complaint | none |
//! | first overreach | none |
//! | second overreach | demote one tier, open an observation window |
//! | ethics redline | forced exit, tier set to removed |
//! | KPI underperformance | supervision window, no point penalty |
//!
//! The protection waiver is evaluated per violation: an exempt policy, no
//! other unresolved violation, and an open grace window.

use super::exit::ExitEngine;
use crate::config::{GovernanceConfig, PointPenalty, ViolationPolicy};
use crate::state::{
    AppliedPenalty, ExitRecord, ObservationPeriod, ParticipantLifecycleState, ResolutionStatus,
    ViolationRecord, add_days,
};
use crate::types::{
    ExitKind, PointBalances, PointTrack, PreconditionFailure, StewardError, Tier, ViolationKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action recorded when the protection waiver applies.
pub const WAIVED_ACTION: &str = "warning only (protection period)";

// =============================================================================
// OUTCOMES
// =============================================================================

/// Tier change caused by a second overreach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demotion {
    pub from: Tier,
    pub to: Tier,
    pub observation: ObservationPeriod,
}

/// Result of [`ConstraintEngine::process_violation`].
///
/// The applied penalty and action are always present, including the
/// waived and no-penalty paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationOutcome {
    pub kind: ViolationKind,
    pub penalty_applied: AppliedPenalty,
    pub action_taken: String,
    pub recovery_path: String,
    pub demotion: Option<Demotion>,
    pub exit_triggered: Option<ExitRecord>,
    pub supervision_until: Option<DateTime<Utc>>,
    /// The recorded history entry; `None` when the violation was refused.
    pub record: Option<ViolationRecord>,
    pub failure: Option<PreconditionFailure>,
}

/// Result of an appeal or a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub accepted: bool,
    pub status: Option<ResolutionStatus>,
    /// Points credited back by an overturned violation.
    pub refunded: PointBalances,
    pub failure: Option<PreconditionFailure>,
}

impl ReviewOutcome {
    fn refused(failure: PreconditionFailure, status: Option<ResolutionStatus>) -> Self {
        Self {
            accepted: false,
            status,
            refunded: PointBalances::default(),
            failure: Some(failure),
        }
    }
}

/// Result of a capability re-evaluation during observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReevaluationOutcome {
    pub restored: bool,
    pub tier: Tier,
    pub failure: Option<PreconditionFailure>,
}

// =============================================================================
// CONSTRAINT ENGINE
// =============================================================================

/// Violation processing bound to one configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintEngine<'a> {
    config: &'a GovernanceConfig,
}

impl<'a> ConstraintEngine<'a> {
    #[must_use]
    pub fn new(config: &'a GovernanceConfig) -> Self {
        Self { config }
    }

    /// Escalate an overreach report to a second overreach when a first one
    /// stands on record.
    #[must_use]
    pub fn classify_overreach(&self, state: &ParticipantLifecycleState) -> ViolationKind {
        let prior = state.violation_history.iter().any(|v| {
            matches!(
                v.kind,
                ViolationKind::FirstOverreach | ViolationKind::SecondOverreach
            ) && v.resolution != ResolutionStatus::Overturned
        });
        if prior {
            ViolationKind::SecondOverreach
        } else {
            ViolationKind::FirstOverreach
        }
    }

    /// Record a violation and apply its policy.
    ///
    /// Fails only when the kind has no configured policy. Either the whole
    /// penalty and consequence is applied or the state is left unchanged.
    pub fn process_violation(
        &self,
        state: &mut ParticipantLifecycleState,
        kind: ViolationKind,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<ViolationOutcome, StewardError> {
        let policy = self.config.policy(kind)?;

        if state.is_exited() || state.is_removed() {
            return Ok(ViolationOutcome {
                kind,
                penalty_applied: AppliedPenalty::default(),
                action_taken: "none".to_string(),
                recovery_path: policy.recovery_path.clone(),
                demotion: None,
                exit_triggered: None,
                supervision_until: None,
                record: None,
                failure: Some(PreconditionFailure::ParticipantExited),
            });
        }

        let waived = policy.protection_exempt
            && state.unresolved_violations() == 0
            && state.is_protected(now);

        // Work on a copy so a failure part-way leaves the caller's state intact.
        let mut next = state.clone();
        let id = next.next_violation_id();
        let penalty = if waived {
            AppliedPenalty {
                waived: true,
                ..AppliedPenalty::default()
            }
        } else {
            apply_penalty(&mut next.points, policy.penalty)
        };

        let mut action_taken = if waived {
            WAIVED_ACTION.to_string()
        } else {
            policy.action.clone()
        };
        let mut demotion = None;
        let mut exit_triggered = None;
        let mut supervision_until = None;

        if !waived {
            match kind {
                ViolationKind::SecondOverreach => {
                    match self.demote(&mut next, policy, now)? {
                        Some(d) => demotion = Some(d),
                        None => action_taken = not_applicable(policy, state.current_tier),
                    }
                }
                ViolationKind::EthicsRedline => {
                    // The exit record carries the balances held when the
                    // violation occurred; the exit clears them.
                    next.points = state.points;
                    let reason = format!("{}: {}", kind, description);
                    exit_triggered = Some(ExitEngine::new(self.config).process_exit(
                        &mut next,
                        ExitKind::Forced,
                        &reason,
                        now,
                    )?);
                }
                ViolationKind::KpiUnderperformance => {
                    if policy.applies_to(next.current_tier) {
                        let until = add_days(now, self.config.protection.observation_days)?;
                        next.supervision_until = Some(until);
                        supervision_until = Some(until);
                    } else {
                        action_taken = not_applicable(policy, state.current_tier);
                    }
                }
                ViolationKind::MinorComplaint | ViolationKind::FirstOverreach => {}
            }
        }

        let record = ViolationRecord {
            id,
            kind,
            description: description.to_string(),
            occurred_at: now,
            penalty,
            action_taken: action_taken.clone(),
            appeal_deadline: add_days(now, policy.appeal_window_days)?,
            reviewer: policy.reviewer.clone(),
            resolution: ResolutionStatus::Open,
        };
        next.violation_history.push(record.clone());
        *state = next;

        Ok(ViolationOutcome {
            kind,
            penalty_applied: penalty,
            action_taken,
            recovery_path: policy.recovery_path.clone(),
            demotion,
            exit_triggered,
            supervision_until,
            record: Some(record),
            failure: None,
        })
    }

    fn demote(
        &self,
        state: &mut ParticipantLifecycleState,
        policy: &ViolationPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<Demotion>, StewardError> {
        let from = state.current_tier;
        if !policy.applies_to(from) {
            return Ok(None);
        }
        let Some(to) = from.previous() else {
            return Ok(None);
        };
        let observation = ObservationPeriod {
            demoted_from: from,
            demoted_to: to,
            started_at: now,
            ends_at: add_days(now, self.config.protection.observation_days)?,
        };
        state.current_tier = to;
        state.tier_entered_at = now;
        state.observation = Some(observation);
        Ok(Some(Demotion {
            from,
            to,
            observation,
        }))
    }

    /// File an appeal while the violation is open and the window has not
    /// passed (deadline inclusive).
    pub fn file_appeal(
        &self,
        state: &mut ParticipantLifecycleState,
        violation_id: &str,
        now: DateTime<Utc>,
    ) -> ReviewOutcome {
        let Some(record) = state
            .violation_history
            .iter_mut()
            .find(|v| v.id == violation_id)
        else {
            return ReviewOutcome::refused(PreconditionFailure::UnknownViolation, None);
        };
        if record.resolution != ResolutionStatus::Open {
            return ReviewOutcome::refused(
                PreconditionFailure::ViolationNotOpen,
                Some(record.resolution),
            );
        }
        if now > record.appeal_deadline {
            return ReviewOutcome::refused(
                PreconditionFailure::AppealWindowClosed,
                Some(record.resolution),
            );
        }
        record.resolution = ResolutionStatus::Appealed;
        ReviewOutcome {
            accepted: true,
            status: Some(record.resolution),
            refunded: PointBalances::default(),
            failure: None,
        }
    }

    /// Close an unresolved violation. Overturning refunds the points it
    /// deducted; cleared balances are not restored.
    pub fn resolve_violation(
        &self,
        state: &mut ParticipantLifecycleState,
        violation_id: &str,
        upheld: bool,
    ) -> ReviewOutcome {
        let Some(record) = state
            .violation_history
            .iter_mut()
            .find(|v| v.id == violation_id)
        else {
            return ReviewOutcome::refused(PreconditionFailure::UnknownViolation, None);
        };
        if !record.resolution.is_unresolved() {
            return ReviewOutcome::refused(
                PreconditionFailure::ViolationNotOpen,
                Some(record.resolution),
            );
        }

        let mut refunded = PointBalances::default();
        if upheld {
            record.resolution = ResolutionStatus::Upheld;
        } else {
            record.resolution = ResolutionStatus::Overturned;
            if !record.penalty.cleared {
                refunded = record.penalty.deducted;
            }
        }
        let status = record.resolution;
        for track in PointTrack::ALL {
            state.points.credit(track, refunded.get(track));
        }

        ReviewOutcome {
            accepted: true,
            status: Some(status),
            refunded,
            failure: None,
        }
    }

    /// Restore a demoted tier after a passed capability re-evaluation inside
    /// the observation window.
    pub fn request_reevaluation(
        &self,
        state: &mut ParticipantLifecycleState,
        passed: bool,
        now: DateTime<Utc>,
    ) -> ReevaluationOutcome {
        let refuse = |state: &ParticipantLifecycleState, failure| ReevaluationOutcome {
            restored: false,
            tier: state.current_tier,
            failure: Some(failure),
        };
        if state.is_exited() || state.is_removed() {
            return refuse(state, PreconditionFailure::ParticipantExited);
        }
        let Some(observation) = state.observation.filter(|o| o.is_active(now)) else {
            return refuse(state, PreconditionFailure::NoActiveObservation);
        };
        if !passed {
            return refuse(state, PreconditionFailure::ReevaluationFailed);
        }

        state.current_tier = observation.demoted_from;
        state.tier_entered_at = now;
        state.observation = None;
        ReevaluationOutcome {
            restored: true,
            tier: state.current_tier,
            failure: None,
        }
    }
}

fn apply_penalty(points: &mut PointBalances, penalty: PointPenalty) -> AppliedPenalty {
    match penalty {
        PointPenalty::None => AppliedPenalty::default(),
        PointPenalty::Deduct { track, amount } => {
            let taken = points.deduct(track, amount);
            let mut deducted = PointBalances::default();
            deducted.credit(track, taken);
            AppliedPenalty {
                deducted,
                ..AppliedPenalty::default()
            }
        }
        PointPenalty::ClearAll => {
            let deducted = *points;
            points.clear();
            AppliedPenalty {
                deducted,
                cleared: true,
                waived: false,
            }
        }
    }
}

fn not_applicable(policy: &ViolationPolicy, tier: Tier) -> String {
    format!("point penalty only; {} does not apply at {:?}", policy.action, tier)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParticipantId;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0)
            .single()
            .expect("valid date")
    }

    fn promoted(tier: Tier) -> ParticipantLifecycleState {
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p-1"), t0());
        state.current_tier = tier;
        state.points = PointBalances::new(500, 100, 20);
        state.protection_until = Some(t0() + Duration::days(90));
        state
    }

    #[test]
    fn first_violation_in_grace_window_is_waived() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L1);

        let outcome = engine
            .process_violation(&mut state, ViolationKind::MinorComplaint, "late", t0())
            .expect("violation");
        assert!(outcome.penalty_applied.waived);
        assert_eq!(outcome.penalty_applied.total(), 0);
        assert_eq!(outcome.action_taken, WAIVED_ACTION);
        assert_eq!(state.points.contribution, 100);
        assert_eq!(state.violation_history.len(), 1);

        let second = engine
            .process_violation(&mut state, ViolationKind::MinorComplaint, "again", t0())
            .expect("violation");
        assert!(!second.penalty_applied.waived);
        assert_eq!(second.penalty_applied.deducted.contribution, 10);
        assert_eq!(state.points.contribution, 90);
    }

    #[test]
    fn waiver_requires_open_window() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L1);

        let outcome = engine
            .process_violation(
                &mut state,
                ViolationKind::FirstOverreach,
                "after window",
                t0() + Duration::days(90),
            )
            .expect("violation");
        assert!(!outcome.penalty_applied.waived);
        assert_eq!(state.points.growth, 450);
    }

    #[test]
    fn non_exempt_policy_is_never_waived() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L2);

        let outcome = engine
            .process_violation(&mut state, ViolationKind::SecondOverreach, "repeat", t0())
            .expect("violation");
        assert!(!outcome.penalty_applied.waived);
        let demotion = outcome.demotion.expect("demotion");
        assert_eq!((demotion.from, demotion.to), (Tier::L2, Tier::L1));
        assert_eq!(state.current_tier, Tier::L1);
        assert_eq!(
            state.observation.map(|o| o.ends_at),
            Some(t0() + Duration::days(180))
        );
    }

    #[test]
    fn deductions_never_go_negative() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L3);
        state.points = PointBalances::new(30, 0, 0);
        state.protection_until = None;

        let outcome = engine
            .process_violation(&mut state, ViolationKind::FirstOverreach, "x", t0())
            .expect("violation");
        assert_eq!(outcome.penalty_applied.deducted.growth, 30);
        assert_eq!(state.points.growth, 0);
    }

    #[test]
    fn ethics_redline_forces_exit() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L3);

        let outcome = engine
            .process_violation(&mut state, ViolationKind::EthicsRedline, "breach", t0())
            .expect("violation");
        assert!(outcome.penalty_applied.cleared);
        assert!(outcome.demotion.is_none());
        let exit = outcome.exit_triggered.expect("exit");
        assert_eq!(exit.kind, ExitKind::Forced);
        assert!(!exit.recovery_eligible);
        assert_eq!(state.current_tier, Tier::Removed);
        assert_eq!(state.points.total(), 0);
    }

    #[test]
    fn redline_exit_records_balances_before_the_violation() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L2);
        state.points = PointBalances::new(400, 80, 10);
        let mut explicit = state.clone();

        let outcome = engine
            .process_violation(&mut state, ViolationKind::EthicsRedline, "breach", t0())
            .expect("violation");
        let redline = outcome.exit_triggered.expect("exit");
        assert_eq!(redline.points_at_exit, PointBalances::new(400, 80, 10));
        assert_eq!(redline.tier_at_exit, Tier::L2);
        assert_eq!(state.points.total(), 0);

        let forced = ExitEngine::new(&config)
            .process_exit(&mut explicit, ExitKind::Forced, "breach", t0())
            .expect("exit");
        assert_eq!(redline.points_at_exit, forced.points_at_exit);
        assert_eq!(redline.points_cleared, forced.points_cleared);
    }

    #[test]
    fn out_of_range_window_is_configuration_error() {
        let mut config = GovernanceConfig::builtin();
        for policy in &mut config.policies {
            policy.appeal_window_days = u32::MAX;
        }
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L1);
        state.protection_until = None;
        let before = state.clone();
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);

        let err = engine
            .process_violation(&mut state, ViolationKind::MinorComplaint, "x", late)
            .expect_err("overflow");
        assert!(err.is_configuration_error());
        assert_eq!(state, before);
    }

    #[test]
    fn kpi_underperformance_assigns_supervision() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L2);
        state.protection_until = None;

        let outcome = engine
            .process_violation(&mut state, ViolationKind::KpiUnderperformance, "kpi", t0())
            .expect("violation");
        assert_eq!(outcome.penalty_applied.total(), 0);
        assert_eq!(outcome.action_taken, "supervision plan assigned");
        assert_eq!(state.supervision_until, outcome.supervision_until);
        assert_eq!(state.current_tier, Tier::L2);
    }

    #[test]
    fn second_overreach_below_range_keeps_tier() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L0);

        let outcome = engine
            .process_violation(&mut state, ViolationKind::SecondOverreach, "x", t0())
            .expect("violation");
        assert!(outcome.demotion.is_none());
        assert_eq!(state.current_tier, Tier::L0);
        assert_eq!(outcome.penalty_applied.deducted.growth, 100);
    }

    #[test]
    fn overreach_escalates_after_first() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L2);
        assert_eq!(
            engine.classify_overreach(&state),
            ViolationKind::FirstOverreach
        );
        engine
            .process_violation(&mut state, ViolationKind::FirstOverreach, "x", t0())
            .expect("violation");
        assert_eq!(
            engine.classify_overreach(&state),
            ViolationKind::SecondOverreach
        );
    }

    #[test]
    fn overturned_appeal_refunds_points() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L1);
        state.protection_until = None;

        engine
            .process_violation(&mut state, ViolationKind::FirstOverreach, "x", t0())
            .expect("violation");
        assert_eq!(state.points.growth, 450);

        let appeal = engine.file_appeal(&mut state, "V-0001", t0() + Duration::days(14));
        assert!(appeal.accepted);
        let late = engine.file_appeal(&mut state, "V-0001", t0() + Duration::days(1));
        assert_eq!(late.failure, Some(PreconditionFailure::ViolationNotOpen));

        let resolved = engine.resolve_violation(&mut state, "V-0001", false);
        assert_eq!(resolved.status, Some(ResolutionStatus::Overturned));
        assert_eq!(resolved.refunded.growth, 50);
        assert_eq!(state.points.growth, 500);
        assert_eq!(state.unresolved_violations(), 0);
    }

    #[test]
    fn appeal_after_deadline_is_refused() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L1);
        engine
            .process_violation(&mut state, ViolationKind::MinorComplaint, "x", t0())
            .expect("violation");
        let outcome = engine.file_appeal(&mut state, "V-0001", t0() + Duration::days(8));
        assert_eq!(outcome.failure, Some(PreconditionFailure::AppealWindowClosed));
        assert_eq!(
            engine.file_appeal(&mut state, "V-0042", t0()).failure,
            Some(PreconditionFailure::UnknownViolation)
        );
    }

    #[test]
    fn reevaluation_restores_demoted_tier() {
        let config = GovernanceConfig::builtin();
        let engine = ConstraintEngine::new(&config);
        let mut state = promoted(Tier::L3);
        engine
            .process_violation(&mut state, ViolationKind::SecondOverreach, "x", t0())
            .expect("violation");
        assert_eq!(state.current_tier, Tier::L2);

        let failed = engine.request_reevaluation(&mut state, false, t0() + Duration::days(10));
        assert_eq!(failed.failure, Some(PreconditionFailure::ReevaluationFailed));

        let passed = engine.request_reevaluation(&mut state, true, t0() + Duration::days(20));
        assert!(passed.restored);
        assert_eq!(state.current_tier, Tier::L3);
        assert!(state.observation.is_none());

        let again = engine.request_reevaluation(&mut state, true, t0() + Duration::days(21));
        assert_eq!(again.failure, Some(PreconditionFailure::NoActiveObservation));
    }
}
