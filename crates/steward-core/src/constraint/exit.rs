//! # Exit and Recovery
//!
//! - Voluntary exit freezes points and opens a recovery window
//! - Forced exit clears points, sets the removed marker, never recoverable
//! - Recovery checks run in a fixed order: exit record, eligibility, deadline

use crate::config::GovernanceConfig;
use crate::state::{ExitRecord, ParticipantLifecycleState};
use crate::types::{ExitKind, PreconditionFailure, StewardError, Tier};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Ordered steps back into the program.
pub const RECOVERY_STEPS: [&str; 4] = [
    "re-application",
    "capability re-evaluation",
    "reviewer interview",
    "reinstatement with point unfreezing",
];

/// Result of [`ExitEngine::request_recovery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub eligible: bool,
    pub reason: String,
    pub failure: Option<PreconditionFailure>,
    pub recovery_steps: Option<Vec<String>>,
    pub recovery_deadline: Option<DateTime<Utc>>,
}

impl RecoveryOutcome {
    fn refused(failure: PreconditionFailure, deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            eligible: false,
            reason: failure.message().to_string(),
            failure: Some(failure),
            recovery_steps: None,
            recovery_deadline: deadline,
        }
    }
}

/// Result of [`ExitEngine::reinstate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinstatementOutcome {
    pub reinstated: bool,
    pub tier: Tier,
    pub failure: Option<PreconditionFailure>,
}

/// Exit processing bound to one configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExitEngine<'a> {
    config: &'a GovernanceConfig,
}

impl<'a> ExitEngine<'a> {
    #[must_use]
    pub fn new(config: &'a GovernanceConfig) -> Self {
        Self { config }
    }

    /// Record an exit.
    ///
    /// Exiting an already exited participant returns the existing record,
    /// except that a forced exit supersedes a voluntary one.
    pub fn process_exit(
        &self,
        state: &mut ParticipantLifecycleState,
        kind: ExitKind,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ExitRecord, StewardError> {
        if let Some(existing) = state
            .exit_record
            .as_ref()
            .filter(|record| record.reinstated_at.is_none())
        {
            let supersede = existing.kind == ExitKind::Voluntary && kind == ExitKind::Forced;
            if !supersede {
                return Ok(existing.clone());
            }
        }

        let record = match kind {
            ExitKind::Voluntary => {
                let months = self.config.protection.recovery_months;
                let deadline = now.checked_add_months(Months::new(months)).ok_or_else(|| {
                    StewardError::InvalidConfig(format!(
                        "recovery deadline {} months after {} is out of range",
                        months, now
                    ))
                })?;
                state.points_frozen = true;
                ExitRecord {
                    kind,
                    reason: reason.to_string(),
                    exited_at: now,
                    points_at_exit: state.points,
                    points_frozen: true,
                    points_cleared: false,
                    tier_at_exit: state.current_tier,
                    recovery_eligible: true,
                    recovery_deadline: Some(deadline),
                    reinstated_at: None,
                }
            }
            ExitKind::Forced => {
                // A superseded voluntary exit already froze the balances.
                let points_at_exit = state.points;
                let tier_at_exit = state
                    .exit_record
                    .as_ref()
                    .filter(|r| r.reinstated_at.is_none())
                    .map_or(state.current_tier, |r| r.tier_at_exit);
                state.points.clear();
                state.points_frozen = false;
                state.current_tier = Tier::Removed;
                state.observation = None;
                state.supervision_until = None;
                state.protection_until = None;
                ExitRecord {
                    kind,
                    reason: reason.to_string(),
                    exited_at: now,
                    points_at_exit,
                    points_frozen: false,
                    points_cleared: true,
                    tier_at_exit,
                    recovery_eligible: false,
                    recovery_deadline: None,
                    reinstated_at: None,
                }
            }
        };
        state.exit_record = Some(record.clone());
        Ok(record)
    }

    /// Check whether the participant may start the recovery steps.
    #[must_use]
    pub fn request_recovery(
        &self,
        state: &ParticipantLifecycleState,
        now: DateTime<Utc>,
    ) -> RecoveryOutcome {
        let Some(record) = &state.exit_record else {
            return RecoveryOutcome::refused(PreconditionFailure::NoExitRecord, None);
        };
        if record.reinstated_at.is_some() {
            return RecoveryOutcome::refused(
                PreconditionFailure::AlreadyReinstated,
                record.recovery_deadline,
            );
        }
        let deadline = match (record.recovery_eligible, record.recovery_deadline) {
            (true, Some(deadline)) => deadline,
            _ => {
                return RecoveryOutcome::refused(PreconditionFailure::ExitNotRecoverable, None);
            }
        };
        if now > deadline {
            return RecoveryOutcome::refused(
                PreconditionFailure::RecoveryWindowExpired,
                Some(deadline),
            );
        }

        RecoveryOutcome {
            eligible: true,
            reason: format!("recovery open until {}", deadline.format("%Y-%m-%d")),
            failure: None,
            recovery_steps: Some(RECOVERY_STEPS.iter().map(|s| s.to_string()).collect()),
            recovery_deadline: Some(deadline),
        }
    }

    /// Final recovery step: unfreeze points and restore the tier held at exit.
    #[must_use]
    pub fn reinstate(
        &self,
        state: &mut ParticipantLifecycleState,
        now: DateTime<Utc>,
    ) -> ReinstatementOutcome {
        let check = self.request_recovery(state, now);
        if let Some(failure) = check.failure {
            return ReinstatementOutcome {
                reinstated: false,
                tier: state.current_tier,
                failure: Some(failure),
            };
        }
        let Some(record) = state.exit_record.as_mut() else {
            return ReinstatementOutcome {
                reinstated: false,
                tier: state.current_tier,
                failure: Some(PreconditionFailure::NoExitRecord),
            };
        };

        record.reinstated_at = Some(now);
        state.current_tier = record.tier_at_exit;
        state.tier_entered_at = now;
        state.points_frozen = false;
        ReinstatementOutcome {
            reinstated: true,
            tier: state.current_tier,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParticipantId, PointBalances};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn member() -> ParticipantLifecycleState {
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p-1"), t0());
        state.current_tier = Tier::L2;
        state.points = PointBalances::new(400, 80, 10);
        state
    }

    #[test]
    fn voluntary_exit_freezes_points() {
        let config = GovernanceConfig::builtin();
        let mut state = member();
        let record = ExitEngine::new(&config)
            .process_exit(&mut state, ExitKind::Voluntary, "moving abroad", t0())
            .expect("exit");

        assert!(record.points_frozen && record.recovery_eligible);
        assert_eq!(state.points, PointBalances::new(400, 80, 10));
        assert!(state.points_frozen);
        assert_eq!(state.current_tier, Tier::L2);
        assert!(state.is_exited());
    }

    #[test]
    fn forced_exit_clears_and_removes() {
        let config = GovernanceConfig::builtin();
        let mut state = member();
        let record = ExitEngine::new(&config)
            .process_exit(&mut state, ExitKind::Forced, "policy breach", t0())
            .expect("exit");

        assert!(record.points_cleared && !record.recovery_eligible);
        assert_eq!(record.points_at_exit.total(), 490);
        assert_eq!(state.points.total(), 0);
        assert_eq!(state.current_tier, Tier::Removed);
    }

    #[test]
    fn repeated_exit_is_idempotent_but_forced_supersedes() {
        let config = GovernanceConfig::builtin();
        let engine = ExitEngine::new(&config);
        let mut state = member();
        let first = engine
            .process_exit(&mut state, ExitKind::Voluntary, "first", t0())
            .expect("exit");
        let again = engine
            .process_exit(&mut state, ExitKind::Voluntary, "second", t0() + Duration::days(3))
            .expect("exit");
        assert_eq!(first, again);

        let forced = engine
            .process_exit(&mut state, ExitKind::Forced, "forced", t0() + Duration::days(4))
            .expect("exit");
        assert_eq!(forced.kind, ExitKind::Forced);
        assert_eq!(forced.tier_at_exit, Tier::L2);
        assert_eq!(state.current_tier, Tier::Removed);
    }

    #[test]
    fn recovery_checks_run_in_order() {
        let config = GovernanceConfig::builtin();
        let engine = ExitEngine::new(&config);
        let mut state = member();
        assert_eq!(
            engine.request_recovery(&state, t0()).failure,
            Some(PreconditionFailure::NoExitRecord)
        );

        engine
            .process_exit(&mut state, ExitKind::Voluntary, "break", t0())
            .expect("exit");
        let outcome = engine.request_recovery(&state, t0() + Duration::days(30));
        assert!(outcome.eligible);
        assert_eq!(
            outcome.recovery_steps,
            Some(RECOVERY_STEPS.iter().map(|s| s.to_string()).collect())
        );
    }

    #[test]
    fn recovery_deadline_is_twelve_calendar_months() {
        let config = GovernanceConfig::builtin();
        let engine = ExitEngine::new(&config);
        let mut state = member();
        engine
            .process_exit(&mut state, ExitKind::Voluntary, "break", t0())
            .expect("exit");

        let deadline = t0()
            .checked_add_months(Months::new(12))
            .expect("in range");
        assert!(engine.request_recovery(&state, deadline).eligible);
        assert_eq!(
            engine
                .request_recovery(&state, deadline + Duration::days(1))
                .failure,
            Some(PreconditionFailure::RecoveryWindowExpired)
        );
    }

    #[test]
    fn reinstatement_restores_tier_and_unfreezes() {
        let config = GovernanceConfig::builtin();
        let engine = ExitEngine::new(&config);
        let mut state = member();
        engine
            .process_exit(&mut state, ExitKind::Voluntary, "break", t0())
            .expect("exit");

        let later = t0() + Duration::days(60);
        let outcome = engine.reinstate(&mut state, later);
        assert!(outcome.reinstated);
        assert_eq!(outcome.tier, Tier::L2);
        assert!(!state.points_frozen);
        assert!(!state.is_exited());

        let twice = engine.reinstate(&mut state, later);
        assert_eq!(twice.failure, Some(PreconditionFailure::AlreadyReinstated));
    }

    #[test]
    fn forced_exit_is_never_recoverable() {
        let config = GovernanceConfig::builtin();
        let engine = ExitEngine::new(&config);
        let mut state = member();
        engine
            .process_exit(&mut state, ExitKind::Forced, "removed", t0())
            .expect("exit");
        assert_eq!(
            engine.request_recovery(&state, t0()).failure,
            Some(PreconditionFailure::ExitNotRecoverable)
        );
    }
}
