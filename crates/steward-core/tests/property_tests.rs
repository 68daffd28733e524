//! # Property-Based Tests
//!
//! Invariants of the stage machine, the points gates, the stability counter
//! and the determinism of promotion checks.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use steward_core::{
    AdvisoryGate, CompanionSummary, GovernanceConfig, GovernanceEngine, ParticipantId,
    ParticipantLifecycleState, PointBalances, PointsGate, ProgressionState, PromotionEngine,
    PromotionFacts, StabilityWindow, Stage, StageEngine, StageMetrics, StageOutcome, Tier,
    TierPair, ViolationKind,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date")
}

fn metrics_strategy() -> impl Strategy<Value = StageMetrics> {
    (
        any::<bool>(),
        any::<bool>(),
        0u32..20,
        0u32..5,
        0u32..20,
        0u8..=100,
        any::<bool>(),
        0u8..=100,
        any::<bool>(),
    )
        .prop_map(
            |(auth, assess, feedback, points, trials, volatility, severe, adherence, ceremony)| {
                StageMetrics {
                    authorization_signed: auth,
                    initial_assessment_completed: assess,
                    weekly_feedback_count: feedback,
                    interruption_points_identified: points,
                    trial_attempts_completed: trials,
                    attempt_volatility_percent: volatility,
                    severe_regression: severe,
                    pathway_adherence_percent: adherence,
                    ceremony_completed: ceremony,
                }
            },
        )
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop::sample::select(Stage::ALL.to_vec())
}

fn window_strategy() -> impl Strategy<Value = StabilityWindow> {
    (0u8..=100, 0u32..10, 0u32..3).prop_map(|(retention, gap, interventions)| StabilityWindow {
        retention_percent: retention,
        max_gap_days: gap,
        coach_interventions: interventions,
    })
}

proptest! {
    /// Every applied stage move is advance-by-one, hold, S3 → S2, or graduation.
    #[test]
    fn stage_moves_are_sanctioned(
        stage in stage_strategy(),
        metrics in metrics_strategy(),
        days in 0i64..400,
        counter in 0u32..200,
    ) {
        let engine = GovernanceEngine::default();
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p"), t0());
        state.current_stage = stage;
        state.stability_counter_days = counter;
        let now = t0() + Duration::days(days);

        let evaluation = engine.evaluate_stage(&mut state, &metrics, now).expect("apply");
        prop_assert!(Stage::is_legal_move(stage, state.current_stage));
        if state.current_stage < stage {
            prop_assert_eq!((stage, state.current_stage), (Stage::S3, Stage::S2));
            prop_assert_eq!(evaluation.outcome, StageOutcome::RegressedToS2);
        }
        if evaluation.outcome == StageOutcome::Graduated {
            prop_assert_eq!(stage, Stage::S5);
            prop_assert!(state.is_graduated());
        }
    }

    /// S2 never regresses, whatever the metrics.
    #[test]
    fn s2_never_regresses(metrics in metrics_strategy()) {
        let config = GovernanceConfig::builtin();
        let engine = StageEngine::new(&config.stage_rules);
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p"), t0());
        state.current_stage = Stage::S2;

        let outcome = engine.evaluate(&state, &metrics, t0()).outcome;
        prop_assert!(matches!(outcome, StageOutcome::Advanced | StageOutcome::Stayed));
    }

    /// The counter counts consecutive passing windows and resets to zero on a failure.
    #[test]
    fn stability_counter_counts_unbroken_runs(windows in prop::collection::vec(window_strategy(), 1..60)) {
        let config = GovernanceConfig::builtin();
        let rules = &config.stage_rules;
        let engine = StageEngine::new(rules);
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p"), t0());

        let mut expected = 0u32;
        for window in &windows {
            let before = state.stability_counter_days;
            let verified = engine.check_stability(&mut state, window);
            if window.holds(&rules.stability) {
                expected += 1;
                prop_assert_eq!(state.stability_counter_days, before + 1);
            } else {
                expected = 0;
                prop_assert_eq!(state.stability_counter_days, 0);
            }
            prop_assert_eq!(verified, expected >= rules.stability.required_days);
        }
        prop_assert_eq!(state.stability_counter_days, expected);
    }

    /// An advisory gate passes any balance.
    #[test]
    fn advisory_gate_always_passes(
        growth in 0u64..1_000,
        contribution in 0u64..1_000,
        influence in 0u64..1_000,
    ) {
        let config = GovernanceConfig::builtin();
        let threshold = config.threshold(TierPair::L1L2).expect("threshold");
        prop_assert!(!threshold.is_hard_gate());
        let result = AdvisoryGate.evaluate(
            &PointBalances::new(growth, contribution, influence),
            &threshold.min_points,
        );
        prop_assert!(result.passed);
    }

    /// Same state, facts and time give an identical result.
    #[test]
    fn promotion_check_is_deterministic(
        growth in 0u64..500,
        total in 0u32..8,
        progressed in 0u32..8,
        advanced in 0u32..8,
        counter in 0u32..150,
        days in 0i64..200,
    ) {
        let config = GovernanceConfig::builtin();
        let engine = PromotionEngine::new(&config);
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p"), t0());
        state.points = PointBalances::new(growth, 0, 0);
        state.stability_counter_days = counter;
        let facts = PromotionFacts {
            companions: CompanionSummary { total, progressed, advanced },
            ..PromotionFacts::default()
        };
        let now = t0() + Duration::days(days);

        let first = engine.check(&state, TierPair::L0L1, &facts, now).expect("check");
        let second = engine.check(&state, TierPair::L0L1, &facts, now).expect("check");
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            first.state,
            ProgressionState::determine(first.points.passed, first.growth.passed)
        );
    }

    /// Point balances never underflow, whatever the violation sequence.
    #[test]
    fn violations_never_underflow_points(
        growth in 0u64..200,
        contribution in 0u64..50,
        kinds in prop::collection::vec(0usize..4, 1..10),
    ) {
        let engine = GovernanceEngine::default();
        let mut state = ParticipantLifecycleState::enroll(ParticipantId::new("p"), t0());
        state.current_tier = Tier::L3;
        state.points = PointBalances::new(growth, contribution, 0);
        let choices = [
            ViolationKind::MinorComplaint,
            ViolationKind::FirstOverreach,
            ViolationKind::SecondOverreach,
            ViolationKind::KpiUnderperformance,
        ];

        let mut total_before = state.points.total();
        for index in kinds {
            let outcome = engine
                .process_violation_kind(&mut state, choices[index], "generated", t0())
                .expect("violation");
            prop_assert_eq!(
                state.points.total(),
                total_before - outcome.penalty_applied.total()
            );
            total_before = state.points.total();
        }
        prop_assert!(state.current_tier >= Tier::L0);
    }
}
