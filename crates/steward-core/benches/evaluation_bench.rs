//! # Evaluation Benchmarks
//!
//! Performance benchmarks for steward-core evaluations.
//!
//! Run with: `cargo bench -p steward-core`

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use steward_core::{
    CompanionSummary, GovernanceEngine, ParticipantLifecycleState, PointBalances, PromotionFacts,
    StabilityWindow, StageMetrics, Tier, ViolationKind, state_from_bytes, state_to_bytes,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date")
}

/// A participant at L2 with `violations` records on file.
fn seasoned_participant(engine: &GovernanceEngine, violations: usize) -> ParticipantLifecycleState {
    let mut state = engine.enroll("bench", t0()).expect("enroll");
    state.current_tier = Tier::L2;
    state.points = PointBalances::new(1_000_000, 1_000_000, 0);
    for i in 0..violations {
        engine
            .process_violation_kind(
                &mut state,
                ViolationKind::MinorComplaint,
                "bench",
                t0() + Duration::days(i as i64),
            )
            .expect("violation");
    }
    state
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_stage_evaluation(c: &mut Criterion) {
    let engine = GovernanceEngine::default();
    let metrics = StageMetrics {
        authorization_signed: true,
        initial_assessment_completed: true,
        weekly_feedback_count: 3,
        interruption_points_identified: 1,
        trial_attempts_completed: 5,
        pathway_adherence_percent: 85,
        ..StageMetrics::default()
    };

    c.bench_function("stage_walk_s0_to_s4", |b| {
        b.iter(|| {
            let mut state = engine.enroll("bench", t0()).expect("enroll");
            let mut now = t0();
            for _ in 0..4 {
                now += Duration::days(30);
                let _ = engine.evaluate_stage(&mut state, &metrics, now);
            }
            black_box(state)
        });
    });

    let window = StabilityWindow {
        retention_percent: 90,
        max_gap_days: 1,
        coach_interventions: 0,
    };
    c.bench_function("stability_90_windows", |b| {
        b.iter(|| {
            let mut state = engine.enroll("bench", t0()).expect("enroll");
            for _ in 0..90 {
                black_box(engine.check_stability(&mut state, &window));
            }
        });
    });
}

fn bench_promotion_check(c: &mut Criterion) {
    let engine = GovernanceEngine::default();
    let mut group = c.benchmark_group("promotion_check");

    for violations in [0, 10, 100].iter() {
        let state = seasoned_participant(&engine, *violations);
        let mut facts = PromotionFacts {
            companions: CompanionSummary {
                total: 6,
                progressed: 3,
                advanced: 2,
            },
            ..PromotionFacts::default()
        };
        facts.exams.insert("mentor_certification".to_string(), true);
        facts.ethics.insert("ethics_review".to_string(), true);
        let now = t0() + Duration::days(400);

        group.bench_with_input(
            BenchmarkId::from_parameter(violations),
            &state,
            |b, state| {
                b.iter(|| {
                    let result = engine
                        .check_promotion(state, "L2_L3", &facts, now)
                        .expect("check");
                    black_box(engine.analyze_gaps(&result))
                });
            },
        );
    }

    group.finish();
}

fn bench_violation_processing(c: &mut Criterion) {
    let engine = GovernanceEngine::default();
    let mut group = c.benchmark_group("violation_processing");

    for violations in [0, 10, 100].iter() {
        let state = seasoned_participant(&engine, *violations);

        group.bench_with_input(
            BenchmarkId::from_parameter(violations),
            &state,
            |b, state| {
                b.iter(|| {
                    let mut state = state.clone();
                    let outcome = engine
                        .process_violation_kind(
                            &mut state,
                            ViolationKind::FirstOverreach,
                            "bench",
                            t0() + Duration::days(500),
                        )
                        .expect("violation");
                    black_box(outcome)
                });
            },
        );
    }

    group.finish();
}

fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let engine = GovernanceEngine::default();
    let mut group = c.benchmark_group("snapshot_roundtrip");

    for violations in [0, 10, 100].iter() {
        let state = seasoned_participant(&engine, *violations);

        group.bench_with_input(
            BenchmarkId::from_parameter(violations),
            &state,
            |b, state| {
                b.iter(|| {
                    let bytes = state_to_bytes(state).expect("encode");
                    black_box(state_from_bytes(&bytes).expect("decode"))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stage_evaluation,
    bench_promotion_check,
    bench_violation_processing,
    bench_snapshot_roundtrip,
);

criterion_main!(benches);
