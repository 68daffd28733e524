//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use steward::api::{
    CeremonyRequest, ErrorResponse, ExitRequest, ExportResponse, HealthResponse, PointsRequest,
    PromotionRequest, StageRequest, TimedRequest, ViolationRequest,
};
use steward_core::{
    ExitKind, ParticipantId, PointsBalanceProvider, StewardError, Tier, TierPair, ViolationKind,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.3.0".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.3.0\""));
}

// =============================================================================
// ERROR RESPONSE TESTS
// =============================================================================

#[test]
fn test_error_codes_follow_error_kind() {
    let cases = [
        (
            StewardError::UnknownTierPair("L9_L10".to_string()),
            "unknown_tier_pair",
        ),
        (
            StewardError::MissingPolicy(ViolationKind::EthicsRedline),
            "missing_policy",
        ),
        (
            StewardError::MissingThreshold(TierPair::L2L3),
            "missing_threshold",
        ),
        (
            StewardError::ParticipantNotFound(ParticipantId::new("p")),
            "participant_not_found",
        ),
        (
            StewardError::InvalidInput("bad".to_string()),
            "invalid_input",
        ),
    ];

    for (err, code) in cases {
        let response = ErrorResponse::from_error(&err);
        assert!(!response.success);
        assert_eq!(response.code, code);
        assert_eq!(response.error, err.to_string());
    }
}

// =============================================================================
// REQUEST DESERIALIZATION TESTS
// =============================================================================

#[test]
fn test_timed_request_accepts_empty_body() {
    let request: TimedRequest = serde_json::from_str("{}").unwrap();
    assert!(request.at.is_none());

    let request: TimedRequest = serde_json::from_str(r#"{"at":"2024-03-01T12:00:00Z"}"#).unwrap();
    assert_eq!(request.at.unwrap().to_rfc3339(), "2024-03-01T12:00:00+00:00");
}

#[test]
fn test_stage_request_defaults_missing_metrics() {
    let request: StageRequest =
        serde_json::from_str(r#"{"metrics":{"weekly_feedback_count":4}}"#).unwrap();
    assert_eq!(request.metrics.weekly_feedback_count, 4);
    assert!(!request.metrics.authorization_signed);
    assert_eq!(request.metrics.pathway_adherence_percent, 0);
}

#[test]
fn test_promotion_request_facts_optional() {
    let request: PromotionRequest = serde_json::from_str(r#"{"pair":"L1_L2"}"#).unwrap();
    assert_eq!(request.pair, "L1_L2");
    assert!(request.facts.is_none());

    let request: PromotionRequest =
        serde_json::from_str(r#"{"pair":"L1_L2","facts":{"companions":{"total":5,"progressed":3,"advanced":1}}}"#)
            .unwrap();
    let facts = request.facts.unwrap();
    assert_eq!(facts.companions.total, 5);
    assert!(facts.exams.is_empty());
}

#[test]
fn test_ceremony_request_parses_tier_and_exams() {
    let json = r#"{
        "from_tier": "L2",
        "facts": {
            "companions": {"total": 6, "progressed": 3, "advanced": 2},
            "exams": {"mentor_certification": true},
            "ethics": {"ethics_review": false}
        }
    }"#;
    let request: CeremonyRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.from_tier, Tier::L2);
    let facts = request.facts.unwrap();
    assert_eq!(facts.companions.advanced, 2);
    assert_eq!(facts.exams.get("mentor_certification"), Some(&true));
    assert_eq!(facts.ethics.get("ethics_review"), Some(&false));
}

#[test]
fn test_points_request_is_a_balance_provider() {
    let request: PointsRequest = serde_json::from_str(
        r#"{"balances":{"growth":120,"contribution":15,"influence":3}}"#,
    )
    .unwrap();
    let balances = request.balances(&ParticipantId::new("p-1")).unwrap();
    assert_eq!(balances.growth, 120);
    assert_eq!(balances.contribution, 15);
    assert_eq!(balances.influence, 3);
}

// =============================================================================
// VIOLATION & EXIT REQUEST TESTS
// =============================================================================

fn violation(kind: &str) -> ViolationRequest {
    ViolationRequest {
        kind: kind.to_string(),
        description: "test".to_string(),
        at: None,
    }
}

#[test]
fn test_violation_kind_resolution() {
    assert_eq!(
        violation("minor_complaint").explicit_kind().unwrap(),
        Some(ViolationKind::MinorComplaint)
    );
    assert_eq!(
        violation("ethics_redline").explicit_kind().unwrap(),
        Some(ViolationKind::EthicsRedline)
    );
    assert_eq!(violation("overreach").explicit_kind().unwrap(), None);
    assert_eq!(violation(" Overreach ").explicit_kind().unwrap(), None);
    assert!(matches!(
        violation("littering").explicit_kind(),
        Err(StewardError::UnknownViolationKind(_))
    ));
}

#[test]
fn test_exit_kind_parsing() {
    let mut request = ExitRequest {
        kind: "voluntary".to_string(),
        reason: "moving away".to_string(),
        at: None,
    };
    assert_eq!(request.exit_kind().unwrap(), ExitKind::Voluntary);

    request.kind = "forced".to_string();
    assert_eq!(request.exit_kind().unwrap(), ExitKind::Forced);

    request.kind = "paused".to_string();
    assert!(matches!(
        request.exit_kind(),
        Err(StewardError::InvalidInput(_))
    ));
}

// =============================================================================
// EXPORT RESPONSE TESTS
// =============================================================================

#[test]
fn test_export_response_success() {
    let response = ExportResponse::success(b"STWD", 42, "abcd".to_string());
    assert!(response.success);
    assert_eq!(response.data.as_deref(), Some("U1RXRA=="));
    assert_eq!(response.checksum, Some(42));
    assert_eq!(response.hash.as_deref(), Some("abcd"));
    assert!(response.error.is_none());
}

#[test]
fn test_export_response_error() {
    let response = ExportResponse::error("Export failed");
    assert!(!response.success);
    assert!(response.data.is_none());

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":false"));
    assert!(json.contains("Export failed"));
}
