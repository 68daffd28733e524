//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Every time-sensitive request accepts an optional `at` (RFC 3339). When it
//! is absent the server evaluates at its own wall-clock time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steward_core::{
    DualTrackResult, ExitKind, GapReport, GovernanceConfig, ParticipantId,
    ParticipantLifecycleState, PointBalances, PointsBalanceProvider, PromotionFacts,
    StabilityWindow, StageMetrics, StageProgress, StewardError, Tier,
    ViolationKind,
};

/// Keyword that asks the server to classify an overreach report itself.
pub const OVERREACH_KEYWORD: &str = "overreach";

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable machine-readable error class.
    pub code: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            error: msg.into(),
        }
    }

    /// Map a core error onto its code and message.
    pub fn from_error(err: &StewardError) -> Self {
        let code = match err {
            StewardError::UnknownTierPair(_) => "unknown_tier_pair",
            StewardError::UnknownViolationKind(_) => "unknown_violation_kind",
            StewardError::MissingThreshold(_) => "missing_threshold",
            StewardError::MissingPolicy(_) => "missing_policy",
            StewardError::InvalidConfig(_) => "invalid_config",
            StewardError::InvariantBreach(_) => "invariant_breach",
            StewardError::Provider(_) => "provider_error",
            StewardError::ParticipantNotFound(_) => "participant_not_found",
            StewardError::InvalidInput(_) => "invalid_input",
            StewardError::AlreadyEnrolled(_) => "already_enrolled",
            StewardError::SerializationError(_) | StewardError::DeserializationError(_) => {
                "serialization_error"
            }
            StewardError::IoError(_) => "io_error",
        };
        Self::new(code, err.to_string())
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Active governance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub version: String,
    pub source: String,
    pub config: GovernanceConfig,
}

/// Result of a configuration reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub success: bool,
    /// The version in force after the call.
    pub version: String,
    pub previous_version: String,
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// Enrollment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub participant_id: String,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// A participant's stored state plus derived read-only views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub state: ParticipantLifecycleState,
    pub progress: StageProgress,
    pub protected: bool,
    pub exited: bool,
}

/// Request body carrying only the optional evaluation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimedRequest {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

// =============================================================================
// POINTS
// =============================================================================

/// Balances reported by the points ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsRequest {
    pub balances: PointBalances,
}

/// The request body is the points provider for one refresh.
impl PointsBalanceProvider for PointsRequest {
    fn balances(&self, _participant: &ParticipantId) -> Result<PointBalances, StewardError> {
        Ok(self.balances)
    }
}

/// Result of a points refresh. `updated` is false while points are frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsResponse {
    pub updated: bool,
    pub points: PointBalances,
}

// =============================================================================
// STAGE
// =============================================================================

/// Stage evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRequest {
    pub metrics: StageMetrics,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// Stability window request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityRequest {
    pub window: StabilityWindow,
}

/// Stability counter after recording one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityResponse {
    pub verified_stable: bool,
    pub stability_counter_days: u32,
    pub required_days: u32,
}

// =============================================================================
// PROMOTION
// =============================================================================

/// Dual-track check request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRequest {
    /// Tier-pair key such as `"L0_L1"`.
    pub pair: String,
    /// Companion and exam facts. Refused when the server has a fact source.
    #[serde(default)]
    pub facts: Option<PromotionFacts>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

/// Dual-track result with its gap report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionResponse {
    pub result: DualTrackResult,
    pub gaps: GapReport,
}

/// Ceremony request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeremonyRequest {
    pub from_tier: Tier,
    /// Companion and exam facts. Refused when the server has a fact source.
    #[serde(default)]
    pub facts: Option<PromotionFacts>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

// =============================================================================
// VIOLATIONS
// =============================================================================

/// Violation report.
///
/// `kind` is a violation key, or `"overreach"` to let the server decide
/// between a first and a repeat overreach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRequest {
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

impl ViolationRequest {
    /// Resolve an explicit violation key; `None` for the overreach keyword.
    pub fn explicit_kind(&self) -> Result<Option<ViolationKind>, StewardError> {
        if self.kind.trim().eq_ignore_ascii_case(OVERREACH_KEYWORD) {
            return Ok(None);
        }
        ViolationKind::from_key(&self.kind).map(Some)
    }
}

/// Reviewer decision on a violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub upheld: bool,
}

/// Capability re-evaluation result during observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReevaluationRequest {
    pub passed: bool,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

// =============================================================================
// EXIT
// =============================================================================

/// Exit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitRequest {
    /// `"voluntary"` or `"forced"`.
    pub kind: String,
    pub reason: String,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

impl ExitRequest {
    /// Parse the exit kind.
    pub fn exit_kind(&self) -> Result<ExitKind, StewardError> {
        ExitKind::from_key(&self.kind).ok_or_else(|| {
            StewardError::InvalidInput(format!(
                "Unknown exit kind '{}': expected voluntary or forced",
                self.kind
            ))
        })
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    /// BLAKE3 hex digest of the framed snapshot.
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], checksum: u64, hash: String) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            checksum: Some(checksum),
            hash: Some(hash),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            hash: None,
            error: Some(msg.into()),
        }
    }
}
