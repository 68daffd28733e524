//! # API Endpoint Handlers
//!
//! Each mutating handler runs under the participant's lock:
//! load → evaluate → store. Precondition failures come back as data with
//! 200; only `StewardError`s become non-2xx responses.

use super::{
    AppState,
    types::{
        CeremonyRequest, ConfigResponse, EnrollRequest, ErrorResponse, ExitRequest,
        ExportResponse, HealthResponse, ParticipantResponse, PointsRequest, PointsResponse,
        PromotionRequest, PromotionResponse,
        ReevaluationRequest, ReloadResponse, ResolveRequest, StabilityRequest, StabilityResponse,
        StageRequest, TimedRequest, ViolationRequest,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use steward_core::{
    CeremonyOutcome, DisplayPermissions, ExitRecord, FactSource, GovernanceEngine, ParticipantId,
    ParticipantLifecycleState, PromotionFacts, RecoveryOutcome, ReevaluationOutcome,
    ReinstatementOutcome, ReviewOutcome, StageEvaluation, StewardError, ViolationOutcome,
    state_checksum, state_crypto_hash, state_to_bytes,
};

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for a core error.
pub fn status_for(err: &StewardError) -> StatusCode {
    match err {
        StewardError::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
        StewardError::AlreadyEnrolled(_) => StatusCode::CONFLICT,
        StewardError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        StewardError::UnknownTierPair(_) | StewardError::UnknownViolationKind(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StewardError::Provider(_) => StatusCode::BAD_GATEWAY,
        StewardError::MissingThreshold(_)
        | StewardError::MissingPolicy(_)
        | StewardError::InvalidConfig(_)
        | StewardError::InvariantBreach(_)
        | StewardError::SerializationError(_)
        | StewardError::DeserializationError(_)
        | StewardError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: StewardError) -> ApiError {
    respond_error(status_for(&err), &err)
}

fn respond_error(status: StatusCode, err: &StewardError) -> ApiError {
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "Request failed");
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "Request rejected");
    }
    (status, Json(ErrorResponse::from_error(err)))
}

// =============================================================================
// PARTICIPANT ACCESS
// =============================================================================

async fn load(state: &AppState, raw_id: &str) -> Result<ParticipantLifecycleState, StewardError> {
    let id = ParticipantId::parse(raw_id)?;
    state.store.read().await.load(&id)
}

/// Run `operation` on one participant under its lock and store the result.
///
/// Nothing is written back when the operation returns an error.
async fn mutate<T>(
    state: &AppState,
    raw_id: &str,
    operation: impl FnOnce(&GovernanceEngine, &mut ParticipantLifecycleState) -> Result<T, StewardError>,
) -> Result<T, StewardError> {
    let id = ParticipantId::parse(raw_id)?;
    let _guard = state.lock_participant(&id).await;

    let engine = state.engine().await;
    let mut participant = state.store.read().await.load(&id)?;
    let output = operation(&engine, &mut participant)?;
    state.store.write().await.put(&participant)?;
    Ok(output)
}

/// Where a promotion evaluation takes its facts from.
enum FactInput {
    Source(Arc<dyn FactSource>),
    Body(PromotionFacts),
}

fn fact_input(state: &AppState, body: Option<PromotionFacts>) -> Result<FactInput, StewardError> {
    match (state.fact_source(), body) {
        (Some(_), Some(_)) => Err(StewardError::InvalidInput(
            "facts come from the server's fact source; remove `facts` from the request"
                .to_string(),
        )),
        (Some(source), None) => Ok(FactInput::Source(source)),
        (None, body) => Ok(FactInput::Body(body.unwrap_or_default())),
    }
}

fn participant_view(
    engine: &GovernanceEngine,
    participant: ParticipantLifecycleState,
    now: DateTime<Utc>,
) -> ParticipantResponse {
    ParticipantResponse {
        progress: engine.stage_progress(&participant, now),
        protected: participant.is_protected(now),
        exited: participant.is_exited(),
        state: participant,
    }
}

// =============================================================================
// HEALTH & CONFIG
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Active configuration.
pub async fn config_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config().await;
    Json(ConfigResponse {
        version: config.version.clone(),
        source: state.config_source(),
        config: (*config).clone(),
    })
}

/// Re-read the governance file. A failed reload keeps the previous config.
pub async fn reload_handler(State(state): State<AppState>) -> ApiResult<ReloadResponse> {
    match state.reload_config().await {
        Ok((previous_version, version)) => {
            tracing::info!(
                operation = "config_reload",
                previous = %previous_version,
                version = %version,
                "Governance configuration reloaded"
            );
            Ok(Json(ReloadResponse {
                success: true,
                version,
                previous_version,
            }))
        }
        Err(e) => {
            tracing::warn!(
                operation = "config_reload",
                error = %e,
                "Reload failed, keeping previous configuration"
            );
            let status = if e.is_configuration_error() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                status_for(&e)
            };
            Err(respond_error(status, &e))
        }
    }
}

// =============================================================================
// ENROLLMENT & READS
// =============================================================================

/// Enroll a new participant at S0 / L0.
pub async fn enroll_handler(
    State(state): State<AppState>,
    Json(request): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<ParticipantResponse>), ApiError> {
    let now = request.at.unwrap_or_else(Utc::now);
    let engine = state.engine().await;
    let participant = engine
        .enroll(&request.participant_id, now)
        .map_err(api_error)?;

    let id = participant.participant_id.clone();
    let _guard = state.lock_participant(&id).await;
    {
        let mut store = state.store.write().await;
        if store.contains(&id).map_err(api_error)? {
            return Err(api_error(StewardError::AlreadyEnrolled(id)));
        }
        store.put(&participant).map_err(api_error)?;
    }

    tracing::info!(participant = %id, operation = "enroll", "Participant enrolled");
    Ok((
        StatusCode::CREATED,
        Json(participant_view(&engine, participant, now)),
    ))
}

/// Stored state plus stage progress.
pub async fn participant_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ParticipantResponse> {
    let participant = load(&state, &id).await.map_err(api_error)?;
    let engine = state.engine().await;
    Ok(Json(participant_view(&engine, participant, Utc::now())))
}

/// Display permissions for the participant's current stage.
pub async fn permissions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DisplayPermissions> {
    let participant = load(&state, &id).await.map_err(api_error)?;
    let engine = state.engine().await;
    Ok(Json(engine.display_permissions(participant.current_stage)))
}

/// Overwrite balances from the points ledger. Frozen points stay as they are.
pub async fn points_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PointsRequest>,
) -> ApiResult<PointsResponse> {
    let response = mutate(&state, &id, |engine, participant| {
        let updated = engine.refresh_points(participant, &request)?;
        Ok(PointsResponse {
            updated,
            points: participant.points,
        })
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "points",
        updated = response.updated,
        "Point balances refreshed"
    );
    Ok(Json(response))
}

// =============================================================================
// STAGE HANDLERS
// =============================================================================

/// Evaluate and apply a stage transition.
pub async fn stage_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StageRequest>,
) -> ApiResult<StageEvaluation> {
    let now = request.at.unwrap_or_else(Utc::now);
    let evaluation = mutate(&state, &id, |engine, participant| {
        engine.evaluate_stage(participant, &request.metrics, now)
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "stage",
        outcome = ?evaluation.outcome,
        reason = %evaluation.reason,
        "Stage evaluated"
    );
    Ok(Json(evaluation))
}

/// Record one stability window.
pub async fn stability_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StabilityRequest>,
) -> ApiResult<StabilityResponse> {
    let response = mutate(&state, &id, |engine, participant| {
        let verified_stable = engine.check_stability(participant, &request.window);
        Ok(StabilityResponse {
            verified_stable,
            stability_counter_days: participant.stability_counter_days,
            required_days: engine.config().stage_rules.stability.required_days,
        })
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "stability",
        counter = response.stability_counter_days,
        verified = response.verified_stable,
        "Stability window recorded"
    );
    Ok(Json(response))
}

// =============================================================================
// PROMOTION HANDLERS
// =============================================================================

/// Dual-track check with its gap report. Read-only.
pub async fn promotion_check_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PromotionRequest>,
) -> ApiResult<PromotionResponse> {
    let now = request.at.unwrap_or_else(Utc::now);
    let facts = fact_input(&state, request.facts).map_err(api_error)?;
    let participant = load(&state, &id).await.map_err(api_error)?;
    let engine = state.engine().await;
    let result = match facts {
        FactInput::Source(source) => engine.check_promotion_with(
            &participant,
            &request.pair,
            source.collaborators(),
            now,
        ),
        FactInput::Body(facts) => engine.check_promotion(&participant, &request.pair, &facts, now),
    }
    .map_err(api_error)?;
    let gaps = engine.analyze_gaps(&result);

    tracing::debug!(
        participant = %id,
        operation = "promotion_check",
        pair = %result.pair,
        state = %result.state,
        gaps = gaps.gaps.len(),
        "Promotion checked"
    );
    Ok(Json(PromotionResponse { result, gaps }))
}

/// Run a promotion ceremony.
pub async fn ceremony_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CeremonyRequest>,
) -> ApiResult<CeremonyOutcome> {
    let now = request.at.unwrap_or_else(Utc::now);
    let facts = fact_input(&state, request.facts).map_err(api_error)?;
    let outcome = mutate(&state, &id, |engine, participant| match facts {
        FactInput::Source(source) => {
            engine.initiate_ceremony_with(participant, request.from_tier, source.collaborators(), now)
        }
        FactInput::Body(facts) => {
            engine.initiate_ceremony(participant, request.from_tier, &facts, now)
        }
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "ceremony",
        success = outcome.success,
        from = %outcome.previous_tier,
        failure = ?outcome.failure,
        "Ceremony processed"
    );
    Ok(Json(outcome))
}

// =============================================================================
// VIOLATION HANDLERS
// =============================================================================

/// Record a violation.
pub async fn violation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ViolationRequest>,
) -> ApiResult<ViolationOutcome> {
    let now = request.at.unwrap_or_else(Utc::now);
    let explicit = request.explicit_kind().map_err(api_error)?;
    let outcome = mutate(&state, &id, |engine, participant| {
        let kind = explicit.unwrap_or_else(|| engine.classify_overreach(participant));
        engine.process_violation_kind(participant, kind, &request.description, now)
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "violation",
        kind = %outcome.kind,
        waived = outcome.penalty_applied.waived,
        demoted = outcome.demotion.is_some(),
        exited = outcome.exit_triggered.is_some(),
        failure = ?outcome.failure,
        "Violation processed"
    );
    Ok(Json(outcome))
}

/// File an appeal against a violation.
pub async fn appeal_handler(
    State(state): State<AppState>,
    Path((id, violation_id)): Path<(String, String)>,
    Json(request): Json<TimedRequest>,
) -> ApiResult<ReviewOutcome> {
    let now = request.at.unwrap_or_else(Utc::now);
    let outcome = mutate(&state, &id, |engine, participant| {
        Ok(engine.file_appeal(participant, &violation_id, now))
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "appeal",
        violation = %violation_id,
        accepted = outcome.accepted,
        "Appeal processed"
    );
    Ok(Json(outcome))
}

/// Record the reviewer's decision on a violation.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path((id, violation_id)): Path<(String, String)>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<ReviewOutcome> {
    let outcome = mutate(&state, &id, |engine, participant| {
        Ok(engine.resolve_violation(participant, &violation_id, request.upheld))
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "resolve",
        violation = %violation_id,
        status = ?outcome.status,
        refunded = outcome.refunded.total(),
        "Violation resolved"
    );
    Ok(Json(outcome))
}

/// Capability re-evaluation during an observation period.
pub async fn reevaluation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReevaluationRequest>,
) -> ApiResult<ReevaluationOutcome> {
    let now = request.at.unwrap_or_else(Utc::now);
    let outcome = mutate(&state, &id, |engine, participant| {
        Ok(engine.request_reevaluation(participant, request.passed, now))
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "reevaluation",
        restored = outcome.restored,
        tier = %outcome.tier,
        "Re-evaluation processed"
    );
    Ok(Json(outcome))
}

// =============================================================================
// EXIT HANDLERS
// =============================================================================

/// Voluntary or forced exit.
pub async fn exit_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ExitRequest>,
) -> ApiResult<ExitRecord> {
    let now = request.at.unwrap_or_else(Utc::now);
    let kind = request.exit_kind().map_err(api_error)?;
    let record = mutate(&state, &id, |engine, participant| {
        engine.process_exit(participant, kind, &request.reason, now)
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "exit",
        kind = ?record.kind,
        recovery_eligible = record.recovery_eligible,
        "Exit recorded"
    );
    Ok(Json(record))
}

/// Recovery eligibility. Read-only.
pub async fn recovery_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TimedRequest>,
) -> ApiResult<RecoveryOutcome> {
    let now = request.at.unwrap_or_else(Utc::now);
    let participant = load(&state, &id).await.map_err(api_error)?;
    let engine = state.engine().await;
    let outcome = engine.request_recovery(&participant, now);

    tracing::debug!(
        participant = %id,
        operation = "recovery",
        eligible = outcome.eligible,
        "Recovery requested"
    );
    Ok(Json(outcome))
}

/// Complete recovery and restore the tier held at exit.
pub async fn reinstate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TimedRequest>,
) -> ApiResult<ReinstatementOutcome> {
    let now = request.at.unwrap_or_else(Utc::now);
    let outcome = mutate(&state, &id, |engine, participant| {
        Ok(engine.reinstate(participant, now))
    })
    .await
    .map_err(api_error)?;

    tracing::info!(
        participant = %id,
        operation = "reinstate",
        reinstated = outcome.reinstated,
        tier = %outcome.tier,
        failure = ?outcome.failure,
        "Reinstatement processed"
    );
    Ok(Json(outcome))
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Framed participant snapshot with FNV-1a and BLAKE3 digests.
pub async fn export_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let participant = match load(&state, &id).await {
        Ok(participant) => participant,
        Err(e) => return (status_for(&e), Json(ExportResponse::error(e.to_string()))),
    };

    let snapshot = state_to_bytes(&participant).and_then(|data| {
        Ok((
            state_checksum(&participant)?,
            state_crypto_hash(&participant)?,
            data,
        ))
    });
    match snapshot {
        Ok((checksum, hash, data)) => (
            StatusCode::OK,
            Json(ExportResponse::success(&data, checksum, hash)),
        ),
        Err(e) => {
            tracing::error!(participant = %id, error = %e, "Export failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExportResponse::error(format!("Export failed: {}", e))),
            )
        }
    }
}
