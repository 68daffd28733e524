//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands. Every
//! command opens the redb database, runs one engine operation and writes the
//! participant back.

use crate::api;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use steward_core::{
    FactSource, GovernanceConfig, GovernanceEngine, ParticipantFacts, ParticipantId,
    ParticipantLifecycleState, ParticipantStore, PointBalances, RedbStore, StabilityWindow,
    StageMetrics, StaticFacts, StewardError, Tier, TierPair,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a JSON input file (metrics, fact snapshots): 1 MB.
const MAX_INPUT_FILE_SIZE: u64 = 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), StewardError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| StewardError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(StewardError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, StewardError> {
    let canonical = path.canonicalize().map_err(|e| {
        StewardError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(StewardError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and parse a JSON input file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, StewardError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_INPUT_FILE_SIZE)?;
    let contents = std::fs::read(&validated)
        .map_err(|e| StewardError::IoError(format!("Read file: {}", e)))?;
    serde_json::from_slice(&contents).map_err(|e| {
        StewardError::InvalidInput(format!("Parse '{}': {}", path.display(), e))
    })
}

// =============================================================================
// COMMAND CONTEXT
// =============================================================================

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub config_path: Option<PathBuf>,
    pub json_mode: bool,
    /// Evaluation time for time-sensitive operations.
    pub now: DateTime<Utc>,
}

impl Context {
    /// Load the governance file, or the built-in tables when none is set.
    pub fn load_config(&self) -> Result<GovernanceConfig, StewardError> {
        match &self.config_path {
            Some(path) => GovernanceConfig::from_file(path),
            None => Ok(GovernanceConfig::builtin()),
        }
    }

    pub fn engine(&self) -> Result<GovernanceEngine, StewardError> {
        Ok(GovernanceEngine::new(Arc::new(self.load_config()?)))
    }

    fn open_store(&self) -> Result<RedbStore, StewardError> {
        RedbStore::open(&self.database)
    }

    fn print<T: Serialize>(&self, value: &T) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

/// Load a participant, run `operation` and store the result.
///
/// Nothing is written back when the operation returns an error.
fn with_participant<T>(
    ctx: &Context,
    id: &str,
    operation: impl FnOnce(&GovernanceEngine, &mut ParticipantLifecycleState) -> Result<T, StewardError>,
) -> Result<T, StewardError> {
    let engine = ctx.engine()?;
    let mut store = ctx.open_store()?;
    let mut participant = store.load(&ParticipantId::parse(id)?)?;
    let output = operation(&engine, &mut participant)?;
    store.put(&participant)?;
    Ok(output)
}

fn load_participant(ctx: &Context, id: &str) -> Result<ParticipantLifecycleState, StewardError> {
    ctx.open_store()?.load(&ParticipantId::parse(id)?)
}

/// Collaborator snapshot from a facts file.
///
/// Without a file the participant is known with nothing reported, so every
/// companion, exam and capability requirement counts as unmet.
fn load_fact_source(
    path: Option<&PathBuf>,
    participant: &ParticipantId,
) -> Result<StaticFacts, StewardError> {
    match path {
        Some(path) => read_json_file(path.as_path()),
        None => {
            let mut snapshot = StaticFacts::new();
            snapshot.insert(participant.clone(), ParticipantFacts::default());
            Ok(snapshot)
        }
    }
}

fn print_failure(failure: Option<impl std::fmt::Display>) {
    if let Some(failure) = failure {
        println!("Refused: {}", failure);
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &Context,
    host: &str,
    port: u16,
    facts: Option<&PathBuf>,
) -> Result<(), StewardError> {
    let config = ctx.load_config()?;
    let store = ctx.open_store()?;
    let fact_source = facts
        .map(|path| read_json_file::<StaticFacts>(path.as_path()))
        .transpose()?;

    println!("Steward Governance Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", host);
    println!("  Port:       {}", port);
    println!("  Database:   {:?}", ctx.database);
    println!(
        "  Governance: {} ({})",
        config.version,
        ctx.config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "builtin".to_string())
    );
    println!(
        "  Facts:      {}",
        facts
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "request bodies".to_string())
    );
    println!();
    println!("Endpoints:");
    println!("  POST /participants                 - Enroll a participant");
    println!("  GET  /participants/{{id}}            - Participant state");
    println!("  POST /participants/{{id}}/stage      - Evaluate stage");
    println!("  POST /participants/{{id}}/violations - Record a violation");
    println!("  GET  /config                       - Active configuration");
    println!("  GET  /health                       - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut state = api::AppState::new(Box::new(store), config, ctx.config_path.clone());
    if let Some(snapshot) = fact_source {
        tracing::info!(
            participants = snapshot.participants.len(),
            "Promotion facts served from snapshot"
        );
        state = state.with_fact_source(Arc::new(snapshot));
    }
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// INIT / CONFIG COMMANDS
// =============================================================================

/// Initialize new database.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), StewardError> {
    if ctx.database.exists() {
        if !force {
            return Err(StewardError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| StewardError::IoError(format!("Remove old database: {}", e)))?;
    }

    ctx.open_store()?;
    tracing::info!(database = %ctx.database.display(), operation = "init", "Database initialized");
    println!("Initialized new redb database at {:?}", ctx.database);
    Ok(())
}

/// Show the active configuration, or validate a file.
pub fn cmd_config(ctx: &Context, check: Option<&PathBuf>) -> Result<(), StewardError> {
    let (config, source) = match check {
        Some(path) => (
            GovernanceConfig::from_file(path)?,
            path.display().to_string(),
        ),
        None => (
            ctx.load_config()?,
            ctx.config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "builtin".to_string()),
        ),
    };

    if ctx.json_mode {
        ctx.print(&config);
        return Ok(());
    }

    if check.is_some() {
        println!("Configuration is valid");
    }
    println!("Governance Configuration");
    println!("========================");
    println!("Source:  {}", source);
    println!("Version: {}", config.version);
    println!();
    println!("Promotion thresholds:");
    for threshold in &config.thresholds {
        println!(
            "  {}  points {}/{}/{} ({})  peers {}  period {}d  ceremony {}",
            threshold.pair,
            threshold.min_points.growth,
            threshold.min_points.contribution,
            threshold.min_points.influence,
            if threshold.is_hard_gate() {
                "hard"
            } else {
                "advisory"
            },
            threshold.peers.total,
            threshold.min_period_days,
            threshold.ceremony.name
        );
    }
    println!();
    println!("Violation policies:");
    for policy in &config.policies {
        println!(
            "  {:<22} {}  (appeal {}d, reviewer {})",
            policy.kind.key(),
            policy.action,
            policy.appeal_window_days,
            policy.reviewer
        );
    }
    Ok(())
}

// =============================================================================
// PARTICIPANT COMMANDS
// =============================================================================

/// Enroll a participant.
pub fn cmd_enroll(ctx: &Context, id: &str) -> Result<(), StewardError> {
    let engine = ctx.engine()?;
    let participant = engine.enroll(id, ctx.now)?;
    let mut store = ctx.open_store()?;
    if store.contains(&participant.participant_id)? {
        return Err(StewardError::AlreadyEnrolled(participant.participant_id));
    }
    store.put(&participant)?;
    tracing::info!(participant = %participant.participant_id, operation = "enroll", "Participant enrolled");

    if ctx.json_mode {
        ctx.print(&participant);
    } else {
        println!(
            "Enrolled {} at {} / {}",
            participant.participant_id, participant.current_stage, participant.current_tier
        );
    }
    Ok(())
}

/// Show a participant.
pub fn cmd_show(ctx: &Context, id: &str) -> Result<(), StewardError> {
    let participant = load_participant(ctx, id)?;
    let progress = ctx.engine()?.stage_progress(&participant, ctx.now);

    if ctx.json_mode {
        let output = serde_json::json!({
            "state": participant,
            "progress": progress,
            "protected": participant.is_protected(ctx.now),
            "exited": participant.is_exited(),
        });
        ctx.print(&output);
        return Ok(());
    }

    println!("Participant {}", participant.participant_id);
    println!("==========================");
    println!("Stage:      {}", participant.current_stage);
    println!(
        "Stability:  {} / {} days ({}%)",
        progress.stability_counter_days, progress.stability_required_days, progress.stability_percent
    );
    if progress.graduated {
        println!("Graduated:  yes");
    }
    println!("Tier:       {}", participant.current_tier);
    println!(
        "Points:     growth {}  contribution {}  influence {}{}",
        participant.points.growth,
        participant.points.contribution,
        participant.points.influence,
        if participant.points_frozen {
            "  (frozen)"
        } else {
            ""
        }
    );
    if let Some(until) = participant.protection_until.filter(|_| participant.is_protected(ctx.now)) {
        println!("Protected:  until {}", until);
    }
    if let Some(observation) = &participant.observation {
        println!(
            "Observation: demoted from {} until {}",
            observation.demoted_from, observation.ends_at
        );
    }
    println!(
        "Violations: {} ({} unresolved)",
        participant.violation_history.len(),
        participant.unresolved_violations()
    );
    if participant.is_exited() {
        println!("Status:     exited");
    }
    Ok(())
}

/// Overwrite balances from the points ledger.
pub fn cmd_points(ctx: &Context, id: &str, balances: PointBalances) -> Result<(), StewardError> {
    let request = api::PointsRequest { balances };
    let (updated, points) = with_participant(ctx, id, |engine, participant| {
        let updated = engine.refresh_points(participant, &request)?;
        Ok((updated, participant.points))
    })?;
    tracing::info!(participant = %id, operation = "points", updated, "Point balances refreshed");

    if ctx.json_mode {
        ctx.print(&api::PointsResponse { updated, points });
    } else if updated {
        println!(
            "Points: growth {}  contribution {}  influence {}",
            points.growth, points.contribution, points.influence
        );
    } else {
        println!("Points are frozen; balances unchanged");
    }
    Ok(())
}

// =============================================================================
// STAGE COMMANDS
// =============================================================================

/// Evaluate and apply a stage transition.
pub fn cmd_stage(ctx: &Context, id: &str, metrics_path: &Path) -> Result<(), StewardError> {
    let metrics: StageMetrics = read_json_file(metrics_path)?;
    let evaluation = with_participant(ctx, id, |engine, participant| {
        engine.evaluate_stage(participant, &metrics, ctx.now)
    })?;
    tracing::info!(participant = %id, operation = "stage", outcome = ?evaluation.outcome, "Stage evaluated");

    if ctx.json_mode {
        ctx.print(&evaluation);
        return Ok(());
    }

    match evaluation.next_stage {
        Some(next) => println!(
            "{:?}: {} -> {}",
            evaluation.outcome, evaluation.previous_stage, next
        ),
        None => println!("{:?}: {}", evaluation.outcome, evaluation.previous_stage),
    }
    println!("Reason: {}", evaluation.reason);
    Ok(())
}

/// Record one stability window.
pub fn cmd_stability(
    ctx: &Context,
    id: &str,
    retention: u8,
    max_gap: u32,
    interventions: u32,
) -> Result<(), StewardError> {
    let window = StabilityWindow {
        retention_percent: retention,
        max_gap_days: max_gap,
        coach_interventions: interventions,
    };
    let (verified, counter, required) = with_participant(ctx, id, |engine, participant| {
        let verified = engine.check_stability(participant, &window);
        Ok((
            verified,
            participant.stability_counter_days,
            engine.config().stage_rules.stability.required_days,
        ))
    })?;
    tracing::info!(participant = %id, operation = "stability", counter, verified, "Stability window recorded");

    if ctx.json_mode {
        let output = serde_json::json!({
            "verified_stable": verified,
            "stability_counter_days": counter,
            "required_days": required,
        });
        ctx.print(&output);
    } else {
        println!(
            "Stability streak: {} / {} days{}",
            counter,
            required,
            if verified { " (verified stable)" } else { "" }
        );
    }
    Ok(())
}

/// Display permissions for the participant's current stage.
pub fn cmd_permissions(ctx: &Context, id: &str) -> Result<(), StewardError> {
    let participant = load_participant(ctx, id)?;
    let permissions = ctx.engine()?.display_permissions(participant.current_stage);

    if ctx.json_mode {
        ctx.print(&permissions);
        return Ok(());
    }

    println!("Display permissions at {}", permissions.stage);
    println!("  Allowed:   {:?}", permissions.allowed);
    println!("  Forbidden: {:?}", permissions.forbidden);
    Ok(())
}

// =============================================================================
// PROMOTION COMMANDS
// =============================================================================

/// Dual-track check with gap report.
pub fn cmd_promotion(
    ctx: &Context,
    id: &str,
    pair: Option<&str>,
    facts_path: Option<&PathBuf>,
) -> Result<(), StewardError> {
    let participant = load_participant(ctx, id)?;
    let snapshot = load_fact_source(facts_path, &participant.participant_id)?;
    let engine = ctx.engine()?;

    let pair_key = match pair {
        Some(key) => key.to_string(),
        None => TierPair::starting_at(participant.current_tier)
            .map(|p| p.key().to_string())
            .ok_or_else(|| {
                StewardError::InvalidInput(format!(
                    "No promotion step above {}",
                    participant.current_tier
                ))
            })?,
    };

    let result =
        engine.check_promotion_with(&participant, &pair_key, snapshot.collaborators(), ctx.now)?;
    let report = engine.analyze_gaps(&result);

    if ctx.json_mode {
        let output = serde_json::json!({ "result": result, "gaps": report });
        ctx.print(&output);
        return Ok(());
    }

    println!("Promotion {} for {}", result.pair, participant.participant_id);
    println!("State:    {}", result.state);
    println!("Guidance: {}", report.guidance);
    println!(
        "Points track: {}   Growth track: {}",
        if result.points.passed { "pass" } else { "fail" },
        if result.growth.passed { "pass" } else { "fail" }
    );
    if !report.is_empty() {
        println!();
        println!("Gaps:");
        for gap in &report.gaps {
            println!(
                "  [{:?}] {} ({} / {})",
                gap.category, gap.description, gap.current, gap.required
            );
        }
    }
    Ok(())
}

/// Run a promotion ceremony.
pub fn cmd_ceremony(
    ctx: &Context,
    id: &str,
    from: &str,
    facts_path: Option<&PathBuf>,
) -> Result<(), StewardError> {
    let from_tier = Tier::from_code(from)
        .ok_or_else(|| StewardError::InvalidInput(format!("Unknown tier '{}'", from)))?;
    let snapshot = load_fact_source(facts_path, &ParticipantId::parse(id)?)?;
    let outcome = with_participant(ctx, id, |engine, participant| {
        engine.initiate_ceremony_with(participant, from_tier, snapshot.collaborators(), ctx.now)
    })?;
    tracing::info!(participant = %id, operation = "ceremony", success = outcome.success, "Ceremony processed");

    if ctx.json_mode {
        ctx.print(&outcome);
        return Ok(());
    }

    if let (true, Some(tier), Some(name)) =
        (outcome.success, outcome.new_tier, outcome.ceremony_name.as_ref())
    {
        println!("{}: {} -> {}", name, outcome.previous_tier, tier);
        for contract in outcome.contracts.iter().flatten() {
            println!("  sign: {}", contract);
        }
        if let Some(until) = outcome.protection_until {
            println!("Protection period until {}", until);
        }
    } else {
        print_failure(outcome.failure_reason.as_ref());
        for gap in &outcome.gaps {
            println!("  [{:?}] {}", gap.category, gap.description);
        }
    }
    Ok(())
}

// =============================================================================
// VIOLATION COMMANDS
// =============================================================================

/// Record a violation.
pub fn cmd_violation(
    ctx: &Context,
    id: &str,
    kind: &str,
    description: &str,
) -> Result<(), StewardError> {
    let request = api::ViolationRequest {
        kind: kind.to_string(),
        description: description.to_string(),
        at: Some(ctx.now),
    };
    let explicit = request.explicit_kind()?;
    let outcome = with_participant(ctx, id, |engine, participant| {
        let kind = explicit.unwrap_or_else(|| engine.classify_overreach(participant));
        engine.process_violation_kind(participant, kind, description, ctx.now)
    })?;
    tracing::info!(
        participant = %id,
        operation = "violation",
        kind = %outcome.kind,
        waived = outcome.penalty_applied.waived,
        "Violation processed"
    );

    if ctx.json_mode {
        ctx.print(&outcome);
        return Ok(());
    }

    println!("Violation: {}", outcome.kind);
    if let Some(failure) = outcome.failure {
        println!("Refused: {}", failure);
        return Ok(());
    }
    if let Some(record) = &outcome.record {
        println!("Recorded as {} (appeal until {})", record.id, record.appeal_deadline);
    }
    let deducted = outcome.penalty_applied.deducted;
    println!(
        "Penalty: growth -{}  contribution -{}  influence -{}{}",
        deducted.growth,
        deducted.contribution,
        deducted.influence,
        if outcome.penalty_applied.waived {
            "  (waived: protection period)"
        } else {
            ""
        }
    );
    println!("Action:  {}", outcome.action_taken);
    println!("Recovery path: {}", outcome.recovery_path);
    if let Some(demotion) = outcome.demotion {
        println!(
            "Demoted {} -> {}, observation until {}",
            demotion.from, demotion.to, demotion.observation.ends_at
        );
    }
    if outcome.exit_triggered.is_some() {
        println!("Participant removed from the program");
    }
    Ok(())
}

/// File an appeal.
pub fn cmd_appeal(ctx: &Context, id: &str, violation: &str) -> Result<(), StewardError> {
    let outcome = with_participant(ctx, id, |engine, participant| {
        Ok(engine.file_appeal(participant, violation, ctx.now))
    })?;
    tracing::info!(participant = %id, operation = "appeal", violation, accepted = outcome.accepted, "Appeal processed");

    if ctx.json_mode {
        ctx.print(&outcome);
    } else if outcome.accepted {
        println!("Appeal filed for {}", violation);
    } else {
        print_failure(outcome.failure);
    }
    Ok(())
}

/// Record the reviewer's decision.
pub fn cmd_resolve(
    ctx: &Context,
    id: &str,
    violation: &str,
    upheld: bool,
) -> Result<(), StewardError> {
    let outcome = with_participant(ctx, id, |engine, participant| {
        Ok(engine.resolve_violation(participant, violation, upheld))
    })?;
    tracing::info!(participant = %id, operation = "resolve", violation, upheld, "Violation resolved");

    if ctx.json_mode {
        ctx.print(&outcome);
    } else if let Some(status) = outcome.status.filter(|_| outcome.accepted) {
        println!(
            "{} is now {:?}; refunded {} points",
            violation,
            status,
            outcome.refunded.total()
        );
    } else {
        print_failure(outcome.failure);
    }
    Ok(())
}

/// Capability re-evaluation during observation.
pub fn cmd_reevaluate(ctx: &Context, id: &str, passed: bool) -> Result<(), StewardError> {
    let outcome = with_participant(ctx, id, |engine, participant| {
        Ok(engine.request_reevaluation(participant, passed, ctx.now))
    })?;
    tracing::info!(participant = %id, operation = "reevaluation", restored = outcome.restored, "Re-evaluation processed");

    if ctx.json_mode {
        ctx.print(&outcome);
    } else if outcome.restored {
        println!("Tier restored to {}", outcome.tier);
    } else {
        print_failure(outcome.failure);
    }
    Ok(())
}

// =============================================================================
// EXIT COMMANDS
// =============================================================================

/// Record an exit.
pub fn cmd_exit(ctx: &Context, id: &str, kind: &str, reason: &str) -> Result<(), StewardError> {
    let request = api::ExitRequest {
        kind: kind.to_string(),
        reason: reason.to_string(),
        at: Some(ctx.now),
    };
    let exit_kind = request.exit_kind()?;
    let record = with_participant(ctx, id, |engine, participant| {
        engine.process_exit(participant, exit_kind, reason, ctx.now)
    })?;
    tracing::info!(participant = %id, operation = "exit", kind = ?record.kind, "Exit recorded");

    if ctx.json_mode {
        ctx.print(&record);
        return Ok(());
    }

    println!("Exit recorded ({:?}) at {}", record.kind, record.exited_at);
    match record.recovery_deadline {
        Some(deadline) => println!("Recoverable until {}", deadline),
        None => println!("Not recoverable"),
    }
    Ok(())
}

/// Check recovery eligibility.
pub fn cmd_recover(ctx: &Context, id: &str) -> Result<(), StewardError> {
    let participant = load_participant(ctx, id)?;
    let outcome = ctx.engine()?.request_recovery(&participant, ctx.now);

    if ctx.json_mode {
        ctx.print(&outcome);
        return Ok(());
    }

    if outcome.eligible {
        println!("Eligible for recovery: {}", outcome.reason);
        for (step, name) in outcome.recovery_steps.iter().flatten().enumerate() {
            println!("  {}. {}", step + 1, name);
        }
    } else {
        println!("Not eligible: {}", outcome.reason);
    }
    Ok(())
}

/// Complete recovery.
pub fn cmd_reinstate(ctx: &Context, id: &str) -> Result<(), StewardError> {
    let outcome = with_participant(ctx, id, |engine, participant| {
        Ok(engine.reinstate(participant, ctx.now))
    })?;
    tracing::info!(participant = %id, operation = "reinstate", reinstated = outcome.reinstated, "Reinstatement processed");

    if ctx.json_mode {
        ctx.print(&outcome);
    } else if outcome.reinstated {
        println!("Reinstated at {}", outcome.tier);
    } else {
        print_failure(outcome.failure);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
