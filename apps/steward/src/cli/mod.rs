//! # Steward CLI Module
//!
//! This module implements the CLI interface for Steward.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new participant database
//! - `enroll` - Enroll a participant
//! - `show` - Show a participant's state and stage progress
//! - `points` - Refresh point balances from the ledger
//! - `stage` - Evaluate a stage transition from a metrics file
//! - `stability` - Record one stability window
//! - `permissions` - Display permissions for a participant's stage
//! - `promotion` - Dual-track promotion check with gap report
//! - `ceremony` - Run a promotion ceremony
//! - `violation` - Record, appeal or resolve violations
//! - `reevaluate` - Capability re-evaluation during observation
//! - `exit` - Record a voluntary or forced exit
//! - `recover` - Check recovery eligibility
//! - `reinstate` - Complete recovery
//! - `config` - Show or validate the governance configuration

mod commands;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use steward_core::{PointBalances, StewardError};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Steward - member lifecycle governance
///
/// Behavioral-adoption stages, dual-track tier promotion, violations,
/// exit and recovery over a redb participant database.
#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the participant database
    #[arg(short = 'D', long, global = true, default_value = "steward.redb")]
    pub database: PathBuf,

    /// Governance configuration file (TOML); falls back to STEWARD_CONFIG,
    /// then to the built-in tables
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Evaluation time (RFC 3339); defaults to now
    #[arg(long, global = true)]
    pub at: Option<DateTime<Utc>>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Collaborator snapshot (JSON) answering companion, exam and
        /// capability queries; request bodies may then not carry facts
        #[arg(short, long)]
        facts: Option<PathBuf>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Enroll a participant at S0 / L0
    Enroll {
        /// Participant id
        id: String,
    },

    /// Show a participant's state and stage progress
    Show {
        /// Participant id
        id: String,
    },

    /// Refresh point balances from the points ledger
    Points {
        /// Participant id
        id: String,

        /// Growth balance
        #[arg(long, default_value = "0")]
        growth: u64,

        /// Contribution balance
        #[arg(long, default_value = "0")]
        contribution: u64,

        /// Influence balance
        #[arg(long, default_value = "0")]
        influence: u64,
    },

    /// Evaluate and apply a stage transition
    Stage {
        /// Participant id
        id: String,

        /// JSON file with the behavioral metrics
        #[arg(short, long)]
        metrics: PathBuf,
    },

    /// Record one stability window
    Stability {
        /// Participant id
        id: String,

        /// Retention rate over the window, in percent
        #[arg(long)]
        retention: u8,

        /// Largest gap between active days
        #[arg(long, default_value = "0")]
        max_gap: u32,

        /// Coach interventions during the window
        #[arg(long, default_value = "0")]
        interventions: u32,
    },

    /// Show display permissions for the participant's current stage
    Permissions {
        /// Participant id
        id: String,
    },

    /// Dual-track promotion check with gap report
    Promotion {
        /// Participant id
        id: String,

        /// Tier pair, e.g. L0_L1 (defaults to the participant's next step)
        #[arg(short = 't', long)]
        pair: Option<String>,

        /// Collaborator snapshot (JSON) with companion counts and exam results
        #[arg(short, long)]
        facts: Option<PathBuf>,
    },

    /// Run a promotion ceremony from the participant's current tier
    Ceremony {
        /// Participant id
        id: String,

        /// Tier the participant is promoted from (e.g. L1)
        #[arg(long)]
        from: String,

        /// Collaborator snapshot (JSON) with companion counts and exam results
        #[arg(short, long)]
        facts: Option<PathBuf>,
    },

    /// Record, appeal or resolve a violation
    Violation {
        #[command(subcommand)]
        action: ViolationAction,
    },

    /// Capability re-evaluation during an observation period
    Reevaluate {
        /// Participant id
        id: String,

        /// The re-evaluation was failed
        #[arg(long)]
        failed: bool,
    },

    /// Record a voluntary or forced exit
    Exit {
        /// Participant id
        id: String,

        /// Exit kind (voluntary, forced)
        #[arg(short, long, default_value = "voluntary")]
        kind: String,

        /// Reason for leaving
        #[arg(short, long)]
        reason: String,
    },

    /// Check recovery eligibility after an exit
    Recover {
        /// Participant id
        id: String,
    },

    /// Complete recovery and restore the tier held at exit
    Reinstate {
        /// Participant id
        id: String,
    },

    /// Show the active configuration or validate a file
    Config {
        /// Validate this file instead of showing the active configuration
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

/// Violation sub-actions.
#[derive(Subcommand, Debug)]
pub enum ViolationAction {
    /// Record a violation
    Record {
        /// Participant id
        id: String,

        /// Violation kind, or "overreach" to classify first vs repeat
        #[arg(short, long)]
        kind: String,

        /// What happened
        #[arg(short, long)]
        description: String,
    },

    /// File an appeal against a recorded violation
    Appeal {
        /// Participant id
        id: String,

        /// Violation id (V-0001, ...)
        violation: String,
    },

    /// Record the reviewer's decision
    Resolve {
        /// Participant id
        id: String,

        /// Violation id (V-0001, ...)
        violation: String,

        /// Overturn the violation instead of upholding it
        #[arg(long)]
        overturn: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), StewardError> {
    let config_path = resolve_config_path(cli.config.clone());
    let now = cli.at.unwrap_or_else(Utc::now);
    let ctx = Context {
        database: cli.database.clone(),
        config_path,
        json_mode: cli.json_mode,
        now,
    };

    match cli.command {
        Some(Commands::Server { host, port, facts }) => {
            cmd_server(&ctx, &host, port, facts.as_ref()).await
        }
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Enroll { id }) => cmd_enroll(&ctx, &id),
        Some(Commands::Show { id }) => cmd_show(&ctx, &id),
        Some(Commands::Points {
            id,
            growth,
            contribution,
            influence,
        }) => cmd_points(
            &ctx,
            &id,
            PointBalances {
                growth,
                contribution,
                influence,
            },
        ),
        Some(Commands::Stage { id, metrics }) => cmd_stage(&ctx, &id, &metrics),
        Some(Commands::Stability {
            id,
            retention,
            max_gap,
            interventions,
        }) => cmd_stability(&ctx, &id, retention, max_gap, interventions),
        Some(Commands::Permissions { id }) => cmd_permissions(&ctx, &id),
        Some(Commands::Promotion { id, pair, facts }) => {
            cmd_promotion(&ctx, &id, pair.as_deref(), facts.as_ref())
        }
        Some(Commands::Ceremony { id, from, facts }) => {
            cmd_ceremony(&ctx, &id, &from, facts.as_ref())
        }
        Some(Commands::Violation { action }) => match action {
            ViolationAction::Record {
                id,
                kind,
                description,
            } => cmd_violation(&ctx, &id, &kind, &description),
            ViolationAction::Appeal { id, violation } => cmd_appeal(&ctx, &id, &violation),
            ViolationAction::Resolve {
                id,
                violation,
                overturn,
            } => cmd_resolve(&ctx, &id, &violation, !overturn),
        },
        Some(Commands::Reevaluate { id, failed }) => cmd_reevaluate(&ctx, &id, !failed),
        Some(Commands::Exit { id, kind, reason }) => cmd_exit(&ctx, &id, &kind, &reason),
        Some(Commands::Recover { id }) => cmd_recover(&ctx, &id),
        Some(Commands::Reinstate { id }) => cmd_reinstate(&ctx, &id),
        Some(Commands::Config { check }) => cmd_config(&ctx, check.as_ref()),
        None => {
            // No subcommand - show the active configuration by default
            cmd_config(&ctx, None)
        }
    }
}

/// `--config`, then `STEWARD_CONFIG`, then none (built-in tables).
fn resolve_config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        std::env::var_os("STEWARD_CONFIG")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}
