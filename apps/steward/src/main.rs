//! # Steward - Lifecycle Governance Server
//!
//! The main binary for the Steward member lifecycle engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for participant operations
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/steward (THE BINARY)              │
//! │                                                       │
//! │     ┌─────────────┐            ┌─────────────┐        │
//! │     │    CLI      │            │  HTTP API   │        │
//! │     │   (clap)    │            │   (axum)    │        │
//! │     └──────┬──────┘            └──────┬──────┘        │
//! │            └─────────────┬────────────┘               │
//! │                          ▼                            │
//! │                  ┌───────────────┐                    │
//! │                  │ steward-core  │                    │
//! │                  │  (THE LOGIC)  │                    │
//! │                  └───────────────┘                    │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! steward server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! steward enroll p-001
//! steward stage p-001 -m metrics.json
//! steward promotion p-001 --pair L0_L1 -f facts.json
//! ```

use clap::Parser;
use steward::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // STEWARD_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STEWARD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "steward=debug,steward_core=debug,tower_http=debug"
    } else {
        "steward=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Banners would corrupt JSON output
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Steward startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗████████╗███████╗██╗    ██╗ █████╗ ██████╗ ██████╗
  ██╔════╝╚══██╔══╝██╔════╝██║    ██║██╔══██╗██╔══██╗██╔══██╗
  ███████╗   ██║   █████╗  ██║ █╗ ██║███████║██████╔╝██║  ██║
  ╚════██║   ██║   ██╔══╝  ██║███╗██║██╔══██║██╔══██╗██║  ██║
  ███████║   ██║   ███████╗╚███╔███╔╝██║  ██║██║  ██║██████╔╝
  ╚══════╝   ╚═╝   ╚══════╝ ╚══╝╚══╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝

  Lifecycle Governance Server v{}

  Stages • Tiers • Constraints
"#,
        env!("CARGO_PKG_VERSION")
    );
}
