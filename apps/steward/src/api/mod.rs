//! # Steward HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /config` - Active governance configuration
//! - `POST /config/reload` - Re-read the governance file
//! - `POST /participants` - Enroll a participant
//! - `GET /participants/{id}` - Stored state and stage progress
//! - `POST /participants/{id}/points` - Refresh balances from the points ledger
//! - `POST /participants/{id}/stage` - Evaluate and apply a stage transition
//! - `POST /participants/{id}/stability` - Record one stability window
//! - `GET /participants/{id}/permissions` - Display permissions for the current stage
//! - `POST /participants/{id}/promotion/check` - Dual-track check with gap report
//! - `POST /participants/{id}/promotion/ceremony` - Run a promotion ceremony
//! - `POST /participants/{id}/violations` - Record a violation
//! - `POST /participants/{id}/violations/{vid}/appeal` - File an appeal
//! - `POST /participants/{id}/violations/{vid}/resolve` - Reviewer decision
//! - `POST /participants/{id}/reevaluation` - Capability re-evaluation during observation
//! - `POST /participants/{id}/exit` - Voluntary or forced exit
//! - `POST /participants/{id}/recovery` - Recovery eligibility
//! - `POST /participants/{id}/reinstate` - Complete recovery
//! - `GET /participants/{id}/export` - Framed snapshot (base64) with checksums
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `STEWARD_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `STEWARD_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `STEWARD_API_KEY`: If set, requires Bearer token authentication
//!
//! ## Promotion Facts
//!
//! A server started with a fact source (`steward server --facts`) asks it for
//! companion, exam and capability answers and refuses facts in request
//! bodies. Without one, the promotion endpoints take `facts` from the body.

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::configured_api_key;
pub use middleware::{RequestLimiter, build_limiter, configured_rate_limit};
// Re-export types for integration tests (via `steward::api::*`)
pub use types::{
    CeremonyRequest, ConfigResponse, EnrollRequest, ErrorResponse, ExitRequest, ExportResponse,
    HealthResponse, OVERREACH_KEYWORD, ParticipantResponse, PointsRequest, PointsResponse,
    PromotionRequest, PromotionResponse,
    ReevaluationRequest, ReloadResponse, ResolveRequest, StabilityRequest, StabilityResponse,
    StageRequest, TimedRequest, ViolationRequest,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use steward_core::{
    FactSource, GovernanceConfig, GovernanceEngine, ParticipantId, ParticipantStore, StewardError,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Participant store shared between handlers.
pub type SharedStore = Arc<RwLock<Box<dyn ParticipantStore>>>;

/// One async mutex per participant with an operation in flight.
type LockTable = Arc<std::sync::Mutex<BTreeMap<ParticipantId, Arc<Mutex<()>>>>>;

/// Shared server state.
///
/// Handlers that change a participant hold that participant's lock for the
/// whole load → evaluate → store sequence; the store lock itself is only
/// held for single reads and writes.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    config: Arc<RwLock<Arc<GovernanceConfig>>>,
    config_path: Option<PathBuf>,
    fact_source: Option<Arc<dyn FactSource>>,
    participant_locks: LockTable,
}

impl AppState {
    /// Create new app state over a store and a loaded configuration.
    #[must_use]
    pub fn new(
        store: Box<dyn ParticipantStore>,
        config: GovernanceConfig,
        config_path: Option<PathBuf>,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            config: Arc::new(RwLock::new(Arc::new(config))),
            config_path,
            fact_source: None,
            participant_locks: Arc::default(),
        }
    }

    /// Answer promotion-time queries from `source` instead of request bodies.
    #[must_use]
    pub fn with_fact_source(mut self, source: Arc<dyn FactSource>) -> Self {
        self.fact_source = Some(source);
        self
    }

    #[must_use]
    pub fn fact_source(&self) -> Option<Arc<dyn FactSource>> {
        self.fact_source.clone()
    }

    /// Engine over the configuration in force right now.
    pub async fn engine(&self) -> GovernanceEngine {
        GovernanceEngine::new(Arc::clone(&*self.config.read().await))
    }

    pub async fn config(&self) -> Arc<GovernanceConfig> {
        Arc::clone(&*self.config.read().await)
    }

    /// Describe where the configuration comes from.
    #[must_use]
    pub fn config_source(&self) -> String {
        self.config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "builtin".to_string())
    }

    /// Re-read the configuration file.
    ///
    /// Returns `(previous, current)` versions. A failed reload keeps the
    /// configuration in force.
    pub async fn reload_config(&self) -> Result<(String, String), StewardError> {
        let path = self.config_path.as_ref().ok_or_else(|| {
            StewardError::InvalidInput(
                "Server runs on the built-in configuration; nothing to reload".to_string(),
            )
        })?;
        let fresh = GovernanceConfig::from_file(path)?;
        let mut current = self.config.write().await;
        let previous = current.version.clone();
        let version = fresh.version.clone();
        *current = Arc::new(fresh);
        Ok((previous, version))
    }

    /// Wait for exclusive access to one participant.
    ///
    /// The table entry is dropped with the last guard that nobody waits on.
    pub async fn lock_participant(&self, id: &ParticipantId) -> ParticipantGuard {
        let mutex = {
            let mut locks = self
                .participant_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let guard = Arc::clone(&mutex).lock_owned().await;
        ParticipantGuard {
            guard: Some(guard),
            mutex,
            id: id.clone(),
            locks: Arc::clone(&self.participant_locks),
        }
    }

    /// Participants with a lock entry right now.
    #[must_use]
    pub fn locked_participants(&self) -> usize {
        self.participant_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive access to one participant, released on drop.
pub struct ParticipantGuard {
    guard: Option<OwnedMutexGuard<()>>,
    mutex: Arc<Mutex<()>>,
    id: ParticipantId,
    locks: LockTable,
}

impl Drop for ParticipantGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table and this guard still reference the mutex.
        if Arc::strong_count(&self.mutex) == 2 {
            locks.remove(&self.id);
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `STEWARD_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode)
/// - If not set: defaults to localhost only
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("STEWARD_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (STEWARD_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in STEWARD_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No STEWARD_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - 2 MiB
/// 4. Rate Limiting - global token bucket (if enabled)
/// 5. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = configured_rate_limit();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(build_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = configured_api_key().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set STEWARD_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/config", get(handlers::config_handler))
        .route("/config/reload", post(handlers::reload_handler))
        .route("/participants", post(handlers::enroll_handler))
        .route("/participants/{id}", get(handlers::participant_handler))
        .route("/participants/{id}/points", post(handlers::points_handler))
        .route("/participants/{id}/stage", post(handlers::stage_handler))
        .route(
            "/participants/{id}/stability",
            post(handlers::stability_handler),
        )
        .route(
            "/participants/{id}/permissions",
            get(handlers::permissions_handler),
        )
        .route(
            "/participants/{id}/promotion/check",
            post(handlers::promotion_check_handler),
        )
        .route(
            "/participants/{id}/promotion/ceremony",
            post(handlers::ceremony_handler),
        )
        .route(
            "/participants/{id}/violations",
            post(handlers::violation_handler),
        )
        .route(
            "/participants/{id}/violations/{vid}/appeal",
            post(handlers::appeal_handler),
        )
        .route(
            "/participants/{id}/violations/{vid}/resolve",
            post(handlers::resolve_handler),
        )
        .route(
            "/participants/{id}/reevaluation",
            post(handlers::reevaluation_handler),
        )
        .route("/participants/{id}/exit", post(handlers::exit_handler))
        .route(
            "/participants/{id}/recovery",
            post(handlers::recovery_handler),
        )
        .route(
            "/participants/{id}/reinstate",
            post(handlers::reinstate_handler),
        )
        .route("/participants/{id}/export", get(handlers::export_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::require_api_key));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::throttle,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), StewardError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StewardError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Steward HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StewardError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// TESTS
// =============================================================================
