//! # Access Control
//!
//! Shared-key access to the governance API. Ceremonies, violations and exits
//! rewrite participant records, so once `STEWARD_API_KEY` is set every route
//! except the open ones needs the key.
//!
//! The key is accepted as `Authorization: Bearer <key>` or as the bare key.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Routes load balancers and health checks reach without the key.
const OPEN_PATHS: [&str; 1] = ["/health"];

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    MissingCredential,
    WrongKey,
}

impl Refusal {
    fn reason(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_authorization_header",
            Self::WrongKey => "invalid_api_key",
        }
    }
}

/// The configured key; `None` (unset or empty) leaves the API open.
pub fn configured_api_key() -> Option<String> {
    std::env::var("STEWARD_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

/// Constant-time comparison over the longer of the two keys.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let len = provided.len().max(expected.len());
    let mut left = vec![0u8; len];
    let mut right = vec![0u8; len];
    left[..provided.len()].copy_from_slice(provided);
    right[..expected.len()].copy_from_slice(expected);

    let same: bool = left.ct_eq(&right).into();
    same && provided.len() == expected.len()
}

fn authorize(expected: &str, path: &str, headers: &HeaderMap) -> Result<(), Refusal> {
    if OPEN_PATHS.contains(&path) {
        return Ok(());
    }
    let presented = presented_key(headers).ok_or(Refusal::MissingCredential)?;
    if keys_match(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(Refusal::WrongKey)
    }
}

/// Reject requests without the configured key.
pub async fn require_api_key(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = configured_api_key() else {
        return Ok(next.run(request).await);
    };

    match authorize(&expected, request.uri().path(), request.headers()) {
        Ok(()) => Ok(next.run(request).await),
        Err(refusal) => {
            tracing::warn!(
                event = "auth_failure",
                reason = refusal.reason(),
                method = %request.method(),
                path = %request.uri().path(),
                "Request refused"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
