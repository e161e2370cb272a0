//! # HTTP Middleware Module
//!
//! Request middleware for the gateway:
//!
//! - **Authentication**: `Authorization: Bearer <key>` → tenant lookup; the
//!   resolved tenant rides in the request extensions. Liveness, readiness
//!   and metrics endpoints stay unauthenticated.
//! - **Rate limiting**: per-tenant fixed window, checked right after
//!   authentication so blocked requests never reach quota accounting or the
//!   router.
//! - **Logging**: one `tracing` line per request with a generated request id,
//!   method, path, status and latency.
//! - **Metrics**: per-request counters for the `/metrics` exposition.
//! - **CORS**: permissive by default, restrictable via configuration.

use axum::body::Body;
use axum::extract::State;
use axum::http::{self, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::gateway_error::{key_prefix, GatewayError};
use crate::server::AppState;

/// Paths that are reachable without a tenant API key.
const PUBLIC_PATHS: &[&str] = &["/health", "/health/detailed", "/metrics"];

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == http::Method::OPTIONS || PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let api_key = match extract_bearer_key(auth_header) {
        Some(key) => key,
        None => {
            return GatewayError::Authentication {
                message: "missing or malformed Authorization header".to_string(),
            }
            .into_response();
        }
    };

    let tenant = match state.tenants.find_by_api_key(&api_key) {
        Some(tenant) => tenant,
        None => {
            tracing::warn!(key = %key_prefix(&api_key), "unknown API key");
            return GatewayError::Authentication {
                message: "unknown API key".to_string(),
            }
            .into_response();
        }
    };

    let decision = state
        .rate_limiter
        .check(&tenant.tenant_id, tenant.quotas.rate_limit_per_minute);
    if !decision.allowed {
        tracing::warn!(tenant_id = %tenant.tenant_id, "rate limit exceeded");
        return GatewayError::RateLimited {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_epoch_secs: decision.reset_epoch_secs,
        }
        .into_response();
    }

    req.extensions_mut().insert(tenant);
    next.run(req).await
}

/// Pull the key out of a `Bearer <key>` header value.
pub fn extract_bearer_key(header: Option<&str>) -> Option<String> {
    let header = header?;
    let key = header.strip_prefix("Bearer ")?.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = uuid::Uuid::new_v4().to_string();

    let response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = %response.status(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request processed"
    );

    response
}

pub async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    // Skip scrapes and liveness probes.
    if path != "/metrics" && path != "/health" {
        state
            .metrics
            .record_http_request(&path, response.status().as_u16(), start.elapsed());
    }

    response
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let mut cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        for origin in allowed_origins {
            if let Ok(origin) = origin.parse::<http::header::HeaderValue>() {
                cors = cors.allow_origin(origin);
            }
        }
    }

    cors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction_handles_malformed_headers() {
        assert_eq!(
            extract_bearer_key(Some("Bearer ak-demo123")).as_deref(),
            Some("ak-demo123")
        );
        assert!(extract_bearer_key(Some("Basic ak-demo123")).is_none());
        assert!(extract_bearer_key(Some("Bearer ")).is_none());
        assert!(extract_bearer_key(Some("ak-demo123")).is_none());
        assert!(extract_bearer_key(None).is_none());
    }
}
