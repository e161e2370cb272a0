//! # HTTP Request Handlers Module
//!
//! Handlers for the OpenAI-compatible API surface and the operational
//! endpoints:
//!
//! - `POST /v1/chat/completions`: validate, check quotas, route with
//!   failover, track usage
//! - `GET /v1/models`: models advertised by the enabled providers
//! - `GET /health`: liveness
//! - `GET /health/detailed`: readiness plus a provider summary; 503 while
//!   no provider is callable
//! - `GET /v1/health/providers`: per-provider health aggregates and
//!   circuit-breaker state
//! - `GET /metrics`: Prometheus exposition
//!
//! Authentication and rate limiting happen in middleware before any handler
//! runs; quota checks happen here because only the chat endpoint consumes
//! quota.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use courier_models_sdk::providers::ProviderKind;
use courier_models_sdk::router::RoutingProfile;

use crate::gateway_error::GatewayError;
use crate::server::AppState;
use crate::tenants::{QuotaKind, Tenant, UsageEvent};
use crate::validation::parse_chat_request;

pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(tenant): Extension<Arc<Tenant>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let api_start = Instant::now();
    let request = parse_chat_request(&body)?;

    for (kind, label) in [(QuotaKind::Daily, "daily"), (QuotaKind::Monthly, "monthly")] {
        let check = state.tenants.check_quota(&tenant.tenant_id, kind);
        if !check.allowed {
            tracing::warn!(
                tenant_id = %tenant.tenant_id,
                quota = label,
                used = check.used,
                "quota exhausted"
            );
            return Err(GatewayError::QuotaExceeded {
                message: format!(
                    "{label} request quota exhausted ({} of {})",
                    check.used,
                    check.limit.unwrap_or(0)
                ),
            });
        }
    }

    let profile = RoutingProfile {
        tenant_id: tenant.tenant_id.clone(),
        allowed_providers: tenant.allowed_providers.clone(),
        policy: tenant.routing_policy,
    };

    let model = request.model.clone();
    let mut response = state.router.route_chat(request, &profile).await?;

    let total_tokens = response.usage.total_tokens as u64;
    if let Some(metadata) = response.routing_metadata.as_mut() {
        metadata.api_processing_time = Some(api_start.elapsed().as_millis() as u64);

        let cost = total_tokens as f64 * state.config.cost_for(&metadata.primary_provider);
        state.tenants.track_usage(
            &tenant.tenant_id,
            UsageEvent {
                total_tokens,
                duration_ms: metadata.total_processing_time,
                model,
                estimated_cost: cost,
            },
        );
        state.metrics.record_routing(metadata, total_tokens);
    }

    Ok(Json(response).into_response())
}

pub async fn list_models(
    State(state): State<AppState>,
    Extension(_tenant): Extension<Arc<Tenant>>,
) -> Result<Json<Value>, GatewayError> {
    let mut models = Vec::new();

    for (name, descriptor) in &state.config.providers {
        if !descriptor.enabled {
            continue;
        }
        for model in advertised_models(descriptor.kind) {
            models.push(json!({
                "id": model,
                "object": "model",
                "owned_by": name,
                "provider": name,
            }));
        }
    }

    models.sort_by(|a, b| {
        (a["provider"].as_str(), a["id"].as_str()).cmp(&(b["provider"].as_str(), b["id"].as_str()))
    });

    Ok(Json(json!({"object": "list", "data": models})))
}

fn advertised_models(kind: ProviderKind) -> &'static [&'static str] {
    match kind {
        ProviderKind::Gemini => &[
            "gemini-1.5-pro",
            "gemini-1.5-flash",
            "gemini-1.0-pro",
        ],
        ProviderKind::Groq => &[
            "llama3-8b-8192",
            "llama3-70b-8192",
            "mixtral-8x7b-32768",
            "gemma-7b-it",
        ],
        ProviderKind::Huggingface => &[
            "meta-llama/Llama-3.1-8B-Instruct",
            "mistralai/Mistral-7B-Instruct-v0.3",
        ],
    }
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health_detailed(State(state): State<AppState>) -> Response {
    let health = state.router.health().snapshot();
    let breakers = state.router.breaker_snapshots().await;
    let available = state.router.available_provider_count().await;

    let mut providers = serde_json::Map::new();
    for name in state.router.provider_names().await {
        let view = state.router.health().provider_health(&name);
        providers.insert(
            name.clone(),
            json!({
                "uptime": view.uptime,
                "avg_latency_ms": view.avg_latency_ms,
                "consecutive_failures": view.consecutive_failures,
                "breaker": breakers.get(&name).map(|b| b.state).unwrap_or("closed"),
            }),
        );
    }

    let ready = available > 0;
    let body = json!({
        "status": if ready { "ready" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "available_providers": available,
        "tracked_providers": health.len(),
        "providers": providers,
    });

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

pub async fn providers_health(
    State(state): State<AppState>,
    Extension(_tenant): Extension<Arc<Tenant>>,
) -> Result<Json<Value>, GatewayError> {
    let breakers = state.router.breaker_snapshots().await;

    let mut providers = serde_json::Map::new();
    for name in state.router.provider_names().await {
        let view = state.router.health().provider_health(&name);
        providers.insert(name, serde_json::to_value(view).unwrap_or(Value::Null));
    }

    let mut breaker_map = serde_json::Map::new();
    for (name, snapshot) in breakers {
        breaker_map.insert(
            name,
            serde_json::to_value(snapshot).unwrap_or(Value::Null),
        );
    }

    Ok(Json(json!({
        "providers": providers,
        "circuit_breakers": breaker_map,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let breakers = state.router.breaker_snapshots().await;
    let health = state.router.health().snapshot();
    let text = state.metrics.render_prometheus(&breakers, &health);

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        text,
    )
        .into_response()
}
