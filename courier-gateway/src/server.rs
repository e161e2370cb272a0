//! # HTTP Server Module
//!
//! Wires the whole gateway together: builds provider instances from the
//! loaded descriptors, constructs the router core, tenant registry, rate
//! limiter and metrics collector, and assembles the axum router with its
//! middleware stack.
//!
//! All subsystems live in [`AppState`] and are injected into handlers by
//! axum; nothing in the gateway is a process-wide singleton. A single
//! `AppState` is created at startup and shared by reference.
//!
//! ## Middleware stack
//!
//! 1. CORS (first, so preflights never hit auth)
//! 2. Authentication + rate limiting
//! 3. Request logging
//! 4. Metrics
//! 5. Request timeout and body-size limit (last)

use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use courier_models_sdk::providers::create_provider;
use courier_models_sdk::router::{RegisteredProvider, RouterConfig, RouterCore};

use crate::config::GatewayConfig;
use crate::handlers;
use crate::metrics::MetricsCollector;
use crate::middleware::{auth_middleware, cors_layer, logging_middleware, metrics_middleware};
use crate::rate_limit::RateLimiter;
use crate::tenants::TenantRegistry;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub router: Arc<RouterCore>,
    pub tenants: Arc<TenantRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsCollector>,
}

/// Build provider instances for every enabled descriptor whose secret
/// resolves. Descriptors without a secret are skipped with a warning, not an
/// error: the rest of the fleet still serves.
fn build_providers(config: &GatewayConfig) -> HashMap<String, RegisteredProvider> {
    let mut providers = HashMap::new();

    for (name, descriptor) in &config.providers {
        if !descriptor.enabled {
            tracing::info!(provider = %name, "provider disabled, skipping");
            continue;
        }

        let api_key = match std::env::var(&descriptor.api_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    provider = %name,
                    env = %descriptor.api_key_env,
                    "no API key in environment, provider not loaded"
                );
                continue;
            }
        };

        match create_provider(descriptor, api_key) {
            Ok(instance) => {
                providers.insert(
                    name.clone(),
                    RegisteredProvider {
                        instance,
                        cost_per_token: config.cost_for(name),
                    },
                );
            }
            Err(e) => {
                tracing::error!(provider = %name, error = %e, "failed to create provider");
            }
        }
    }

    providers
}

/// Construct the application router and its shared state.
pub async fn build_app(config: GatewayConfig) -> anyhow::Result<(Router, AppState)> {
    let providers = build_providers(&config);
    if providers.is_empty() {
        tracing::warn!("no providers loaded; all chat requests will fail until keys are set");
    }

    let router_core = Arc::new(RouterCore::new(
        RouterConfig::default(),
        config.policy_params.clone(),
    ));
    router_core.replace_providers(providers).await;

    let tenants = Arc::new(TenantRegistry::new(config.tenants.clone())?);
    tracing::info!(tenants = tenants.tenant_count(), "tenant registry loaded");

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_window));
    let metrics = Arc::new(MetricsCollector::new());

    let state = AppState {
        config: Arc::new(config),
        router: router_core,
        tenants,
        rate_limiter,
        metrics,
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/health/providers", get(handlers::providers_health))
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::health_detailed))
        .route("/metrics", get(handlers::prometheus_metrics))
        .layer(RequestBodyLimitLayer::new(state.config.server.max_body_size))
        .layer(TimeoutLayer::new(state.config.server.request_timeout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors_layer(&state.config.server.cors_allowed_origins))
        .with_state(state.clone());

    Ok((app, state))
}
