//! # Courier Gateway
//!
//! HTTP front-end for the Courier LLM gateway: an OpenAI-compatible
//! chat-completions API routed across multiple upstream providers with
//! per-tenant authentication, quotas, rate limiting, circuit breaking and
//! health-aware failover.
//!
//! The routing machinery itself lives in `courier-models-sdk`; this crate
//! owns everything HTTP-shaped:
//!
//! - [`config`]: JSON configuration loading and validation
//! - [`tenants`]: tenant registry, quota accounting, usage tracking
//! - [`rate_limit`]: per-tenant fixed-window limiter
//! - [`middleware`]: auth, logging, metrics and CORS layers
//! - [`validation`]: request-schema validation
//! - [`handlers`]: the API and operational endpoints
//! - [`metrics`]: Prometheus exposition
//! - [`prober`]: the periodic provider health prober
//! - [`gateway_error`]: error taxonomy and HTTP envelope
//! - [`server`]: application assembly

pub mod config;
pub mod gateway_error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod prober;
pub mod rate_limit;
pub mod server;
pub mod tenants;
pub mod validation;

pub use config::GatewayConfig;
pub use gateway_error::GatewayError;
pub use server::{build_app, AppState};
