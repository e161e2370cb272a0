//! # Configuration Management Module
//!
//! The gateway is configured from a directory of JSON files plus environment
//! variables:
//!
//! - `providers.json`: map of provider name → descriptor. The map key is
//!   the provider's primary key, so a name cannot describe two providers.
//! - `tenants/<tenant_id>.json`: one tenant record per file.
//! - `policies/routing.json`: optional overrides for the built-in policy
//!   parameters (weights, uptime floor, cost table).
//!
//! Environment overrides: `PORT`, `HEALTH_CHECK_INTERVAL` (ms),
//! `RATE_LIMIT_WINDOW_MS`. Upstream secrets are never part of the files;
//! each descriptor names the environment variable that holds its key
//! (`api_key_env`) and the secret is resolved at provider construction.

use anyhow::Context;
use courier_models_sdk::policy::{PolicyParams, ScoreWeights};
use courier_models_sdk::providers::ProviderDescriptor;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::tenants::Tenant;

/// Default request-body cap: 10 MB.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// HTTP server settings. These come from defaults, environment variables and
/// CLI flags rather than a config file.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub max_body_size: usize,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout: Duration::from_secs(60),
            max_body_size: MAX_BODY_SIZE,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Optional `policies/routing.json` contents.
#[derive(Debug, Clone, Deserialize, Default)]
struct PolicyFile {
    #[serde(default)]
    min_uptime: Option<f64>,
    #[serde(default)]
    weights: Option<ScoreWeights>,
    #[serde(default)]
    default_cost_per_token: Option<f64>,
    /// Per-provider cost overrides, applied on top of the descriptors
    #[serde(default)]
    cost_per_token: HashMap<String, f64>,
}

/// Fully loaded gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub providers: HashMap<String, ProviderDescriptor>,
    pub tenants: Vec<Tenant>,
    pub policy_params: PolicyParams,
    /// Per-provider cost table from the policy file
    pub cost_table: HashMap<String, f64>,
    pub health_check_interval: Duration,
    pub rate_limit_window: Duration,
}

impl GatewayConfig {
    /// Load and validate configuration from `config_dir`, applying
    /// environment overrides.
    pub fn load(config_dir: &Path) -> anyhow::Result<Self> {
        let providers_path = config_dir.join("providers.json");
        let content = std::fs::read_to_string(&providers_path)
            .with_context(|| format!("failed to read {}", providers_path.display()))?;
        let mut providers: HashMap<String, ProviderDescriptor> =
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", providers_path.display()))?;
        for (name, descriptor) in providers.iter_mut() {
            descriptor.name = name.clone();
        }

        let tenants = load_tenants(&config_dir.join("tenants"))?;
        let policy_file = load_policy_file(&config_dir.join("policies").join("routing.json"))?;

        let mut policy_params = PolicyParams::default();
        if let Some(min_uptime) = policy_file.min_uptime {
            policy_params.min_uptime = min_uptime;
        }
        if let Some(weights) = policy_file.weights {
            policy_params.weights = weights;
        }
        if let Some(cost) = policy_file.default_cost_per_token {
            policy_params.default_cost_per_token = cost;
        }

        let mut config = Self {
            server: ServerConfig::default(),
            providers,
            tenants,
            policy_params,
            cost_table: policy_file.cost_per_token,
            health_check_interval: Duration::from_secs(300),
            rate_limit_window: Duration::from_secs(60),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("invalid PORT: {port}"))?;
        }

        if let Ok(interval) = std::env::var("HEALTH_CHECK_INTERVAL") {
            let ms: u64 = interval
                .parse()
                .with_context(|| format!("invalid HEALTH_CHECK_INTERVAL: {interval}"))?;
            self.health_check_interval = Duration::from_millis(ms);
        }

        if let Ok(window) = std::env::var("RATE_LIMIT_WINDOW_MS") {
            let ms: u64 = window
                .parse()
                .with_context(|| format!("invalid RATE_LIMIT_WINDOW_MS: {window}"))?;
            self.rate_limit_window = Duration::from_millis(ms);
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server port must be between 1 and 65535");
        }

        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        let enabled = self.providers.values().filter(|p| p.enabled).count();
        if enabled == 0 {
            anyhow::bail!("at least one provider must be enabled");
        }

        for (name, descriptor) in &self.providers {
            if descriptor.api_key_env.is_empty() {
                anyhow::bail!("provider {name} has an empty api_key_env");
            }
            if descriptor.timeout_ms == 0 {
                anyhow::bail!("provider {name} has a zero timeout");
            }
            if let Some(endpoint) = &descriptor.endpoint {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    anyhow::bail!("provider {name} endpoint must start with http:// or https://");
                }
            }
            if let Some(cost) = descriptor.cost_per_token {
                if cost < 0.0 {
                    anyhow::bail!("provider {name} has a negative cost_per_token");
                }
            }
        }

        if !(0.0..=1.0).contains(&self.policy_params.min_uptime) {
            anyhow::bail!("min_uptime must be between 0.0 and 1.0");
        }

        if self.health_check_interval.as_millis() == 0 {
            anyhow::bail!("health check interval cannot be 0");
        }
        if self.rate_limit_window.as_millis() == 0 {
            anyhow::bail!("rate limit window cannot be 0");
        }

        for tenant in &self.tenants {
            if tenant.tenant_id.is_empty() {
                anyhow::bail!("tenant with empty tenant_id");
            }
            if tenant.api_keys.is_empty() {
                anyhow::bail!("tenant {} has no API keys", tenant.tenant_id);
            }
            for provider in &tenant.allowed_providers {
                if !self.providers.contains_key(provider) {
                    // Ignored at routing time, but worth surfacing at startup.
                    tracing::warn!(
                        tenant_id = %tenant.tenant_id,
                        provider = %provider,
                        "tenant references an unconfigured provider"
                    );
                }
            }
        }

        Ok(())
    }

    /// Effective cost per token for `name`: policy-file table first, then the
    /// descriptor, then the policy default.
    pub fn cost_for(&self, name: &str) -> f64 {
        self.cost_table.get(name).copied().unwrap_or_else(|| {
            self.providers
                .get(name)
                .and_then(|d| d.cost_per_token)
                .unwrap_or(self.policy_params.default_cost_per_token)
        })
    }
}

fn load_tenants(dir: &Path) -> anyhow::Result<Vec<Tenant>> {
    let mut tenants = Vec::new();
    if !dir.exists() {
        tracing::warn!("tenant directory {} does not exist", dir.display());
        return Ok(tenants);
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let tenant: Tenant = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        tenants.push(tenant);
    }

    Ok(tenants)
}

fn load_policy_file(path: &Path) -> anyhow::Result<PolicyFile> {
    if !path.exists() {
        return Ok(PolicyFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
