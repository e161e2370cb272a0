//! # Tenant Registry Module
//!
//! Tenants are the gateway's customers: each owns a set of API keys, an
//! ordered provider allow-list, a routing policy, and quotas. The registry
//! answers three questions:
//!
//! - `find_by_api_key`: constant-time key → tenant lookup over a
//!   precomputed reverse index
//! - `check_quota`: read-only quota verdict, applying the daily-reset rule
//!   when a daily counter is read
//! - `track_usage`: per-tenant counters incremented after a request
//!   completes; blocked requests are never counted
//!
//! Usage is in-memory and lost on restart. That is a documented limitation
//! of the core; a persistent counter store could back this same surface
//! without any caller changing.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use courier_models_sdk::policy::RoutingPolicy;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-tenant limits. Absent limits mean unlimited.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenantQuotas {
    #[serde(default)]
    pub daily_requests: Option<u64>,
    #[serde(default)]
    pub monthly_requests: Option<u64>,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
}

/// A tenant record, loaded from `tenants/<tenant_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    /// API keys identifying this tenant; unique across all tenants
    pub api_keys: Vec<String>,
    /// Ordered provider preference; unknown names are ignored at routing time
    pub allowed_providers: Vec<String>,
    /// Provider-ordering policy for this tenant's requests
    #[serde(default)]
    pub routing_policy: RoutingPolicy,
    #[serde(default)]
    pub quotas: TenantQuotas,
}

/// In-memory usage counters for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct TenantUsage {
    pub daily_requests: u64,
    pub monthly_requests: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
    pub last_daily_reset: DateTime<Utc>,
}

impl TenantUsage {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_requests: 0,
            monthly_requests: 0,
            total_tokens: 0,
            estimated_cost: 0.0,
            last_daily_reset: now,
        }
    }

    /// Reset the daily counter once 24 hours have passed since the last reset.
    fn apply_daily_reset(&mut self, now: DateTime<Utc>) {
        if now - self.last_daily_reset >= ChronoDuration::hours(24) {
            self.daily_requests = 0;
            self.last_daily_reset = now;
        }
    }
}

/// Which quota a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Daily,
    Monthly,
}

/// Verdict of a quota check.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub used: u64,
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
}

/// Usage reported after a completed request.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub total_tokens: u64,
    pub duration_ms: u64,
    pub model: String,
    pub estimated_cost: f64,
}

/// Owns all tenants and their usage counters.
pub struct TenantRegistry {
    tenants: HashMap<String, Arc<Tenant>>,
    by_api_key: HashMap<String, String>,
    usage: DashMap<String, TenantUsage>,
}

impl TenantRegistry {
    /// Build the registry and its reverse key index.
    ///
    /// Duplicate API keys across tenants are a configuration error.
    pub fn new(tenants: Vec<Tenant>) -> anyhow::Result<Self> {
        let mut by_api_key = HashMap::new();
        let mut map = HashMap::new();

        for tenant in tenants {
            for key in &tenant.api_keys {
                if by_api_key
                    .insert(key.clone(), tenant.tenant_id.clone())
                    .is_some()
                {
                    anyhow::bail!(
                        "API key {} is assigned to more than one tenant",
                        crate::gateway_error::key_prefix(key)
                    );
                }
            }
            if map
                .insert(tenant.tenant_id.clone(), Arc::new(tenant))
                .is_some()
            {
                anyhow::bail!("duplicate tenant_id in tenant configuration");
            }
        }

        Ok(Self {
            tenants: map,
            by_api_key,
            usage: DashMap::new(),
        })
    }

    pub fn find_by_api_key(&self, key: &str) -> Option<Arc<Tenant>> {
        let tenant_id = self.by_api_key.get(key)?;
        self.tenants.get(tenant_id).cloned()
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    /// Read-only quota verdict for one tenant.
    pub fn check_quota(&self, tenant_id: &str, kind: QuotaKind) -> QuotaCheck {
        let now = Utc::now();
        let limit = self.tenants.get(tenant_id).and_then(|t| match kind {
            QuotaKind::Daily => t.quotas.daily_requests,
            QuotaKind::Monthly => t.quotas.monthly_requests,
        });

        let mut entry = self
            .usage
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantUsage::new(now));
        entry.apply_daily_reset(now);

        let used = match kind {
            QuotaKind::Daily => entry.daily_requests,
            QuotaKind::Monthly => entry.monthly_requests,
        };

        match limit {
            Some(limit) => QuotaCheck {
                allowed: used < limit,
                used,
                limit: Some(limit),
                remaining: Some(limit.saturating_sub(used)),
            },
            None => QuotaCheck {
                allowed: true,
                used,
                limit: None,
                remaining: None,
            },
        }
    }

    /// Record usage for a completed request.
    pub fn track_usage(&self, tenant_id: &str, event: UsageEvent) {
        let now = Utc::now();
        let mut entry = self
            .usage
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantUsage::new(now));
        entry.apply_daily_reset(now);

        entry.daily_requests += 1;
        entry.monthly_requests += 1;
        entry.total_tokens += event.total_tokens;
        entry.estimated_cost += event.estimated_cost;

        tracing::debug!(
            tenant_id,
            tokens = event.total_tokens,
            duration_ms = event.duration_ms,
            model = %event.model,
            "usage tracked"
        );
    }

    /// Copy of a tenant's current usage counters.
    pub fn usage_snapshot(&self, tenant_id: &str) -> TenantUsage {
        let now = Utc::now();
        let mut entry = self
            .usage
            .entry(tenant_id.to_string())
            .or_insert_with(|| TenantUsage::new(now));
        entry.apply_daily_reset(now);
        entry.clone()
    }
}
