//! # Health Tracker Module
//!
//! Rolling per-provider health history feeding the policy engine.
//!
//! Every in-line request outcome and every background probe result is
//! recorded here as a [`HealthSample`]. Each provider keeps a bounded ring of
//! the last `HISTORY_CAP` samples; aggregates ([`ProviderHealth`]) are
//! computed over the trailing `AGGREGATE_WINDOW` samples:
//!
//! - `uptime`: healthy fraction of the window, `1.0` before any sample
//! - `avg_latency_ms`: mean latency of healthy samples, `200.0` fallback
//!   when the window holds no healthy sample
//! - `consecutive_failures`: reset by any healthy sample; crossing 3 logs a
//!   warning, returning to 0 logs a recovery

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Maximum samples retained per provider.
pub const HISTORY_CAP: usize = 100;

/// Trailing window the aggregates are computed over.
pub const AGGREGATE_WINDOW: usize = 20;

/// Latency recorded for unhealthy samples.
pub const UNHEALTHY_LATENCY_MS: u64 = 999_999;

/// Fallback average latency when no healthy sample is in the window.
pub const DEFAULT_LATENCY_MS: f64 = 200.0;

const FAILURE_WARN_THRESHOLD: u32 = 3;

/// Health status of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStatus {
    Healthy,
    Unhealthy,
}

/// A single health observation for one provider.
#[derive(Debug, Clone)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub status: SampleStatus,
    pub latency_ms: u64,
    pub error_kind: Option<ErrorKind>,
}

impl HealthSample {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            status: SampleStatus::Healthy,
            latency_ms,
            error_kind: None,
        }
    }

    pub fn unhealthy(error_kind: ErrorKind) -> Self {
        Self {
            timestamp: Utc::now(),
            status: SampleStatus::Unhealthy,
            latency_ms: UNHEALTHY_LATENCY_MS,
            error_kind: Some(error_kind),
        }
    }
}

/// Derived aggregates for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Healthy fraction of the trailing window, in [0, 1]
    pub uptime: f64,
    /// Mean latency of healthy samples in the window, milliseconds
    pub avg_latency_ms: f64,
    /// Unhealthy samples since the last healthy one
    pub consecutive_failures: u32,
    /// Samples currently retained
    pub samples: usize,
    /// Timestamp of the most recent sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sample_at: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    /// Aggregate view for a provider with no recorded history.
    pub fn unknown() -> Self {
        Self {
            uptime: 1.0,
            avg_latency_ms: DEFAULT_LATENCY_MS,
            consecutive_failures: 0,
            samples: 0,
            last_sample_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct ProviderHistory {
    samples: VecDeque<HealthSample>,
    consecutive_failures: u32,
}

impl ProviderHistory {
    fn aggregate(&self) -> ProviderHealth {
        if self.samples.is_empty() {
            return ProviderHealth {
                consecutive_failures: self.consecutive_failures,
                ..ProviderHealth::unknown()
            };
        }

        let window: Vec<&HealthSample> = self
            .samples
            .iter()
            .rev()
            .take(AGGREGATE_WINDOW)
            .collect();
        let healthy: Vec<&&HealthSample> = window
            .iter()
            .filter(|s| s.status == SampleStatus::Healthy)
            .collect();

        let uptime = healthy.len() as f64 / window.len() as f64;
        let avg_latency_ms = if healthy.is_empty() {
            DEFAULT_LATENCY_MS
        } else {
            healthy.iter().map(|s| s.latency_ms as f64).sum::<f64>() / healthy.len() as f64
        };

        ProviderHealth {
            uptime,
            avg_latency_ms,
            consecutive_failures: self.consecutive_failures,
            samples: self.samples.len(),
            last_sample_at: self.samples.back().map(|s| s.timestamp),
        }
    }
}

/// Bounded rolling health history for all providers.
///
/// One ring per provider behind a sharded map, so recording for provider A
/// never contends with reads for provider B.
#[derive(Default)]
pub struct HealthTracker {
    histories: DashMap<String, ProviderHistory>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample for `provider`, evicting the oldest past the cap.
    pub fn record(&self, provider: &str, sample: HealthSample) {
        let mut entry = self.histories.entry(provider.to_string()).or_default();

        match sample.status {
            SampleStatus::Healthy => {
                if entry.consecutive_failures > 0 {
                    tracing::info!(
                        provider = provider,
                        "provider recovered after {} consecutive failures",
                        entry.consecutive_failures
                    );
                }
                entry.consecutive_failures = 0;
            }
            SampleStatus::Unhealthy => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures == FAILURE_WARN_THRESHOLD {
                    tracing::warn!(
                        provider = provider,
                        error_kind = ?sample.error_kind,
                        "provider has failed {} consecutive health checks",
                        entry.consecutive_failures
                    );
                }
            }
        }

        entry.samples.push_back(sample);
        while entry.samples.len() > HISTORY_CAP {
            entry.samples.pop_front();
        }
    }

    /// Aggregate view for one provider; defaults for unknown providers.
    pub fn provider_health(&self, provider: &str) -> ProviderHealth {
        self.histories
            .get(provider)
            .map(|h| h.aggregate())
            .unwrap_or_else(ProviderHealth::unknown)
    }

    /// Copy of the aggregate view for every tracked provider.
    ///
    /// The router takes this snapshot before the failover loop so no lock is
    /// held across provider calls.
    pub fn snapshot(&self) -> HashMap<String, ProviderHealth> {
        self.histories
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().aggregate()))
            .collect()
    }

    /// Number of samples retained for `provider`, for tests and diagnostics.
    pub fn history_len(&self, provider: &str) -> usize {
        self.histories
            .get(provider)
            .map(|h| h.samples.len())
            .unwrap_or(0)
    }
}
