//! # Policy Engine Module
//!
//! Pure provider-ordering policies. Given the candidate set (already gated by
//! the tenant allow-list and the circuit breakers), a health snapshot, and
//! policy parameters, [`order_providers`] returns the order in which the
//! router should try the candidates. No I/O, no side effects, deterministic
//! for identical inputs.
//!
//! ## Built-in policies
//!
//! - **cost-optimized**: ascending `cost_per_token`, ties broken by
//!   descending uptime
//! - **performance-first**: ascending average latency, ties broken by
//!   descending uptime
//! - **balanced** (default): weighted score over uptime, latency and cost,
//!   descending, ties broken lexicographically by provider name
//!
//! Every policy first drops candidates whose uptime is below `min_uptime`;
//! if that leaves nothing, the floor is ignored and the full candidate set is
//! ordered instead (fail-open, never fail-empty). The floor only applies to
//! providers with a full aggregate window of observations: with fewer samples
//! the uptime estimate is noise, and fresh failure streaks are the circuit
//! breaker's call, not the policy's.

use crate::health::ProviderHealth;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named provider-ordering policy.
///
/// `performance_first` is accepted as a config-file synonym for the canonical
/// `performance-first` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingPolicy {
    CostOptimized,
    #[serde(alias = "performance_first")]
    PerformanceFirst,
    #[default]
    Balanced,
}

impl RoutingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingPolicy::CostOptimized => "cost-optimized",
            RoutingPolicy::PerformanceFirst => "performance-first",
            RoutingPolicy::Balanced => "balanced",
        }
    }
}

/// Weights for the balanced score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub uptime: f64,
    pub latency: f64,
    pub cost: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            uptime: 0.3,
            latency: 0.4,
            cost: 0.3,
        }
    }
}

/// Tunable policy parameters, overridable from `policies/routing.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyParams {
    /// Candidates below this uptime are filtered out first (fail-open)
    pub min_uptime: f64,
    /// Weights for the balanced score
    pub weights: ScoreWeights,
    /// Cost assumed for providers without an explicit `cost_per_token`
    pub default_cost_per_token: f64,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            min_uptime: 0.90,
            weights: ScoreWeights::default(),
            default_cost_per_token: 0.002,
        }
    }
}

/// A provider eligible for this request, with its resolved cost.
#[derive(Debug, Clone)]
pub struct ProviderCandidate {
    pub name: String,
    pub cost_per_token: f64,
}

struct ScoredCandidate<'a> {
    candidate: &'a ProviderCandidate,
    uptime: f64,
    avg_latency_ms: f64,
    samples: usize,
}

/// Order `candidates` according to `policy`.
///
/// Providers missing from the health snapshot are treated as never observed:
/// full uptime and the default latency.
pub fn order_providers(
    candidates: &[ProviderCandidate],
    health: &HashMap<String, ProviderHealth>,
    policy: RoutingPolicy,
    params: &PolicyParams,
) -> Vec<String> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let unknown = ProviderHealth::unknown();
    let scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|candidate| {
            let view = health.get(&candidate.name).unwrap_or(&unknown);
            ScoredCandidate {
                candidate,
                uptime: view.uptime.clamp(0.0, 1.0),
                avg_latency_ms: view.avg_latency_ms,
                samples: view.samples,
            }
        })
        .collect();

    // Uptime floor, fail-open when it would empty the set. Providers still
    // filling their first aggregate window are exempt.
    let above_floor: Vec<&ScoredCandidate> = scored
        .iter()
        .filter(|s| s.samples < crate::health::AGGREGATE_WINDOW || s.uptime >= params.min_uptime)
        .collect();
    let mut pool: Vec<&ScoredCandidate> = if above_floor.is_empty() {
        scored.iter().collect()
    } else {
        above_floor
    };

    match policy {
        RoutingPolicy::CostOptimized => {
            pool.sort_by(|a, b| {
                a.candidate
                    .cost_per_token
                    .total_cmp(&b.candidate.cost_per_token)
                    .then(b.uptime.total_cmp(&a.uptime))
                    .then(a.candidate.name.cmp(&b.candidate.name))
            });
        }
        RoutingPolicy::PerformanceFirst => {
            pool.sort_by(|a, b| {
                a.avg_latency_ms
                    .total_cmp(&b.avg_latency_ms)
                    .then(b.uptime.total_cmp(&a.uptime))
                    .then(a.candidate.name.cmp(&b.candidate.name))
            });
        }
        RoutingPolicy::Balanced => {
            let weights = &params.weights;
            pool.sort_by(|a, b| {
                let score_a = balanced_score(a, weights);
                let score_b = balanced_score(b, weights);
                score_b
                    .total_cmp(&score_a)
                    .then(a.candidate.name.cmp(&b.candidate.name))
            });
        }
    }

    pool.iter().map(|s| s.candidate.name.clone()).collect()
}

fn balanced_score(candidate: &ScoredCandidate, weights: &ScoreWeights) -> f64 {
    let uptime_score = candidate.uptime;
    let latency_score = (1.0 - candidate.avg_latency_ms / 2000.0).max(0.0);
    let cost_score = (1.0 - candidate.candidate.cost_per_token / 0.01).max(0.0);

    weights.uptime * uptime_score + weights.latency * latency_score + weights.cost * cost_score
}
