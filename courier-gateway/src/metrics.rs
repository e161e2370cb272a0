//! # Metrics Module
//!
//! Request and provider counters exposed in Prometheus text format at
//! `/metrics`. The collector is owned by the `App` value and injected where
//! needed; it is not a process-wide singleton.

use courier_models_sdk::circuit_breaker::BreakerSnapshot;
use courier_models_sdk::health::ProviderHealth;
use courier_models_sdk::models::{AttemptStatus, RoutingMetadata};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// In-process metrics counters.
pub struct MetricsCollector {
    started_at: Instant,
    http_requests: DashMap<(String, u16), u64>,
    request_duration_ms_sum: AtomicU64,
    request_count: AtomicU64,
    provider_attempts: DashMap<(String, &'static str), u64>,
    tenant_requests: DashMap<String, u64>,
    tokens_total: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            http_requests: DashMap::new(),
            request_duration_ms_sum: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
            provider_attempts: DashMap::new(),
            tenant_requests: DashMap::new(),
            tokens_total: AtomicU64::new(0),
        }
    }

    /// Record one finished HTTP request.
    pub fn record_http_request(&self, path: &str, status: u16, latency: Duration) {
        *self
            .http_requests
            .entry((path.to_string(), status))
            .or_insert(0) += 1;
        self.request_duration_ms_sum
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the attempt trail and token usage of a routed request.
    pub fn record_routing(&self, metadata: &RoutingMetadata, total_tokens: u64) {
        for attempt in &metadata.attempts {
            let outcome = match attempt.status {
                AttemptStatus::Success => "success",
                AttemptStatus::Failed => "failed",
            };
            *self
                .provider_attempts
                .entry((attempt.provider.clone(), outcome))
                .or_insert(0) += 1;
        }
        *self
            .tenant_requests
            .entry(metadata.tenant_id.clone())
            .or_insert(0) += 1;
        self.tokens_total.fetch_add(total_tokens, Ordering::Relaxed);
    }

    /// Render every series in Prometheus exposition format.
    pub fn render_prometheus(
        &self,
        breakers: &HashMap<String, BreakerSnapshot>,
        health: &HashMap<String, ProviderHealth>,
    ) -> String {
        let mut out = String::new();

        out.push_str("# HELP courier_uptime_seconds Gateway process uptime.\n");
        out.push_str("# TYPE courier_uptime_seconds gauge\n");
        let _ = writeln!(
            out,
            "courier_uptime_seconds {}",
            self.started_at.elapsed().as_secs()
        );

        out.push_str("# HELP courier_requests_total HTTP requests by path and status.\n");
        out.push_str("# TYPE courier_requests_total counter\n");
        let mut http: Vec<_> = self
            .http_requests
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        http.sort();
        for ((path, status), count) in http {
            let _ = writeln!(
                out,
                "courier_requests_total{{path=\"{path}\",status=\"{status}\"}} {count}"
            );
        }

        out.push_str("# HELP courier_request_duration_ms_sum Summed request latency.\n");
        out.push_str("# TYPE courier_request_duration_ms_sum counter\n");
        let _ = writeln!(
            out,
            "courier_request_duration_ms_sum {}",
            self.request_duration_ms_sum.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "courier_request_duration_ms_count {}",
            self.request_count.load(Ordering::Relaxed)
        );

        out.push_str("# HELP courier_provider_attempts_total Outbound attempts by outcome.\n");
        out.push_str("# TYPE courier_provider_attempts_total counter\n");
        let mut attempts: Vec<_> = self
            .provider_attempts
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        attempts.sort();
        for ((provider, outcome), count) in attempts {
            let _ = writeln!(
                out,
                "courier_provider_attempts_total{{provider=\"{provider}\",outcome=\"{outcome}\"}} {count}"
            );
        }

        out.push_str("# HELP courier_tokens_total Tokens processed across tenants.\n");
        out.push_str("# TYPE courier_tokens_total counter\n");
        let _ = writeln!(
            out,
            "courier_tokens_total {}",
            self.tokens_total.load(Ordering::Relaxed)
        );

        out.push_str("# HELP courier_tenant_requests_total Routed requests per tenant.\n");
        out.push_str("# TYPE courier_tenant_requests_total counter\n");
        let mut tenants: Vec<_> = self
            .tenant_requests
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        tenants.sort();
        for (tenant, count) in tenants {
            let _ = writeln!(
                out,
                "courier_tenant_requests_total{{tenant=\"{tenant}\"}} {count}"
            );
        }

        out.push_str("# HELP courier_provider_uptime_ratio Rolling uptime per provider.\n");
        out.push_str("# TYPE courier_provider_uptime_ratio gauge\n");
        let mut providers: Vec<_> = health.iter().collect();
        providers.sort_by_key(|(name, _)| name.clone());
        for (name, view) in &providers {
            let _ = writeln!(
                out,
                "courier_provider_uptime_ratio{{provider=\"{name}\"}} {:.4}",
                view.uptime
            );
            let _ = writeln!(
                out,
                "courier_provider_avg_latency_ms{{provider=\"{name}\"}} {:.1}",
                view.avg_latency_ms
            );
        }

        out.push_str("# HELP courier_circuit_breaker_open 1 when the breaker is open.\n");
        out.push_str("# TYPE courier_circuit_breaker_open gauge\n");
        let mut breaker_rows: Vec<_> = breakers.iter().collect();
        breaker_rows.sort_by_key(|(name, _)| name.clone());
        for (name, snapshot) in breaker_rows {
            let open = if snapshot.state == "open" { 1 } else { 0 };
            let _ = writeln!(
                out,
                "courier_circuit_breaker_open{{provider=\"{name}\"}} {open}"
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_models_sdk::models::AttemptRecord;

    fn metadata(attempts: Vec<AttemptRecord>) -> RoutingMetadata {
        RoutingMetadata {
            primary_provider: "groq-main".to_string(),
            attempts,
            total_processing_time: 42,
            policy_used: "balanced".to_string(),
            api_processing_time: None,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            tenant_id: "acme".to_string(),
        }
    }

    #[test]
    fn counters_show_up_in_exposition() {
        let collector = MetricsCollector::new();
        collector.record_http_request("/v1/chat/completions", 200, Duration::from_millis(120));
        collector.record_routing(
            &metadata(vec![
                AttemptRecord {
                    provider: "gemini-main".to_string(),
                    status: AttemptStatus::Failed,
                    duration_ms: 80,
                    error: Some("upstream rate limited".to_string()),
                },
                AttemptRecord {
                    provider: "groq-main".to_string(),
                    status: AttemptStatus::Success,
                    duration_ms: 40,
                    error: None,
                },
            ]),
            57,
        );

        let text = collector.render_prometheus(&HashMap::new(), &HashMap::new());
        assert!(text
            .contains("courier_requests_total{path=\"/v1/chat/completions\",status=\"200\"} 1"));
        assert!(text.contains(
            "courier_provider_attempts_total{provider=\"gemini-main\",outcome=\"failed\"} 1"
        ));
        assert!(text.contains(
            "courier_provider_attempts_total{provider=\"groq-main\",outcome=\"success\"} 1"
        ));
        assert!(text.contains("courier_tokens_total 57"));
        assert!(text.contains("courier_tenant_requests_total{tenant=\"acme\"} 1"));
    }
}
