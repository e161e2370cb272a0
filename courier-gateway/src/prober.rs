//! # Periodic Health Prober
//!
//! Background task that pings every loaded provider at
//! `HEALTH_CHECK_INTERVAL` (default 300 s) and feeds the results into the
//! shared health tracker, so providers that receive no traffic still have
//! fresh aggregates for the policy engine.
//!
//! Probes run serially with a 5 s timeout each and share no mutable state
//! with in-flight requests beyond the tracker itself. The prober is the
//! first thing stopped at shutdown.

use courier_models_sdk::error::ErrorKind;
use courier_models_sdk::health::{HealthSample, SampleStatus};
use courier_models_sdk::router::RouterCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Timeout for a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HealthProber {
    router: Arc<RouterCore>,
    interval: Duration,
}

impl HealthProber {
    pub fn new(router: Arc<RouterCore>, interval: Duration) -> Self {
        Self { router, interval }
    }

    /// Spawn the probe loop; it exits when `shutdown` flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately and seeds the tracker.
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.probe_all().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("health prober stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn probe_all(&self) {
        let providers = self.router.providers_for_probe().await;
        let health = self.router.health();

        for (name, provider) in providers {
            let report = match tokio::time::timeout(PROBE_TIMEOUT, provider.ping()).await {
                Ok(report) => report,
                Err(_) => {
                    tracing::warn!(provider = %name, "health probe timed out");
                    health.record(&name, HealthSample::unhealthy(ErrorKind::UpstreamTimeout));
                    continue;
                }
            };

            match report.status {
                SampleStatus::Healthy => {
                    tracing::debug!(
                        provider = %name,
                        latency_ms = report.latency_ms,
                        "health probe ok"
                    );
                    health.record(&name, HealthSample::healthy(report.latency_ms));
                }
                SampleStatus::Unhealthy => {
                    let kind = report.error_kind.unwrap_or(ErrorKind::UpstreamOther);
                    tracing::warn!(
                        provider = %name,
                        error_kind = kind.as_str(),
                        "health probe failed"
                    );
                    health.record(&name, HealthSample::unhealthy(kind));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_models_sdk::error::ProviderError;
    use courier_models_sdk::models::{ChatRequest, ChatResponse};
    use courier_models_sdk::policy::PolicyParams;
    use courier_models_sdk::providers::{PingReport, Provider};
    use courier_models_sdk::router::{RegisteredProvider, RouterConfig};

    struct FixedPingProvider {
        name: String,
        report: PingReport,
    }

    #[async_trait::async_trait]
    impl Provider for FixedPingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn chat_completion(
            &self,
            _request: ChatRequest,
        ) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Timeout)
        }

        async fn ping(&self) -> PingReport {
            self.report.clone()
        }
    }

    #[tokio::test]
    async fn probe_results_feed_the_tracker() {
        let router = Arc::new(RouterCore::new(
            RouterConfig::default(),
            PolicyParams::default(),
        ));
        router
            .replace_providers(
                [
                    (
                        "up".to_string(),
                        RegisteredProvider {
                            instance: Arc::new(FixedPingProvider {
                                name: "up".to_string(),
                                report: PingReport::healthy(40),
                            }),
                            cost_per_token: 0.002,
                        },
                    ),
                    (
                        "down".to_string(),
                        RegisteredProvider {
                            instance: Arc::new(FixedPingProvider {
                                name: "down".to_string(),
                                report: PingReport::unhealthy(
                                    5000,
                                    ErrorKind::UpstreamUnavailable,
                                ),
                            }),
                            cost_per_token: 0.002,
                        },
                    ),
                ]
                .into(),
            )
            .await;

        let prober = HealthProber::new(router.clone(), Duration::from_secs(300));
        prober.probe_all().await;

        let health = router.health();
        assert_eq!(health.provider_health("up").uptime, 1.0);
        assert_eq!(health.provider_health("up").avg_latency_ms, 40.0);
        assert_eq!(health.provider_health("down").uptime, 0.0);
        assert_eq!(health.provider_health("down").consecutive_failures, 1);
    }
}
