//! # Router Core Module
//!
//! Orchestrates a single chat request across the provider fleet:
//!
//! 1. Resolve candidates: the tenant's allowed providers intersected with the
//!    loaded provider map, filtered by circuit-breaker availability. Unknown
//!    names in the allow-list are silently ignored; an empty result fails
//!    with `NoProvidersAvailable`.
//! 2. Snapshot health aggregates (a copy, so no lock is held across calls).
//! 3. Order the candidates through the pure policy engine.
//! 4. Try providers sequentially, each attempt wrapped in the router's own
//!    deadline. Breaker and health-tracker updates for an attempt complete
//!    before the next attempt starts.
//! 5. On success, attach the routing metadata trail; on exhaustion, fail with
//!    `AllProvidersFailed` carrying every attempt.
//!
//! No provider is tried twice within one request, and per-attempt deadlines
//! are independent: a slow provider does not eat the next one's budget.
//!
//! The provider map is replaced atomically on reload; the router exclusively
//! owns the provider instances, their breakers, and the health tracker.

use crate::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};
use crate::error::{ErrorKind, RouterError};
use crate::health::{HealthSample, HealthTracker};
use crate::models::{AttemptRecord, AttemptStatus, ChatRequest, ChatResponse, RoutingMetadata};
use crate::policy::{order_providers, PolicyParams, ProviderCandidate, RoutingPolicy};
use crate::providers::Provider;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Router tunables.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Router-level deadline per attempt, independent of the adapter timeout
    pub attempt_timeout: Duration,
    /// Breaker settings applied to every provider
    pub breaker: CircuitBreakerConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(15),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Per-request routing inputs derived from the authenticated tenant.
#[derive(Debug, Clone)]
pub struct RoutingProfile {
    pub tenant_id: String,
    /// Ordered preference input; unknown names are ignored at routing time
    pub allowed_providers: Vec<String>,
    pub policy: RoutingPolicy,
}

/// A loaded provider instance plus the metadata the policy engine needs.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub instance: Arc<dyn Provider>,
    pub cost_per_token: f64,
}

/// The failover executor. Owns the provider map, one circuit breaker per
/// provider, and the health tracker.
pub struct RouterCore {
    providers: RwLock<HashMap<String, RegisteredProvider>>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    health: Arc<HealthTracker>,
    policy_params: PolicyParams,
    config: RouterConfig,
}

impl RouterCore {
    pub fn new(config: RouterConfig, policy_params: PolicyParams) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            breakers: DashMap::new(),
            health: Arc::new(HealthTracker::new()),
            policy_params,
            config,
        }
    }

    /// Atomically replace the whole provider map (startup and hot reload).
    ///
    /// Breakers are created for new providers and dropped for removed ones;
    /// surviving providers keep their breaker state.
    pub async fn replace_providers(&self, map: HashMap<String, RegisteredProvider>) {
        {
            let mut providers = self.providers.write().await;
            *providers = map;

            self.breakers.retain(|name, _| providers.contains_key(name));
            for name in providers.keys() {
                self.breakers.entry(name.clone()).or_insert_with(|| {
                    Arc::new(CircuitBreaker::new(name.clone(), self.config.breaker.clone()))
                });
            }
        }
        tracing::info!(
            providers = self.breakers.len(),
            "provider map replaced"
        );
    }

    fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name.to_string(),
                    self.config.breaker.clone(),
                ))
            })
            .clone()
    }

    /// Shared health tracker, also fed by the background prober.
    pub fn health(&self) -> Arc<HealthTracker> {
        self.health.clone()
    }

    /// Names of all loaded providers.
    pub async fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instances for the background prober to ping.
    pub async fn providers_for_probe(&self) -> Vec<(String, Arc<dyn Provider>)> {
        let providers = self.providers.read().await;
        let mut list: Vec<(String, Arc<dyn Provider>)> = providers
            .iter()
            .map(|(name, p)| (name.clone(), p.instance.clone()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    /// Breaker view per provider, for the health endpoints.
    pub async fn breaker_snapshots(&self) -> HashMap<String, BreakerSnapshot> {
        let mut snapshots = HashMap::new();
        for entry in self.breakers.iter() {
            snapshots.insert(entry.key().clone(), entry.value().snapshot().await);
        }
        snapshots
    }

    /// Number of loaded providers whose breaker currently admits calls.
    pub async fn available_provider_count(&self) -> usize {
        let names = self.provider_names().await;
        let mut available = 0;
        for name in names {
            if self.breaker(&name).is_available().await {
                available += 1;
            }
        }
        available
    }

    /// Route one chat request with failover.
    pub async fn route_chat(
        &self,
        request: ChatRequest,
        profile: &RoutingProfile,
    ) -> Result<ChatResponse, RouterError> {
        let started = Instant::now();

        // Candidate resolution: allow-list ∩ loaded map, breaker-gated,
        // first occurrence wins so no provider can be tried twice.
        let mut instances: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        let mut candidates: Vec<ProviderCandidate> = Vec::new();
        {
            let providers = self.providers.read().await;
            for name in &profile.allowed_providers {
                if instances.contains_key(name) {
                    continue;
                }
                let Some(registered) = providers.get(name) else {
                    continue;
                };
                if !self.breaker(name).is_available().await {
                    continue;
                }
                instances.insert(name.clone(), registered.instance.clone());
                candidates.push(ProviderCandidate {
                    name: name.clone(),
                    cost_per_token: registered.cost_per_token,
                });
            }
        }

        if candidates.is_empty() {
            tracing::warn!(
                tenant_id = %profile.tenant_id,
                "no providers available after allow-list and breaker filtering"
            );
            return Err(RouterError::NoProvidersAvailable);
        }

        let health_snapshot = self.health.snapshot();
        let order = order_providers(
            &candidates,
            &health_snapshot,
            profile.policy,
            &self.policy_params,
        );

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error = ErrorKind::UpstreamOther;

        for name in order {
            let provider = instances
                .get(&name)
                .expect("ordered providers come from the candidate set")
                .clone();

            let attempt_start = Instant::now();
            let outcome = tokio::time::timeout(
                self.config.attempt_timeout,
                provider.chat_completion(request.clone()),
            )
            .await;
            let duration_ms = attempt_start.elapsed().as_millis() as u64;

            let (kind, message) = match outcome {
                Ok(Ok(mut response)) => {
                    self.breaker(&name).record_success().await;
                    self.health.record(&name, HealthSample::healthy(duration_ms));
                    attempts.push(AttemptRecord {
                        provider: name.clone(),
                        status: AttemptStatus::Success,
                        duration_ms,
                        error: None,
                    });

                    tracing::debug!(
                        provider = %name,
                        tenant_id = %profile.tenant_id,
                        duration_ms,
                        attempts = attempts.len(),
                        "request routed"
                    );

                    response.routing_metadata = Some(RoutingMetadata {
                        primary_provider: name,
                        attempts,
                        total_processing_time: started.elapsed().as_millis() as u64,
                        policy_used: profile.policy.as_str().to_string(),
                        api_processing_time: None,
                        timestamp: chrono::Utc::now().to_rfc3339(),
                        tenant_id: profile.tenant_id.clone(),
                    });
                    return Ok(response);
                }
                Ok(Err(e)) => (e.kind(), e.to_string()),
                Err(_) => (
                    ErrorKind::UpstreamTimeout,
                    "attempt deadline exceeded".to_string(),
                ),
            };

            tracing::warn!(
                provider = %name,
                tenant_id = %profile.tenant_id,
                error_kind = kind.as_str(),
                duration_ms,
                "attempt failed, trying next provider"
            );

            self.breaker(&name).record_failure().await;
            self.health.record(&name, HealthSample::unhealthy(kind));
            attempts.push(AttemptRecord {
                provider: name,
                status: AttemptStatus::Failed,
                duration_ms,
                error: Some(message),
            });
            last_error = kind;
        }

        Err(RouterError::AllProvidersFailed {
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{Choice, Message, Role, Usage};
    use crate::providers::PingReport;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    fn response_from(provider: &str) -> ChatResponse {
        ChatResponse {
            id: format!("chatcmpl-{provider}"),
            object: "chat.completion".to_string(),
            created: 1_700_000_000,
            model: "test-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message {
                    role: Role::Assistant,
                    content: format!("hello from {provider}"),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage::from_counts(10, 5),
            routing_metadata: None,
        }
    }

    /// Provider stub that plays back a queue of outcomes.
    struct ScriptedProvider {
        name: String,
        script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(
            name: &str,
            script: Vec<Result<ChatResponse, ProviderError>>,
        ) -> RegisteredProvider {
            RegisteredProvider {
                instance: Arc::new(Self {
                    name: name.to_string(),
                    script: Mutex::new(script.into()),
                    delay: None,
                }),
                cost_per_token: 0.002,
            }
        }

        fn slow(name: &str, delay: Duration) -> RegisteredProvider {
            RegisteredProvider {
                instance: Arc::new(Self {
                    name: name.to_string(),
                    script: Mutex::new(VecDeque::new()),
                    delay: Some(delay),
                }),
                cost_per_token: 0.002,
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn chat_completion(
            &self,
            _request: ChatRequest,
        ) -> Result<ChatResponse, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(response_from(&self.name)))
        }

        async fn ping(&self) -> PingReport {
            PingReport::healthy(1)
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            messages: vec![Message::user("Hello")],
            ..Default::default()
        }
    }

    fn profile(allowed: &[&str]) -> RoutingProfile {
        RoutingProfile {
            tenant_id: "acme".to_string(),
            allowed_providers: allowed.iter().map(|s| s.to_string()).collect(),
            policy: RoutingPolicy::Balanced,
        }
    }

    async fn router_with(providers: Vec<(&str, RegisteredProvider)>) -> RouterCore {
        let router = RouterCore::new(RouterConfig::default(), PolicyParams::default());
        router
            .replace_providers(
                providers
                    .into_iter()
                    .map(|(name, p)| (name.to_string(), p))
                    .collect(),
            )
            .await;
        router
    }

    #[tokio::test]
    async fn happy_path_attaches_routing_metadata() {
        let router = router_with(vec![("alpha", ScriptedProvider::new("alpha", vec![]))]).await;

        let response = router.route_chat(request(), &profile(&["alpha"])).await.unwrap();
        let metadata = response.routing_metadata.unwrap();

        assert_eq!(metadata.primary_provider, "alpha");
        assert_eq!(metadata.attempts.len(), 1);
        assert_eq!(metadata.attempts[0].status, AttemptStatus::Success);
        assert_eq!(metadata.policy_used, "balanced");
        assert_eq!(metadata.tenant_id, "acme");
    }

    #[tokio::test]
    async fn failover_moves_to_next_provider() {
        let router = router_with(vec![
            (
                "alpha",
                ScriptedProvider::new("alpha", vec![Err(ProviderError::RateLimited)]),
            ),
            ("beta", ScriptedProvider::new("beta", vec![])),
        ])
        .await;

        let response = router
            .route_chat(request(), &profile(&["alpha", "beta"]))
            .await
            .unwrap();
        let metadata = response.routing_metadata.unwrap();

        assert_eq!(metadata.attempts.len(), 2);
        assert_eq!(metadata.attempts[0].provider, "alpha");
        assert_eq!(metadata.attempts[0].status, AttemptStatus::Failed);
        assert_eq!(metadata.attempts[1].provider, "beta");
        assert_eq!(metadata.attempts[1].status, AttemptStatus::Success);
        assert_eq!(metadata.primary_provider, "beta");

        assert_eq!(router.breaker("alpha").failure_count().await, 1);
    }

    #[tokio::test]
    async fn no_provider_is_tried_twice() {
        let router = router_with(vec![(
            "alpha",
            ScriptedProvider::new("alpha", vec![Err(ProviderError::Timeout)]),
        )])
        .await;

        // The allow-list repeats the provider; the router must not.
        let err = router
            .route_chat(request(), &profile(&["alpha", "alpha", "alpha"]))
            .await
            .unwrap_err();

        match err {
            RouterError::AllProvidersFailed { attempts, last_error } => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(last_error, ErrorKind::UpstreamTimeout);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_allowed_providers_are_ignored() {
        let router = router_with(vec![("alpha", ScriptedProvider::new("alpha", vec![]))]).await;

        let response = router
            .route_chat(request(), &profile(&["ghost", "alpha"]))
            .await
            .unwrap();
        assert_eq!(
            response.routing_metadata.unwrap().primary_provider,
            "alpha"
        );
    }

    #[tokio::test]
    async fn empty_candidate_set_fails_fast() {
        let router = router_with(vec![("alpha", ScriptedProvider::new("alpha", vec![]))]).await;

        let err = router
            .route_chat(request(), &profile(&["ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoProvidersAvailable));
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_filters_candidates() {
        let failures: Vec<Result<ChatResponse, ProviderError>> = (0..5)
            .map(|_| {
                Err(ProviderError::Unavailable {
                    message: "down".to_string(),
                })
            })
            .collect();
        let router = router_with(vec![("alpha", ScriptedProvider::new("alpha", failures))]).await;

        for _ in 0..5 {
            let _ = router.route_chat(request(), &profile(&["alpha"])).await;
        }

        let snapshots = router.breaker_snapshots().await;
        assert_eq!(snapshots["alpha"].state, "open");

        // Sixth request: alpha is gated out, nothing remains.
        let err = router
            .route_chat(request(), &profile(&["alpha"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoProvidersAvailable));
    }

    #[tokio::test]
    async fn open_breaker_fails_over_to_healthy_provider() {
        let failures: Vec<Result<ChatResponse, ProviderError>> = (0..5)
            .map(|_| Err(ProviderError::RateLimited))
            .collect();
        let mut cheap_but_broken = ScriptedProvider::new("alpha", failures);
        cheap_but_broken.cost_per_token = 0.0005;
        let router = router_with(vec![
            ("alpha", cheap_but_broken),
            ("beta", ScriptedProvider::new("beta", vec![])),
        ])
        .await;

        // Cost-optimized keeps the cheap provider first, so each of the five
        // requests fails over from alpha to beta.
        let cost_profile = RoutingProfile {
            policy: RoutingPolicy::CostOptimized,
            ..profile(&["alpha", "beta"])
        };
        for _ in 0..5 {
            let response = router
                .route_chat(request(), &cost_profile)
                .await
                .unwrap();
            let metadata = response.routing_metadata.unwrap();
            assert_eq!(metadata.attempts[0].provider, "alpha");
            assert_eq!(metadata.primary_provider, "beta");
        }

        // Alpha's breaker is now open: the next request goes straight to beta.
        assert_eq!(
            router.breaker_snapshots().await["alpha"].state,
            "open"
        );
        let response = router.route_chat(request(), &cost_profile).await.unwrap();
        let metadata = response.routing_metadata.unwrap();
        assert_eq!(metadata.attempts.len(), 1);
        assert_eq!(metadata.attempts[0].provider, "beta");
    }

    #[tokio::test]
    async fn slow_provider_hits_the_router_deadline() {
        let config = RouterConfig {
            attempt_timeout: Duration::from_millis(50),
            breaker: CircuitBreakerConfig::default(),
        };
        let router = RouterCore::new(config, PolicyParams::default());
        router
            .replace_providers(
                [(
                    "sluggish".to_string(),
                    ScriptedProvider::slow("sluggish", Duration::from_secs(5)),
                )]
                .into(),
            )
            .await;

        let err = router
            .route_chat(request(), &profile(&["sluggish"]))
            .await
            .unwrap_err();

        match err {
            RouterError::AllProvidersFailed { attempts, last_error } => {
                assert_eq!(last_error, ErrorKind::UpstreamTimeout);
                assert_eq!(attempts[0].status, AttemptStatus::Failed);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn health_tracker_sees_every_attempt() {
        let router = router_with(vec![
            (
                "alpha",
                ScriptedProvider::new("alpha", vec![Err(ProviderError::RateLimited)]),
            ),
            ("beta", ScriptedProvider::new("beta", vec![])),
        ])
        .await;

        router
            .route_chat(request(), &profile(&["alpha", "beta"]))
            .await
            .unwrap();

        let health = router.health();
        assert_eq!(health.history_len("alpha"), 1);
        assert_eq!(health.history_len("beta"), 1);
        assert!(health.provider_health("alpha").uptime < 1.0);
        assert_eq!(health.provider_health("beta").uptime, 1.0);
    }

    #[tokio::test]
    async fn replace_providers_drops_stale_breakers() {
        let router = router_with(vec![("alpha", ScriptedProvider::new("alpha", vec![]))]).await;
        assert!(router.breaker_snapshots().await.contains_key("alpha"));

        router
            .replace_providers(
                [("beta".to_string(), ScriptedProvider::new("beta", vec![]))].into(),
            )
            .await;

        let snapshots = router.breaker_snapshots().await;
        assert!(!snapshots.contains_key("alpha"));
        assert!(snapshots.contains_key("beta"));
    }
}
