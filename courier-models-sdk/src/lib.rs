//! # Courier Models SDK
//!
//! The provider-facing half of the Courier gateway: normalized chat types,
//! upstream adapters, and the routing core that decides which upstream to
//! call, in what order, and how to fail over between them.
//!
//! ## Modules
//!
//! - [`models`]: the OpenAI-compatible request/response shapes and the
//!   routing metadata trail
//! - [`error`]: typed provider errors and the closed error-kind set
//! - [`providers`]: the `Provider` capability trait, the descriptor schema,
//!   and the Gemini / Groq / HuggingFace adapters
//! - [`circuit_breaker`]: per-provider CLOSED / OPEN / HALF_OPEN gating
//! - [`health`]: bounded rolling health history and aggregates
//! - [`policy`]: pure provider-ordering policies
//! - [`router`]: the failover executor tying it all together
//!
//! ## Example
//!
//! ```rust
//! use courier_models_sdk::models::{ChatRequest, Message};
//! use courier_models_sdk::policy::{PolicyParams, RoutingPolicy};
//! use courier_models_sdk::router::{RouterConfig, RouterCore, RoutingProfile};
//!
//! # async fn example(router: RouterCore) {
//! let request = ChatRequest {
//!     model: "gpt-3.5-turbo".to_string(),
//!     messages: vec![Message::user("Hello")],
//!     ..Default::default()
//! };
//!
//! let profile = RoutingProfile {
//!     tenant_id: "acme".to_string(),
//!     allowed_providers: vec!["groq-main".to_string(), "gemini-main".to_string()],
//!     policy: RoutingPolicy::Balanced,
//! };
//!
//! let response = router.route_chat(request, &profile).await;
//! # }
//! ```

pub mod circuit_breaker;
pub mod error;
pub mod health;
pub mod models;
pub mod policy;
pub mod providers;
pub mod router;

pub use error::{ErrorKind, ProviderError, RouterError};
pub use models::{ChatRequest, ChatResponse, Message, Role};
pub use providers::{create_provider, Provider, ProviderDescriptor, ProviderKind};
pub use router::{RegisteredProvider, RouterConfig, RouterCore, RoutingProfile};
