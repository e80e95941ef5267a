#![forbid(unsafe_code)]

//! # Tiered Orchestrator
//!
//! A tiered, multi-provider API orchestrator for a shopping/travel conversational
//! assistant: per-API circuit breakers, bounded-parallel fan-out within a tier,
//! intent-specific sufficiency thresholds, and a two-layer consent gate that can
//! halt a run and resume it on a later request.
//!
//! ## Features
//!
//! - **Per-API circuit breakers**, two states only (closed/open); see [`circuit_breaker`]
//!   for why a half-open probe tier is deliberately absent.
//! - **Bounded-parallel fan-out** per tier, with per-call timeout and cooperative cancellation.
//! - **Sufficiency validation** against intent-specific thresholds, including a
//!   token-set Jaccard fuzzy match for comparison coverage.
//! - **Consent-gated escalation** past the auto-escalation ceiling, with a halt/resume
//!   protocol keyed by session id.
//! - **Usage/cost accounting** for every dispatched call and every granted consent event.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use tiered_orchestrator::{
//!     ApiRegistry, CircuitBreaker, CircuitBreakerConfig, ExecuteRequest, Intent,
//!     InMemoryHaltStore, NullUsageSink, ParallelFetcher, ProviderAdapter, ProviderPayload,
//!     RequestContext, TieredOrchestrator,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! struct EchoAdapter;
//!
//! #[async_trait::async_trait]
//! impl ProviderAdapter for EchoAdapter {
//!     async fn invoke(
//!         &self,
//!         _provider_tag: &str,
//!         _query: &str,
//!         _ctx: &RequestContext,
//!     ) -> Result<ProviderPayload, Box<dyn std::error::Error + Send + Sync>> {
//!         Ok(ProviderPayload::Products(vec![]))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(ApiRegistry::default());
//!     let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
//!
//!     let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
//!     for descriptor in registry.iter() {
//!         adapters.entry(descriptor.adapter_key.to_string()).or_insert_with(|| Arc::new(EchoAdapter));
//!     }
//!
//!     let fetcher = ParallelFetcher::new(registry, breaker, adapters, Arc::new(NullUsageSink));
//!     let orchestrator = TieredOrchestrator::with_defaults(
//!         Arc::new(InMemoryHaltStore::new()),
//!         Arc::new(NullUsageSink),
//!         fetcher,
//!     );
//!
//!     let request = ExecuteRequest { intent: Intent::Product, query: "vacuum".to_string(), ..Default::default() };
//!     let _outcome = orchestrator.execute(request, &CancellationToken::new()).await;
//! }
//! ```

mod circuit_breaker;
mod clock;
mod consent;
mod error;
mod fetcher;
mod intent;
mod orchestrator;
mod registry;
mod routing;
mod usage_log;
mod validator;

// Re-exports
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use clock::{Clock, MonotonicClock};
pub use consent::{is_confirmation, ConsentState, HaltRecord, HaltStore, InMemoryHaltStore};
pub use error::OrchestratorError;
pub use fetcher::{
    CallEnvelope, CallStatus, Item, ParallelFetcher, ProviderAdapter, ProviderPayload,
    RequestContext, Snippet,
};
pub use intent::{Intent, UnknownIntentTag};
pub use orchestrator::{
    ExecuteRequest, OrchestrationOutcome, OrchestratorConfig, OrchestratorConfigBuilder,
    TieredOrchestrator,
};
pub use registry::{ApiDescriptor, ApiRegistry, FeatureFlags, NoFeatureFlags};
pub use routing::RoutingTable;
pub use usage_log::{
    FallbackUsageSink, LogUsageSink, MemoryUsageSink, NonBlockingUsageSink, NullUsageSink,
    UsageRecord, UsageSink,
};
pub use validator::{default_thresholds, ConsentType, DataValidator, Decision, ThresholdConfig};

pub mod prelude;
