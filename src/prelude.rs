//! Convenient re-exports for common orchestrator types.
pub use crate::{
    ApiDescriptor, ApiRegistry, CallEnvelope, CallStatus, CircuitBreaker, CircuitBreakerConfig,
    Clock, ConsentState, ConsentType, DataValidator, Decision, ExecuteRequest, FeatureFlags,
    HaltRecord, HaltStore, InMemoryHaltStore, Intent, Item, MonotonicClock, NoFeatureFlags,
    NullUsageSink, OrchestrationOutcome, OrchestratorConfig, OrchestratorError, ParallelFetcher,
    ProviderAdapter, ProviderPayload, RequestContext, RoutingTable, Snippet, ThresholdConfig,
    TieredOrchestrator, UsageRecord, UsageSink,
};
