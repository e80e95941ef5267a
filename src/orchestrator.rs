//! Main tier-escalation loop: fan out, merge, validate, escalate or halt.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::consent::{is_confirmation, ConsentState, HaltRecord, HaltStore};
use crate::fetcher::{CallStatus, Item, ParallelFetcher, RequestContext, Snippet};
use crate::intent::Intent;
use crate::registry::{ApiRegistry, FeatureFlags, NoFeatureFlags};
use crate::routing::RoutingTable;
use crate::usage_log::{UsageRecord, UsageSink};
use crate::validator::{ConsentType, DataValidator, Decision};

/// Orchestrator-wide tunables. Per-API cost/timeout/consent/flag data lives on
/// [`crate::registry::ApiDescriptor`] instead, since it's registry data rather than
/// a run-wide policy.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Highest tier (1-2) that may auto-escalate without consent.
    pub max_auto_tier: u8,
    /// How long a halt record survives before a store may expire it.
    pub halt_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_auto_tier: 2, halt_ttl: Duration::from_secs(600) }
    }
}

impl OrchestratorConfig {
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn max_auto_tier(mut self, max_auto_tier: u8) -> Self {
        self.config.max_auto_tier = max_auto_tier;
        self
    }

    pub fn halt_ttl(mut self, halt_ttl: Duration) -> Self {
        self.config.halt_ttl = halt_ttl;
        self
    }

    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}

/// Everything one call to [`TieredOrchestrator::execute`] needs beyond the query itself.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub intent: Intent,
    pub query: String,
    pub requested_products: Vec<String>,
    pub ctx: RequestContext,
    pub session_id: Option<String>,
    /// The inbound turn's raw message, inspected for a per-query consent confirmation.
    pub inbound_message: Option<String>,
    pub account_toggle_on: bool,
}

impl Default for ExecuteRequest {
    /// `intent` defaults to `Product` purely so `..Default::default()` is usable in
    /// call sites that always override it explicitly; there is no meaningful default intent.
    fn default() -> Self {
        Self {
            intent: Intent::Product,
            query: String::new(),
            requested_products: Vec::new(),
            ctx: RequestContext::default(),
            session_id: None,
            inbound_message: None,
            account_toggle_on: false,
        }
    }
}

/// Terminal result of an orchestration run.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    Sufficient { items: Vec<Item>, snippets: Vec<Snippet>, sources_used: Vec<String> },
    ConsentRequired {
        items: Vec<Item>,
        snippets: Vec<Snippet>,
        sources_used: Vec<String>,
        consent_type: ConsentType,
        message: &'static str,
    },
    Exhausted { items: Vec<Item>, snippets: Vec<Snippet>, sources_used: Vec<String> },
}

struct Accumulator {
    items: Vec<Item>,
    item_keys: HashSet<String>,
    snippets: Vec<Snippet>,
    snippet_keys: HashSet<String>,
    sources_used: Vec<String>,
    sources_seen: HashSet<String>,
}

impl Accumulator {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            item_keys: HashSet::new(),
            snippets: Vec::new(),
            snippet_keys: HashSet::new(),
            sources_used: Vec::new(),
            sources_seen: HashSet::new(),
        }
    }

    fn from_halt(halt: &HaltRecord) -> Self {
        let mut acc = Self::empty();
        for item in &halt.accumulated_items {
            acc.push_item(item.clone());
        }
        for snippet in &halt.accumulated_snippets {
            acc.push_snippet(snippet.clone());
        }
        for source in &halt.sources_used_so_far {
            acc.push_source(source);
        }
        acc
    }

    fn push_item(&mut self, item: Item) {
        let key = item.dedup_key();
        if self.item_keys.insert(key) {
            self.items.push(item);
        }
    }

    fn push_snippet(&mut self, snippet: Snippet) {
        let key = snippet.content_key();
        if self.snippet_keys.insert(key) {
            self.snippets.push(snippet);
        }
    }

    fn push_source(&mut self, name: &str) {
        if self.sources_seen.insert(name.to_string()) {
            self.sources_used.push(name.to_string());
        }
    }
}

/// Ties the registry, routing table, breaker, fetcher, validator, halt store, and
/// usage sink together into the single-entrypoint tier-escalation loop.
pub struct TieredOrchestrator {
    registry: Arc<ApiRegistry>,
    flags: Arc<dyn FeatureFlags>,
    routing: Arc<RoutingTable>,
    breaker: CircuitBreaker,
    fetcher: ParallelFetcher,
    validator: DataValidator,
    halt_store: Arc<dyn HaltStore>,
    usage_sink: Arc<dyn UsageSink>,
    config: OrchestratorConfig,
}

impl TieredOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ApiRegistry>,
        flags: Arc<dyn FeatureFlags>,
        routing: Arc<RoutingTable>,
        breaker: CircuitBreaker,
        fetcher: ParallelFetcher,
        validator: DataValidator,
        halt_store: Arc<dyn HaltStore>,
        usage_sink: Arc<dyn UsageSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { registry, flags, routing, breaker, fetcher, validator, halt_store, usage_sink, config }
    }

    /// Construct with no feature flags enabled, an in-process halt store, and a
    /// discarding usage sink, suitable for tests and quick prototyping.
    pub fn with_defaults(halt_store: Arc<dyn HaltStore>, usage_sink: Arc<dyn UsageSink>, fetcher: ParallelFetcher) -> Self {
        use crate::validator::default_thresholds;

        let registry = Arc::new(ApiRegistry::default());
        let routing = Arc::new(RoutingTable::default());
        let breaker = CircuitBreaker::new(crate::circuit_breaker::CircuitBreakerConfig::default());
        let config = OrchestratorConfig::default();
        let validator = DataValidator::new(default_thresholds(), config.max_auto_tier);

        Self::new(registry, Arc::new(NoFeatureFlags), routing, breaker, fetcher, validator, halt_store, usage_sink, config)
    }

    pub async fn execute(&self, request: ExecuteRequest, cancel: &CancellationToken) -> OrchestrationOutcome {
        let (mut tier, mut acc, mut per_query_confirmed) = self.resolve_start_state(&request).await;

        loop {
            let names = self
                .routing
                .apis_for(request.intent, tier, &self.registry, self.flags.as_ref(), &self.breaker)
                .unwrap_or_default();

            let envelopes = self.fetcher.fetch_tier(&names, &request.query, &request.ctx, tier, cancel).await;

            for name in names.iter().copied() {
                let Some(envelope) = envelopes.get(name) else { continue };
                if envelope.status != CallStatus::Success {
                    continue;
                }
                acc.push_source(name);
                if let Some(payload) = &envelope.payload {
                    for item in payload.items() {
                        acc.push_item(item.clone());
                    }
                    for snippet in payload.snippets() {
                        acc.push_snippet(snippet.clone());
                    }
                }
            }

            let consent_state = ConsentState { account_toggle_on: request.account_toggle_on, per_query_confirmed };

            let decision = self.validator.validate(
                request.intent,
                tier,
                &acc.items,
                acc.snippets.len(),
                &acc.sources_used,
                &request.requested_products,
                &consent_state,
            );

            match decision {
                Decision::Sufficient { sources_used } => {
                    self.clear_halt(&request).await;
                    return OrchestrationOutcome::Sufficient { items: acc.items, snippets: acc.snippets, sources_used };
                }
                Decision::Escalate { next_tier } => {
                    if next_tier > self.config.max_auto_tier {
                        self.log_consent_usage(&request, next_tier, consent_state).await;
                    }
                    tier = next_tier;
                    continue;
                }
                Decision::ConsentRequired { consent_type, message, next_tier: _ } => {
                    self.persist_halt(&request, &acc, tier, consent_type).await;
                    return OrchestrationOutcome::ConsentRequired {
                        items: acc.items,
                        snippets: acc.snippets,
                        sources_used: acc.sources_used,
                        consent_type,
                        message,
                    };
                }
                Decision::Exhausted { sources_used } => {
                    self.clear_halt(&request).await;
                    return OrchestrationOutcome::Exhausted { items: acc.items, snippets: acc.snippets, sources_used };
                }
            }
        }
    }

    /// Decide the starting tier/accumulator/per-query-confirmation state: either a
    /// fresh run, or a resume from a halt record if one exists and the inbound
    /// message is a confirmation. A non-confirming message on a halted session
    /// discards the halt record and starts fresh.
    async fn resolve_start_state(&self, request: &ExecuteRequest) -> (u8, Accumulator, bool) {
        let confirmed = request.inbound_message.as_deref().map(is_confirmation).unwrap_or(false);

        let Some(session_id) = &request.session_id else {
            return (1, Accumulator::empty(), confirmed);
        };

        let halt = match self.halt_store.get(session_id).await {
            Ok(halt) => halt,
            Err(err) => {
                tracing::warn!(session_id, error = %err, "halt store read failed; starting fresh");
                None
            }
        };

        match halt {
            Some(record) if confirmed => {
                let tier = record.tier_reached + 1;
                (tier, Accumulator::from_halt(&record), true)
            }
            Some(_) => {
                self.clear_halt(request).await;
                (1, Accumulator::empty(), confirmed)
            }
            None => (1, Accumulator::empty(), confirmed),
        }
    }

    async fn persist_halt(&self, request: &ExecuteRequest, acc: &Accumulator, tier: u8, consent_type: ConsentType) {
        let Some(session_id) = &request.session_id else { return };

        let record = HaltRecord {
            intent: request.intent,
            query: request.query.clone(),
            requested_products: request.requested_products.clone(),
            accumulated_items: acc.items.clone(),
            accumulated_snippets: acc.snippets.clone(),
            sources_used_so_far: acc.sources_used.clone(),
            tier_reached: tier,
            pending_consent_type: consent_type.as_str().to_string(),
        };

        if let Err(err) = self.halt_store.set(session_id, &record, self.config.halt_ttl).await {
            tracing::error!(session_id, error = %err, "halt record persistence failed; consent prompt returned anyway");
        }
    }

    async fn clear_halt(&self, request: &ExecuteRequest) {
        let Some(session_id) = &request.session_id else { return };
        if let Err(err) = self.halt_store.delete(session_id).await {
            tracing::warn!(session_id, error = %err, "halt record delete failed");
        }
    }

    /// Logs a consent-event usage record for each consent dimension that authorized
    /// this escalation, at the moment the escalation is actually granted.
    async fn log_consent_usage(&self, request: &ExecuteRequest, next_tier: u8, consent: ConsentState) {
        if consent.account_toggle_on {
            self.usage_sink
                .record(UsageRecord::consent_event(&request.ctx, ConsentType::AccountToggle.as_str(), next_tier))
                .await;
        }
        if consent.per_query_confirmed {
            self.usage_sink
                .record(UsageRecord::consent_event(&request.ctx, ConsentType::PerQuery.as_str(), next_tier))
                .await;
        }
    }
}
