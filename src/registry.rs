//! Static catalog of logical API names → provider adapter configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Configuration for a single logical API, as declared in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDescriptor {
    /// Unique identifier used by the routing table and by callers.
    pub name: &'static str,
    /// Which concrete provider adapter implementation handles this API.
    pub adapter_key: &'static str,
    /// Parameterizes the adapter (e.g. `amazon` vs `walmart` through one shopping adapter).
    pub provider_tag: &'static str,
    /// Cost per call, in hundredths of a currency unit. 0 for affiliates.
    pub cost_units: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Whether this API requires user consent before it may be dispatched.
    pub requires_consent: bool,
    /// Config flag that must be enabled for this descriptor to be active.
    pub feature_flag: Option<&'static str>,
}

impl ApiDescriptor {
    const fn new(name: &'static str, adapter_key: &'static str, provider_tag: &'static str) -> Self {
        Self {
            name,
            adapter_key,
            provider_tag,
            cost_units: 0,
            timeout: Duration::from_secs(5),
            requires_consent: false,
            feature_flag: None,
        }
    }

    const fn cost(mut self, cost_units: u32) -> Self {
        self.cost_units = cost_units;
        self
    }

    const fn requires_consent(mut self) -> Self {
        self.requires_consent = true;
        self
    }

    const fn gated_by(mut self, flag: &'static str) -> Self {
        self.feature_flag = Some(flag);
        self
    }
}

/// Set of currently-enabled feature flags. Checked against `ApiDescriptor::feature_flag`.
pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, flag: &str) -> bool;
}

/// A `FeatureFlags` set that enables nothing; descriptors gated by a flag are always inert.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeatureFlags;

impl FeatureFlags for NoFeatureFlags {
    fn is_enabled(&self, _flag: &str) -> bool {
        false
    }
}

/// Read-only, keyed-by-name lookup table of [`ApiDescriptor`]s.
#[derive(Debug, Clone)]
pub struct ApiRegistry {
    descriptors: HashMap<&'static str, ApiDescriptor>,
}

impl ApiRegistry {
    /// Construct a registry from an explicit descriptor list.
    pub fn new(descriptors: impl IntoIterator<Item = ApiDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(|d| (d.name, d)).collect(),
        }
    }

    /// Look up a descriptor by name. Returns `None` for unknown names; callers above
    /// route both "unknown" and "feature-flag disabled" through `None`.
    pub fn lookup(&self, name: &str) -> Option<&ApiDescriptor> {
        self.descriptors.get(name)
    }

    /// Whether `name` is known and not inert behind a disabled feature flag.
    pub fn is_active(&self, name: &str, flags: &dyn FeatureFlags) -> bool {
        match self.lookup(name) {
            Some(desc) => match desc.feature_flag {
                Some(flag) => flags.is_enabled(flag),
                None => true,
            },
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiDescriptor> {
        self.descriptors.values()
    }
}

impl Default for ApiRegistry {
    /// The production descriptor table: four shopping affiliates, three low-cost
    /// search APIs, one flagged evidence API, one consent-gated evidence API, one
    /// flagged review-search API, and five travel APIs.
    fn default() -> Self {
        Self::new([
            ApiDescriptor::new("amazon_affiliate", "product_affiliate", "amazon"),
            ApiDescriptor::new("ebay_affiliate", "product_affiliate", "ebay"),
            ApiDescriptor::new("walmart_affiliate", "product_affiliate", "walmart"),
            ApiDescriptor::new("bestbuy_affiliate", "product_affiliate", "bestbuy"),
            ApiDescriptor::new("google_cse_product", "product_search", "google_cse").cost(1),
            ApiDescriptor::new("google_cse_travel", "travel_search", "google_cse").cost(1),
            ApiDescriptor::new("bing_search", "product_search", "bing").cost(1),
            ApiDescriptor::new("youtube_transcripts", "product_evidence", "youtube")
                .gated_by("enable_youtube_transcripts"),
            ApiDescriptor::new("google_shopping", "product_search", "google_shopping").cost(1),
            ApiDescriptor::new("reddit_api", "product_evidence", "reddit")
                .cost(1)
                .requires_consent()
                .gated_by("enable_reddit_api"),
            ApiDescriptor::new("serpapi", "review_search", "serpapi")
                .cost(1)
                .gated_by("enable_serpapi"),
            ApiDescriptor::new("amadeus", "travel_search_flights", "amadeus"),
            ApiDescriptor::new("booking", "travel_search_hotels", "booking"),
            ApiDescriptor::new("expedia", "travel_search_hotels", "expedia"),
            ApiDescriptor::new("skyscanner", "travel_search_flights", "skyscanner"),
            ApiDescriptor::new("tripadvisor", "travel_destination_facts", "tripadvisor"),
        ])
    }
}
