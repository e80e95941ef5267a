//! Intent × tier → ordered API name lists.

use std::collections::HashMap;

use crate::circuit_breaker::CircuitBreaker;
use crate::intent::Intent;
use crate::registry::{ApiRegistry, FeatureFlags};

/// `(intent, tier) → ordered list of API names`.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    entries: HashMap<Intent, [Vec<&'static str>; 4]>,
}

impl RoutingTable {
    pub fn new(entries: HashMap<Intent, [Vec<&'static str>; 4]>) -> Self {
        Self { entries }
    }

    /// Raw declared list for `(intent, tier)`, in declared order, before any filtering.
    /// `tier` is 1-indexed (1..=4). Returns `None` if the intent has no routing rules.
    pub fn raw(&self, intent: Intent, tier: u8) -> Option<&[&'static str]> {
        let tiers = self.entries.get(&intent)?;
        tiers.get(usize::from(tier).checked_sub(1)?).map(Vec::as_slice)
    }

    /// Active API names for `(intent, tier)`: feature-flag enabled and circuit closed,
    /// in declared order. Declared order is authoritative for dedup tie-breaks.
    pub fn apis_for(
        &self,
        intent: Intent,
        tier: u8,
        registry: &ApiRegistry,
        flags: &dyn FeatureFlags,
        breaker: &CircuitBreaker,
    ) -> Option<Vec<&'static str>> {
        let raw = self.raw(intent, tier)?;
        Some(
            raw.iter()
                .copied()
                .filter(|name| registry.is_active(name, flags))
                .filter(|name| !breaker.is_open(name))
                .collect(),
        )
    }
}

impl Default for RoutingTable {
    /// The production routing table: `product` and `comparison` share tier lists;
    /// `price_check` and `travel` stop escalating after tier 2.
    fn default() -> Self {
        let mut entries = HashMap::new();

        let shopping_tiers = || {
            [
                vec![
                    "amazon_affiliate",
                    "walmart_affiliate",
                    "bestbuy_affiliate",
                    "ebay_affiliate",
                    "google_cse_product",
                ],
                vec!["bing_search", "youtube_transcripts"],
                vec!["reddit_api"],
                vec!["serpapi"],
            ]
        };

        entries.insert(Intent::Product, shopping_tiers());
        entries.insert(Intent::Comparison, shopping_tiers());

        entries.insert(
            Intent::PriceCheck,
            [
                vec![
                    "amazon_affiliate",
                    "walmart_affiliate",
                    "bestbuy_affiliate",
                    "ebay_affiliate",
                ],
                vec!["google_shopping"],
                vec![],
                vec![],
            ],
        );

        entries.insert(
            Intent::ReviewDeepDive,
            [
                vec!["google_cse_product"],
                vec!["bing_search", "youtube_transcripts"],
                vec!["reddit_api"],
                vec!["serpapi"],
            ],
        );

        entries.insert(
            Intent::Travel,
            [
                vec!["amadeus", "booking", "expedia", "google_cse_travel"],
                vec!["skyscanner", "tripadvisor"],
                vec![],
                vec![],
            ],
        );

        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::clock::MonotonicClock;
    use crate::registry::NoFeatureFlags;

    #[test]
    fn price_check_has_no_tier_three_or_four() {
        let table = RoutingTable::default();
        assert_eq!(table.raw(Intent::PriceCheck, 3), Some(&[][..]));
        assert_eq!(table.raw(Intent::PriceCheck, 4), Some(&[][..]));
    }

    #[test]
    fn unknown_tier_returns_none() {
        let table = RoutingTable::default();
        assert!(table.raw(Intent::Product, 5).is_none());
        assert!(table.raw(Intent::Product, 0).is_none());
    }

    #[test]
    fn apis_for_filters_open_circuits() {
        let table = RoutingTable::default();
        let registry = ApiRegistry::default();
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig::default(), MonotonicClock::default());
        for _ in 0..3 {
            breaker.record_failure("amazon_affiliate");
        }
        let active = table
            .apis_for(Intent::Product, 1, &registry, &NoFeatureFlags, &breaker)
            .unwrap();
        assert!(!active.contains(&"amazon_affiliate"));
        assert!(active.contains(&"walmart_affiliate"));
    }

    #[test]
    fn apis_for_filters_disabled_feature_flags() {
        let table = RoutingTable::default();
        let registry = ApiRegistry::default();
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig::default(), MonotonicClock::default());
        let active = table
            .apis_for(Intent::Product, 3, &registry, &NoFeatureFlags, &breaker)
            .unwrap();
        assert!(active.is_empty(), "reddit_api is flag-gated off by default");
    }
}
