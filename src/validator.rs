//! Intent-specific sufficiency thresholds: decide whether accumulated results are
//! enough to answer, or whether the orchestrator should escalate/consult consent.

use std::collections::{HashMap, HashSet};

use crate::consent::ConsentState;
use crate::fetcher::Item;
use crate::intent::Intent;

/// Minimum coverage required before an intent's results are considered sufficient.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdConfig {
    pub min_items: usize,
    pub min_snippets: usize,
    pub min_sources: usize,
    /// Comparison-only: every name in `requested_products` must be fuzzy-matched.
    pub require_all_items: bool,
}

impl ThresholdConfig {
    pub const fn min_items(min_items: usize) -> Self {
        Self { min_items, min_snippets: 0, min_sources: 0, require_all_items: false }
    }

    pub const fn require_all_items() -> Self {
        Self { min_items: 0, min_snippets: 0, min_sources: 0, require_all_items: true }
    }

    pub const fn review_deep_dive() -> Self {
        Self { min_items: 0, min_snippets: 5, min_sources: 2, require_all_items: false }
    }

    pub const fn travel() -> Self {
        Self { min_items: 1, min_snippets: 3, min_sources: 0, require_all_items: false }
    }
}

/// Per-intent threshold table, matching the production defaults.
pub fn default_thresholds() -> HashMap<Intent, ThresholdConfig> {
    let mut table = HashMap::new();
    table.insert(Intent::Product, ThresholdConfig::min_items(3));
    table.insert(Intent::Comparison, ThresholdConfig::require_all_items());
    table.insert(Intent::PriceCheck, ThresholdConfig::min_items(1));
    table.insert(Intent::ReviewDeepDive, ThresholdConfig::review_deep_dive());
    table.insert(Intent::Travel, ThresholdConfig::travel());
    table
}

pub const ACCOUNT_TOGGLE_PROMPT: &str = "Enable Extended Search in Settings to search more sources";
pub const PER_QUERY_PROMPT: &str = "Search deeper?";

/// Outcome of validating one tier's accumulated results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Sufficient { sources_used: Vec<String> },
    Escalate { next_tier: u8 },
    ConsentRequired { consent_type: ConsentType, message: &'static str, next_tier: u8 },
    Exhausted { sources_used: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentType {
    AccountToggle,
    PerQuery,
}

impl ConsentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentType::AccountToggle => "account_toggle",
            ConsentType::PerQuery => "per_query",
        }
    }
}

/// Evaluates accumulated items/snippets/sources against a threshold and decides
/// whether to report sufficiency, escalate, require consent, or give up.
#[derive(Debug, Clone)]
pub struct DataValidator {
    thresholds: HashMap<Intent, ThresholdConfig>,
    max_auto_tier: u8,
}

impl DataValidator {
    pub fn new(thresholds: HashMap<Intent, ThresholdConfig>, max_auto_tier: u8) -> Self {
        Self { thresholds, max_auto_tier }
    }

    pub fn validate(
        &self,
        intent: Intent,
        current_tier: u8,
        items: &[Item],
        snippet_count: usize,
        sources_used: &[String],
        requested_products: &[String],
        consent: &ConsentState,
    ) -> Decision {
        let threshold = self.thresholds.get(&intent).copied().unwrap_or_default();

        let sufficient = if threshold.require_all_items {
            check_comparison_coverage(items, requested_products)
        } else {
            (threshold.min_items == 0 || items.len() >= threshold.min_items)
                && (threshold.min_snippets == 0 || snippet_count >= threshold.min_snippets)
                && (threshold.min_sources == 0 || sources_used.len() >= threshold.min_sources)
        };

        if sufficient {
            return Decision::Sufficient { sources_used: sources_used.to_vec() };
        }

        let next_tier = current_tier + 1;
        if next_tier > 4 {
            return Decision::Exhausted { sources_used: sources_used.to_vec() };
        }

        if next_tier <= self.max_auto_tier {
            return Decision::Escalate { next_tier };
        }

        if !consent.account_toggle_on {
            return Decision::ConsentRequired {
                consent_type: ConsentType::AccountToggle,
                message: ACCOUNT_TOGGLE_PROMPT,
                next_tier,
            };
        }

        if !consent.per_query_confirmed {
            return Decision::ConsentRequired {
                consent_type: ConsentType::PerQuery,
                message: PER_QUERY_PROMPT,
                next_tier,
            };
        }

        Decision::Escalate { next_tier }
    }
}

/// Comparison-intent coverage check: every requested product name must fuzzy-match
/// at least one accumulated item name. With no requested names, falls back to
/// requiring at least 2 accumulated items.
fn check_comparison_coverage(items: &[Item], requested_products: &[String]) -> bool {
    if requested_products.is_empty() {
        return items.len() >= 2;
    }

    let found_names: Vec<String> = items.iter().map(|i| i.name.to_lowercase()).collect();
    requested_products
        .iter()
        .all(|req| found_names.iter().any(|name| jaccard_similarity(req, name) >= 0.45))
}

/// Token-set Jaccard similarity between two strings, case-insensitive, whitespace-tokenized.
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> { s.to_lowercase().split_whitespace().map(str::to_string).collect() };
    let a_tokens = tokens(a);
    let b_tokens = tokens(b);

    if a_tokens.is_empty() && b_tokens.is_empty() {
        return 1.0;
    }

    let intersection = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
