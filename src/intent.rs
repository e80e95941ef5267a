//! The classified user intent that drives routing and sufficiency thresholds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classified shopping/travel intent. Produced upstream by intent classification
/// (out of scope here); only the tag matters to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Product,
    Comparison,
    PriceCheck,
    ReviewDeepDive,
    Travel,
}

impl Intent {
    /// Stable lowercase identifier, matching routing table and threshold table keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Product => "product",
            Intent::Comparison => "comparison",
            Intent::PriceCheck => "price_check",
            Intent::ReviewDeepDive => "review_deep_dive",
            Intent::Travel => "travel",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unrecognized intent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIntentTag(pub String);

impl fmt::Display for UnknownIntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized intent: {}", self.0)
    }
}

impl std::error::Error for UnknownIntentTag {}

impl FromStr for Intent {
    type Err = UnknownIntentTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Intent::Product),
            "comparison" => Ok(Intent::Comparison),
            "price_check" => Ok(Intent::PriceCheck),
            "review_deep_dive" => Ok(Intent::ReviewDeepDive),
            "travel" => Ok(Intent::Travel),
            other => Err(UnknownIntentTag(other.to_string())),
        }
    }
}
