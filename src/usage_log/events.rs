use std::fmt;
use std::time::Duration;

use crate::fetcher::{CallEnvelope, CallStatus, RequestContext};

/// Append-only usage record: one row per API call outcome, or a synthetic row per
/// consent event. Mirrors the cost-accounting schema this subsystem logs against.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub api_name: String,
    pub tier: u8,
    pub cost_units: u32,
    pub latency: Option<Duration>,
    pub success: bool,
    pub error: Option<String>,
}

impl UsageRecord {
    /// Build a record from a completed API call.
    pub fn from_envelope(api_name: &str, tier: u8, cost_units: u32, envelope: &CallEnvelope, ctx: &RequestContext) -> Self {
        let success = envelope.status == CallStatus::Success;
        Self {
            user_id: ctx.user_id.clone(),
            session_id: ctx.session_id.clone(),
            api_name: api_name.to_string(),
            tier,
            cost_units: if success { cost_units } else { 0 },
            latency: Some(envelope.latency),
            success,
            error: match envelope.status {
                CallStatus::Timeout => Some("timeout".to_string()),
                CallStatus::Error => envelope.error_message.clone(),
                _ => None,
            },
        }
    }

    /// Synthetic record for a granted consent event: `api_name = "consent_<type>"`,
    /// zero cost, always recorded as successful.
    pub fn consent_event(ctx: &RequestContext, consent_type: &str, tier_requested: u8) -> Self {
        Self {
            user_id: ctx.user_id.clone(),
            session_id: ctx.session_id.clone(),
            api_name: format!("consent_{consent_type}"),
            tier: tier_requested,
            cost_units: 0,
            latency: None,
            success: true,
            error: None,
        }
    }
}

impl fmt::Display for UsageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tier={} success={} cost={}",
            self.api_name, self.tier, self.success, self.cost_units
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_event_has_synthetic_api_name() {
        let record = UsageRecord::consent_event(&RequestContext::default(), "account_toggle", 3);
        assert_eq!(record.api_name, "consent_account_toggle");
        assert_eq!(record.cost_units, 0);
        assert!(record.success);
    }

    #[test]
    fn failed_call_never_reports_cost() {
        let envelope = CallEnvelope {
            api_name: "bing_search".to_string(),
            status: CallStatus::Timeout,
            payload: None,
            latency: Duration::from_millis(10),
            error_message: None,
        };
        let record = UsageRecord::from_envelope("bing_search", 2, 1, &envelope, &RequestContext::default());
        assert_eq!(record.cost_units, 0);
        assert_eq!(record.error.as_deref(), Some("timeout"));
    }
}
