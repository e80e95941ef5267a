//! Two-layer consent gate (account toggle + per-query confirmation) and the
//! halt/resume protocol that lets a paused orchestration survive across requests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fetcher::{Item, Snippet};
use crate::intent::Intent;

/// Confirmation vocabulary recognized as a "yes" to a per-query consent prompt.
/// Matched against the trimmed, lowercased start of the message, so "say yes to X"
/// must not match, only a message that *begins* with one of these.
const CONFIRMATION_PREFIXES: &[&str] =
    &["yes", "ok", "okay", "sure", "proceed", "continue", "go ahead", "search deeper"];

/// Whether `message` counts as a per-query consent confirmation.
pub fn is_confirmation(message: &str) -> bool {
    let trimmed = message.trim().to_lowercase();
    CONFIRMATION_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
}

/// The two orthogonal consent dimensions the validator consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsentState {
    /// Set only via the settings UI; persists across requests.
    pub account_toggle_on: bool,
    /// Detected on the current inbound turn only; never persists past one resume.
    pub per_query_confirmed: bool,
}

/// Everything needed to resume a halted orchestration on a later request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HaltRecord {
    pub intent: Intent,
    pub query: String,
    pub requested_products: Vec<String>,
    pub accumulated_items: Vec<Item>,
    pub accumulated_snippets: Vec<Snippet>,
    pub sources_used_so_far: Vec<String>,
    pub tier_reached: u8,
    pub pending_consent_type: String,
}

/// Session-keyed storage for [`HaltRecord`]s. Implementations must fail closed:
/// a `set` that errors must be treated by the caller as "halt not persisted", never
/// as "escalation silently granted".
#[async_trait]
pub trait HaltStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<HaltRecord>, Box<dyn std::error::Error + Send + Sync>>;
    async fn set(
        &self,
        session_id: &str,
        record: &HaltRecord,
        ttl: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    async fn delete(&self, session_id: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Process-local reference implementation. TTL is tracked informationally only;
/// nothing in this implementation evicts on expiry. A production store (e.g. an
/// etcd lease) is expected to enforce the TTL itself.
#[derive(Debug, Default)]
pub struct InMemoryHaltStore {
    records: Mutex<HashMap<String, HaltRecord>>,
}

impl InMemoryHaltStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HaltStore for InMemoryHaltStore {
    async fn get(&self, session_id: &str) -> Result<Option<HaltRecord>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.records.lock().expect("halt store mutex poisoned").get(session_id).cloned())
    }

    async fn set(
        &self,
        session_id: &str,
        record: &HaltRecord,
        _ttl: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.records
            .lock()
            .expect("halt store mutex poisoned")
            .insert(session_id.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.records.lock().expect("halt store mutex poisoned").remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_confirmation_words_match() {
        for word in ["yes", "Ok", "OKAY", "sure", "proceed", "continue", "go ahead", "search deeper"] {
            assert!(is_confirmation(word), "{word} should match");
        }
    }

    #[test]
    fn confirmation_matches_with_trailing_text() {
        assert!(is_confirmation("yes please go deeper"));
        assert!(is_confirmation("  Sure, why not"));
    }

    #[test]
    fn confirmation_requires_prefix_not_substring() {
        assert!(!is_confirmation("say yes to this"));
        assert!(!is_confirmation("no, don't"));
        assert!(!is_confirmation("maybe ok"));
    }

    #[test]
    fn empty_message_does_not_confirm() {
        assert!(!is_confirmation(""));
        assert!(!is_confirmation("   "));
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryHaltStore::new();
        let record = HaltRecord {
            intent: Intent::Product,
            query: "vacuum".to_string(),
            requested_products: vec![],
            accumulated_items: vec![],
            accumulated_snippets: vec![],
            sources_used_so_far: vec![],
            tier_reached: 2,
            pending_consent_type: "account_toggle".to_string(),
        };

        store.set("session-1", &record, Duration::from_secs(600)).await.unwrap();
        assert_eq!(store.get("session-1").await.unwrap(), Some(record));

        store.delete("session-1").await.unwrap();
        assert_eq!(store.get("session-1").await.unwrap(), None);
    }
}
