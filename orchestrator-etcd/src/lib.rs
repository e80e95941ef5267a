#![cfg(feature = "etcd-client")]

//! etcd-backed [`HaltStore`] for `tiered-orchestrator` (companion crate).
//! Bring your own `etcd_client::Client`; halt records are stored as JSON under
//! `<prefix>/<session_id>`, behind an etcd lease for the TTL so an expired halt
//! simply disappears rather than needing a sweep.

use async_trait::async_trait;
use etcd_client::{Client, PutOptions};
use std::time::Duration;
use tiered_orchestrator::{HaltRecord, HaltStore};

#[derive(Clone)]
pub struct EtcdHaltStore {
    prefix: String,
    client: Client,
}

impl std::fmt::Debug for EtcdHaltStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdHaltStore")
            .field("prefix", &self.prefix)
            .field("client", &"<etcd_client::Client>")
            .finish()
    }
}

impl EtcdHaltStore {
    /// Create a store using an existing etcd client; keys will be `prefix/<session_id>`.
    ///
    /// # Errors
    /// Returns `Err` if the prefix is empty, contains control characters, or is otherwise invalid.
    pub fn new(prefix: impl Into<String>, client: Client) -> Result<Self, String> {
        let mut p: String = prefix.into();

        p = p.trim().trim_end_matches('/').to_string();

        if p.is_empty() {
            return Err("prefix cannot be empty".to_string());
        }
        if p.chars().any(|c| c.is_control()) {
            return Err("prefix cannot contain control characters".to_string());
        }

        Ok(Self { prefix: p, client })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}/{session_id}", self.prefix)
    }
}

#[async_trait]
impl HaltStore for EtcdHaltStore {
    async fn get(&self, session_id: &str) -> Result<Option<HaltRecord>, Box<dyn std::error::Error + Send + Sync>> {
        let mut client = self.client.clone();
        let response = client.get(self.key(session_id), None).await?;
        match response.kvs().first() {
            Some(kv) => Ok(Some(serde_json::from_slice(kv.value())?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        session_id: &str,
        record: &HaltRecord,
        ttl: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut client = self.client.clone();
        let lease = client.lease_grant(ttl.as_secs().max(1) as i64, None).await?;
        let payload = serde_json::to_vec(record)?;
        client
            .put(self.key(session_id), payload, Some(PutOptions::new().with_lease(lease.id())))
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut client = self.client.clone();
        client.delete(self.key(session_id), None).await?;
        Ok(())
    }
}
