//! JSONL usage-log sink for `tiered-orchestrator`. Writes one record per line.
//! Always writes; bring your own path.

use async_trait::async_trait;
use serde_json::json;
use tiered_orchestrator::{UsageRecord, UsageSink};
use tokio::io::AsyncWriteExt;

#[derive(Clone, Debug)]
pub struct JsonlUsageSink {
    path: String,
}

impl JsonlUsageSink {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UsageSink for JsonlUsageSink {
    async fn record(&self, record: UsageRecord) {
        let line = record_to_json(&record).to_string() + "\n";
        if let Err(err) = append_line(&self.path, &line).await {
            tracing::warn!(path = %self.path, error = %err, "jsonl usage sink write failed");
        }
    }
}

async fn append_line(path: &str, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

fn record_to_json(record: &UsageRecord) -> serde_json::Value {
    json!({
        "user_id": record.user_id,
        "session_id": record.session_id,
        "api_name": record.api_name,
        "tier": record.tier,
        "cost_units": record.cost_units,
        "latency_ms": record.latency.map(|d| d.as_millis()),
        "success": record.success,
        "error": record.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn writes_json_lines() {
        let dir = std::env::temp_dir().join(format!("orchestrator-jsonl-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("usage.jsonl");
        let sink = JsonlUsageSink::new(path.to_string_lossy().to_string());

        sink.record(UsageRecord {
            user_id: None,
            session_id: Some("session-1".to_string()),
            api_name: "amazon_affiliate".to_string(),
            tier: 1,
            cost_units: 0,
            latency: Some(Duration::from_millis(42)),
            success: true,
            error: None,
        })
        .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("amazon_affiliate"));
        assert!(contents.contains("\"success\":true"));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
