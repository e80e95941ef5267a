use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::events::UsageRecord;

/// A usage sink records cost/outcome data per API call. Unlike provider adapters,
/// a sink is never allowed to fail the call that produced the record: implementations
/// swallow their own errors (logging a warning) rather than propagating, since losing a
/// usage record is an acceptable cost and must never fail an otherwise-successful fetch.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: UsageRecord);
}

/// Discards every record. Useful as a default when cost accounting is out of scope
/// (tests, local development).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUsageSink;

#[async_trait]
impl UsageSink for NullUsageSink {
    async fn record(&self, _record: UsageRecord) {}
}

/// Logs each record via `tracing`, at `info` for successes and `warn` for failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUsageSink;

#[async_trait]
impl UsageSink for LogUsageSink {
    async fn record(&self, record: UsageRecord) {
        if record.success {
            tracing::info!(api_name = %record.api_name, tier = record.tier, cost_units = record.cost_units, "api usage");
        } else {
            tracing::warn!(api_name = %record.api_name, tier = record.tier, error = ?record.error, "api usage failure");
        }
    }
}

/// In-memory sink for tests and local inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryUsageSink {
    records: Arc<Mutex<Vec<UsageRecord>>>,
    dropped: Arc<AtomicU64>,
}

impl MemoryUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().expect("usage sink mutex poisoned").clone()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UsageSink for MemoryUsageSink {
    async fn record(&self, record: UsageRecord) {
        self.records.lock().expect("usage sink mutex poisoned").push(record);
    }
}

/// Wraps another sink, never letting it block the caller: records are handed off
/// to a background task over a bounded channel; a full channel just drops the record.
#[derive(Clone)]
pub struct NonBlockingUsageSink {
    tx: tokio::sync::mpsc::Sender<UsageRecord>,
    dropped: Arc<AtomicU64>,
}

impl NonBlockingUsageSink {
    pub fn with_capacity(inner: impl UsageSink + 'static, capacity: usize) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::channel(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let inner = Arc::new(inner);

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                inner.record(record).await;
            }
        });

        Self { tx, dropped }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UsageSink for NonBlockingUsageSink {
    async fn record(&self, record: UsageRecord) {
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Tries a primary sink first; if the caller wants guaranteed delivery to a backup
/// as well, falls through to a secondary sink regardless of the primary's outcome.
/// Since `UsageSink::record` never reports failure, this is really "deliver to both",
/// kept distinct from a plain multicast only for naming clarity at call sites.
pub struct FallbackUsageSink<A, B> {
    primary: A,
    fallback: B,
}

impl<A, B> FallbackUsageSink<A, B>
where
    A: UsageSink,
    B: UsageSink,
{
    pub fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<A, B> UsageSink for FallbackUsageSink<A, B>
where
    A: UsageSink,
    B: UsageSink,
{
    async fn record(&self, record: UsageRecord) {
        self.primary.record(record.clone()).await;
        self.fallback.record(record).await;
    }
}
