//! Error types raised by the orchestrator.

use thiserror::Error;

/// Errors the orchestrator raises directly.
///
/// Per the propagation policy, individual API failures, circuit-open skips, halt
/// persistence failures, and usage-log failures never reach here; they're folded
/// into [`crate::fetcher::CallEnvelope`] status or [`crate::OrchestrationResult`]
/// fields instead. Only programmer/configuration errors surface as `Err`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// The routing table has no entry for this intent.
    #[error("no routing rules for intent: {0}")]
    UnknownIntent(String),

    /// The registry or routing table is internally inconsistent.
    #[error("orchestrator misconfigured: {0}")]
    Configuration(String),
}
