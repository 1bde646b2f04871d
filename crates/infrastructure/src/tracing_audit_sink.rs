//! Audit sink for development. Writes events to tracing output.

use async_trait::async_trait;
use tracing::info;

use certivia_application::{AccessAuditEvent, AuditSink};
use certivia_core::AppResult;

/// Audit sink that emits one structured log line per event.
#[derive(Clone)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    /// Creates a new tracing sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AccessAuditEvent) -> AppResult<()> {
        info!(
            action = event.action.as_str(),
            operation = %event.operation,
            resource = %event.resource,
            decision = %event.decision,
            tenant_id = ?event.tenant_id,
            actor_id = ?event.actor_id,
            reason = ?event.reason,
            occurred_at = %event.occurred_at,
            "audit event"
        );

        Ok(())
    }
}
