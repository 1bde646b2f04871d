use async_trait::async_trait;
use tokio::sync::Mutex;

use certivia_application::{AccessAuditEvent, AuditSink};
use certivia_core::AppResult;

/// Audit sink that buffers events in memory for inspection.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AccessAuditEvent>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of the recorded events in arrival order.
    pub async fn events(&self) -> Vec<AccessAuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AccessAuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
