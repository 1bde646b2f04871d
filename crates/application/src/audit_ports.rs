use async_trait::async_trait;
use chrono::{DateTime, Utc};

use certivia_core::{AppResult, PersonId, TenantId};
use certivia_domain::AuditAction;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessAuditEvent {
    /// Tenant scope for the event, when one is known.
    pub tenant_id: Option<TenantId>,
    /// Person that performed the action, when one is known.
    pub actor_id: Option<PersonId>,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Requested operation, for example `VIEW`.
    pub operation: String,
    /// Resource or entity token the operation targeted.
    pub resource: String,
    /// Outcome label: `allow`, `deny`, or `applied`.
    pub decision: String,
    /// Diagnostic reason attached to denials.
    pub reason: Option<String>,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
}

/// Port for recording append-only audit events.
///
/// Services treat recording as fire-and-forget: a failing sink is
/// logged and never fails the operation that emitted the event.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one audit event.
    async fn record(&self, event: AccessAuditEvent) -> AppResult<()>;
}
