use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by application use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted for every permission evaluation.
    AccessEvaluated,
    /// Emitted when a role is assigned to a person.
    RoleAssigned,
    /// Emitted when a role assignment is revoked.
    RoleRevoked,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessEvaluated => "security.access.evaluated",
            Self::RoleAssigned => "security.role.assigned",
            Self::RoleRevoked => "security.role.revoked",
        }
    }
}
