use async_trait::async_trait;
use chrono::{DateTime, Utc};

use certivia_core::{AppResult, CompanyId, PersonId, TenantId};
use certivia_domain::{GrantedPermission, RoleAssignment, RoleId};

/// Directory row projecting one person for population listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSummary {
    /// Stable person identifier.
    pub person_id: PersonId,
    /// Display name for listings.
    pub display_name: String,
    /// Role tokens from the person's active assignments.
    pub role_types: Vec<RoleId>,
    /// Soft-deletion marker. Deleted people never appear in projections.
    pub is_deleted: bool,
}

/// Repository port for reading people and their role assignments.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Lists active role assignments for a person, grants included.
    ///
    /// Passing a tenant restricts the result to assignments bound to
    /// that tenant or bound to no tenant at all.
    async fn active_role_assignments(
        &self,
        person_id: PersonId,
        tenant_id: Option<TenantId>,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Lists the people a projection draws from.
    async fn person_population(
        &self,
        tenant_id: TenantId,
        company_id: Option<CompanyId>,
    ) -> AppResult<Vec<PersonSummary>>;
}

/// Input payload for creating or replacing a role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertAssignmentInput {
    /// Person receiving the role.
    pub person_id: PersonId,
    /// Role token to assign.
    pub role_type: RoleId,
    /// Company the assignment is bound to, if any.
    pub company_id: Option<CompanyId>,
    /// Role the assignment hangs under, if one was resolved.
    pub parent_role: Option<RoleId>,
    /// Expiry instant for temporary assignments.
    pub expires_at: Option<DateTime<Utc>>,
    /// Permission grants attached to the assignment.
    pub granted_permissions: Vec<GrantedPermission>,
}

/// Repository port for writing role assignments.
#[async_trait]
pub trait RoleAdminRepository: Send + Sync {
    /// Creates or replaces the assignment for a person, role, and company.
    ///
    /// An existing active assignment with the same coordinates is
    /// deactivated before the new one is stored, keeping at most one
    /// active assignment per tuple.
    async fn upsert_assignment(
        &self,
        tenant_id: TenantId,
        input: UpsertAssignmentInput,
    ) -> AppResult<RoleAssignment>;

    /// Deactivates the matching active assignment.
    ///
    /// Returns whether an active assignment was found.
    async fn deactivate_assignment(
        &self,
        tenant_id: TenantId,
        person_id: PersonId,
        role_type: &RoleId,
        company_id: Option<CompanyId>,
    ) -> AppResult<bool>;
}
