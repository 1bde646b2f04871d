use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use certivia_core::{AppError, AppResult, CompanyId, PersonId, RequestContext, TenantId};
use certivia_domain::{AuditAction, GrantedPermission, RoleAssignment, RoleCatalog, RoleId};

use crate::audit_ports::{AccessAuditEvent, AuditSink};
use crate::directory_ports::{DirectoryRepository, RoleAdminRepository, UpsertAssignmentInput};

/// Request payload for assigning a role to a person.
#[derive(Debug, Clone)]
pub struct AssignRoleInput {
    /// Person receiving the role.
    pub person_id: PersonId,
    /// Role token to assign.
    pub role_type: RoleId,
    /// Company the assignment is bound to, if any.
    pub company_id: Option<CompanyId>,
    /// Requested parent role. Defaulted from the catalog when omitted.
    pub parent_role: Option<RoleId>,
    /// Expiry instant for temporary assignments.
    pub expires_at: Option<DateTime<Utc>>,
    /// Permission grants attached to the assignment.
    pub granted_permissions: Vec<GrantedPermission>,
}

/// Administers role assignments under the strictly-beneath rule.
///
/// An actor may grant or revoke only roles that sit strictly below
/// their own best level in the hierarchy. Projection membership needs
/// no invalidation after a change here because it is recomputed on
/// every call.
#[derive(Clone)]
pub struct RoleAdminService {
    directory: Arc<dyn DirectoryRepository>,
    admin: Arc<dyn RoleAdminRepository>,
    audit_sink: Arc<dyn AuditSink>,
    roles: Arc<RoleCatalog>,
}

impl RoleAdminService {
    /// Creates a role administration service.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        admin: Arc<dyn RoleAdminRepository>,
        audit_sink: Arc<dyn AuditSink>,
        roles: Arc<RoleCatalog>,
    ) -> Self {
        Self {
            directory,
            admin,
            audit_sink,
            roles,
        }
    }

    /// Lists the roles the calling actor may currently assign.
    pub async fn assignable_roles(&self, context: &RequestContext) -> AppResult<BTreeSet<RoleId>> {
        let (actor_id, tenant_id) = Self::require_actor(context)?;
        let actor_roles = self.held_roles(actor_id, tenant_id).await?;
        Ok(self.roles.assignable_roles(&actor_roles))
    }

    /// Assigns a role to a person and records the change on the audit
    /// trail.
    ///
    /// When the input names no parent role, the catalog default is
    /// used, and failing that the assignable role nearest to the
    /// assigned one. An explicit parent must be strictly senior to the
    /// assigned role.
    pub async fn assign_role(
        &self,
        context: &RequestContext,
        input: AssignRoleInput,
    ) -> AppResult<RoleAssignment> {
        let (actor_id, tenant_id) = Self::require_actor(context)?;
        let actor_roles = self.held_roles(actor_id, tenant_id).await?;
        if !self
            .roles
            .assignable_roles(&actor_roles)
            .contains(&input.role_type)
        {
            return Err(AppError::Forbidden(format!(
                "role '{}' is not assignable from the caller's roles",
                input.role_type
            )));
        }

        let parent_role = self.resolve_parent(&actor_roles, &input)?;
        let AssignRoleInput {
            person_id,
            role_type,
            company_id,
            expires_at,
            granted_permissions,
            ..
        } = input;

        let assignment = self
            .admin
            .upsert_assignment(
                tenant_id,
                UpsertAssignmentInput {
                    person_id,
                    role_type: role_type.clone(),
                    company_id,
                    parent_role,
                    expires_at,
                    granted_permissions,
                },
            )
            .await?;

        self.record_admin_event(context, AuditAction::RoleAssigned, &role_type, person_id)
            .await;

        Ok(assignment)
    }

    /// Revokes a role by deactivating the matching active assignment.
    ///
    /// Returns whether an assignment was found. Revocations follow the
    /// same authority rule as assignments.
    pub async fn revoke_role(
        &self,
        context: &RequestContext,
        person_id: PersonId,
        role_type: &RoleId,
        company_id: Option<CompanyId>,
    ) -> AppResult<bool> {
        let (actor_id, tenant_id) = Self::require_actor(context)?;
        let actor_roles = self.held_roles(actor_id, tenant_id).await?;
        if !self.roles.assignable_roles(&actor_roles).contains(role_type) {
            return Err(AppError::Forbidden(format!(
                "role '{role_type}' is not revocable from the caller's roles"
            )));
        }

        let revoked = self
            .admin
            .deactivate_assignment(tenant_id, person_id, role_type, company_id)
            .await?;
        if revoked {
            self.record_admin_event(context, AuditAction::RoleRevoked, role_type, person_id)
                .await;
        }

        Ok(revoked)
    }

    fn require_actor(context: &RequestContext) -> AppResult<(PersonId, TenantId)> {
        match (context.person_id(), context.tenant_id()) {
            (Some(person_id), Some(tenant_id)) => Ok((person_id, tenant_id)),
            _ => Err(AppError::Unauthorized(
                "role administration requires an authenticated actor".to_owned(),
            )),
        }
    }

    async fn held_roles(&self, actor_id: PersonId, tenant_id: TenantId) -> AppResult<Vec<RoleId>> {
        let assignments = self
            .directory
            .active_role_assignments(actor_id, Some(tenant_id))
            .await?;
        let now = Utc::now();
        Ok(assignments
            .iter()
            .filter(|assignment| assignment.is_currently_active(now))
            .map(|assignment| assignment.role_type().clone())
            .collect())
    }

    fn resolve_parent(
        &self,
        actor_roles: &[RoleId],
        input: &AssignRoleInput,
    ) -> AppResult<Option<RoleId>> {
        if let Some(parent) = &input.parent_role {
            if !self.roles.is_ancestor(parent, &input.role_type)? {
                return Err(AppError::Validation(format!(
                    "parent role '{parent}' is not senior to '{}'",
                    input.role_type
                )));
            }
            return Ok(Some(parent.clone()));
        }

        if let Some(parent) = self.roles.default_parent_role(&input.role_type)? {
            return Ok(Some(parent));
        }

        Ok(self
            .roles
            .closest_assignable_role(actor_roles, &input.role_type)
            .filter(|candidate| {
                self.roles
                    .is_ancestor(candidate, &input.role_type)
                    .unwrap_or(false)
            }))
    }

    async fn record_admin_event(
        &self,
        context: &RequestContext,
        action: AuditAction,
        role_type: &RoleId,
        subject_id: PersonId,
    ) {
        let event = AccessAuditEvent {
            tenant_id: context.tenant_id(),
            actor_id: context.person_id(),
            action,
            operation: role_type.as_str().to_owned(),
            resource: subject_id.to_string(),
            decision: "applied".to_owned(),
            reason: None,
            occurred_at: Utc::now(),
        };
        if let Err(error) = self.audit_sink.record(event).await {
            warn!(error = %error, "audit sink rejected a role administration event");
        }
    }
}
