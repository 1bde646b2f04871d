use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use certivia_core::{CompanyId, PersonId, SiteId, TenantId};

use crate::permission::{FieldSet, PermissionKey, PermissionScope, SiteAccess};
use crate::role::RoleId;

/// One permission row attached to a role assignment.
///
/// Stores can hold misconfigured rows, for example a site-restricted
/// grant without a site id. Such rows stay representable here and fail
/// closed during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedPermission {
    permission_key: PermissionKey,
    is_granted: bool,
    scope: PermissionScope,
    site_access: SiteAccess,
    site_id: Option<SiteId>,
    allowed_fields: FieldSet,
    granted_by: PersonId,
    granted_at: DateTime<Utc>,
}

impl GrantedPermission {
    /// Creates an active grant covering all company sites and all fields.
    #[must_use]
    pub fn new(
        permission_key: PermissionKey,
        scope: PermissionScope,
        granted_by: PersonId,
    ) -> Self {
        Self {
            permission_key,
            is_granted: true,
            scope,
            site_access: SiteAccess::AllCompanySites,
            site_id: None,
            allowed_fields: FieldSet::All,
            granted_by,
            granted_at: Utc::now(),
        }
    }

    /// Restricts the grant to one assigned site.
    #[must_use]
    pub fn with_assigned_site(mut self, site_id: SiteId) -> Self {
        self.site_access = SiteAccess::AssignedSiteOnly;
        self.site_id = Some(site_id);
        self
    }

    /// Overrides the site reach without touching the site id.
    #[must_use]
    pub fn with_site_access(mut self, site_access: SiteAccess) -> Self {
        self.site_access = site_access;
        self
    }

    /// Replaces the visible field set.
    #[must_use]
    pub fn with_allowed_fields(mut self, allowed_fields: FieldSet) -> Self {
        self.allowed_fields = allowed_fields;
        self
    }

    /// Marks the grant revoked while keeping the row.
    #[must_use]
    pub fn revoked(mut self) -> Self {
        self.is_granted = false;
        self
    }

    /// Returns the permission key this grant covers.
    #[must_use]
    pub fn permission_key(&self) -> &PermissionKey {
        &self.permission_key
    }

    /// Returns whether the grant is active.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.is_granted
    }

    /// Returns the record breadth of the grant.
    #[must_use]
    pub fn scope(&self) -> PermissionScope {
        self.scope
    }

    /// Returns the site reach of the grant.
    #[must_use]
    pub fn site_access(&self) -> SiteAccess {
        self.site_access
    }

    /// Returns the assigned site, if the grant names one.
    #[must_use]
    pub fn site_id(&self) -> Option<SiteId> {
        self.site_id
    }

    /// Returns the fields the grant exposes.
    #[must_use]
    pub fn allowed_fields(&self) -> &FieldSet {
        &self.allowed_fields
    }

    /// Returns the person who issued the grant.
    #[must_use]
    pub fn granted_by(&self) -> PersonId {
        self.granted_by
    }

    /// Returns when the grant was issued.
    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }
}

/// A role held by a person, with the permission grants attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    assignment_id: Uuid,
    person_id: PersonId,
    role_type: RoleId,
    parent_role: Option<RoleId>,
    company_id: Option<CompanyId>,
    tenant_id: Option<TenantId>,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    granted_permissions: Vec<GrantedPermission>,
}

impl RoleAssignment {
    /// Creates an active assignment with no grants.
    #[must_use]
    pub fn new(person_id: PersonId, role_type: RoleId) -> Self {
        Self {
            assignment_id: Uuid::new_v4(),
            person_id,
            role_type,
            parent_role: None,
            company_id: None,
            tenant_id: None,
            is_active: true,
            expires_at: None,
            granted_permissions: Vec::new(),
        }
    }

    /// Sets the role this assignment hangs under.
    #[must_use]
    pub fn with_parent_role(mut self, parent_role: RoleId) -> Self {
        self.parent_role = Some(parent_role);
        self
    }

    /// Binds the assignment to a company.
    #[must_use]
    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Binds the assignment to a tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Sets an expiry instant after which the assignment is ignored.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Appends one permission grant.
    #[must_use]
    pub fn with_grant(mut self, grant: GrantedPermission) -> Self {
        self.granted_permissions.push(grant);
        self
    }

    /// Replaces all permission grants.
    #[must_use]
    pub fn with_grants(mut self, grants: Vec<GrantedPermission>) -> Self {
        self.granted_permissions = grants;
        self
    }

    /// Returns whether the assignment counts at the given instant.
    ///
    /// An assignment expiring exactly at `now` no longer counts.
    #[must_use]
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    /// Marks the assignment inactive.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Returns the stable identifier of this assignment row.
    #[must_use]
    pub fn assignment_id(&self) -> Uuid {
        self.assignment_id
    }

    /// Returns the person holding the role.
    #[must_use]
    pub fn person_id(&self) -> PersonId {
        self.person_id
    }

    /// Returns the role token of this assignment.
    #[must_use]
    pub fn role_type(&self) -> &RoleId {
        &self.role_type
    }

    /// Returns the parent role, if one is recorded.
    #[must_use]
    pub fn parent_role(&self) -> Option<&RoleId> {
        self.parent_role.as_ref()
    }

    /// Returns the company the assignment is bound to, if any.
    #[must_use]
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    /// Returns the tenant the assignment is bound to, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Returns whether the assignment is administratively active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the expiry instant, if one is set.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the permission grants attached to this assignment.
    #[must_use]
    pub fn granted_permissions(&self) -> &[GrantedPermission] {
        &self.granted_permissions
    }
}
