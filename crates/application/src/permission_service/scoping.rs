use super::*;

use certivia_core::RequestContext;
use certivia_domain::{
    DenyReason, GrantedPermission, PermissionScope, RoleAssignment, SiteAccess, SiteVisibility,
};

impl PermissionService {
    /// Checks a candidate grant against the request target.
    ///
    /// Returns the site visibility an allow decision would carry, or the
    /// reason the grant does not cover the target.
    pub(super) fn evaluate_target(
        &self,
        context: &RequestContext,
        assignment: &RoleAssignment,
        grant: &GrantedPermission,
        target: &AccessTarget,
    ) -> Result<SiteVisibility, DenyReason> {
        self.check_scope(context, assignment, grant, target)?;
        self.check_site(grant, target)
    }

    fn check_scope(
        &self,
        context: &RequestContext,
        assignment: &RoleAssignment,
        grant: &GrantedPermission,
        target: &AccessTarget,
    ) -> Result<(), DenyReason> {
        match grant.scope() {
            PermissionScope::Global => Ok(()),
            PermissionScope::Company => {
                let Some(target_company) = target.company_id else {
                    return self.lenient_or(DenyReason::CompanyScopeMismatch);
                };
                let covered = assignment.company_id().or(context.company_id());
                if covered == Some(target_company) {
                    Ok(())
                } else {
                    Err(DenyReason::CompanyScopeMismatch)
                }
            }
            PermissionScope::SelfOnly => {
                let Some(target_person) = target.person_id else {
                    return self.lenient_or(DenyReason::SelfScopeMismatch);
                };
                if context.person_id() == Some(target_person) {
                    Ok(())
                } else {
                    Err(DenyReason::SelfScopeMismatch)
                }
            }
        }
    }

    fn check_site(
        &self,
        grant: &GrantedPermission,
        target: &AccessTarget,
    ) -> Result<SiteVisibility, DenyReason> {
        match grant.site_access() {
            SiteAccess::AllCompanySites => Ok(SiteVisibility::AllCompanySites),
            SiteAccess::AssignedSiteOnly => {
                // A site restriction without a site is a broken row and
                // fails closed regardless of policy.
                let Some(granted_site) = grant.site_id() else {
                    return Err(DenyReason::MissingGrantSite);
                };
                match target.site_id {
                    None => self
                        .lenient_or(DenyReason::SiteMismatch)
                        .map(|()| SiteVisibility::AssignedSite(granted_site)),
                    Some(target_site) if target_site == granted_site => {
                        Ok(SiteVisibility::AssignedSite(granted_site))
                    }
                    Some(_) => Err(DenyReason::SiteMismatch),
                }
            }
        }
    }

    fn lenient_or(&self, reason: DenyReason) -> Result<(), DenyReason> {
        if self.policy.lenient_on_missing_target {
            Ok(())
        } else {
            Err(reason)
        }
    }
}
