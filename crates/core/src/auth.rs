use serde::{Deserialize, Serialize};

use crate::{CompanyId, PersonId, SiteId, TenantId};

/// Caller coordinates attached to every permission evaluation.
///
/// A context without a person or tenant represents an unauthenticated
/// request and resolves to a denial instead of an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    person_id: Option<PersonId>,
    tenant_id: Option<TenantId>,
    company_id: Option<CompanyId>,
    site_id: Option<SiteId>,
}

impl RequestContext {
    /// Creates a context for an authenticated person acting in a tenant.
    #[must_use]
    pub fn authenticated(person_id: PersonId, tenant_id: TenantId) -> Self {
        Self {
            person_id: Some(person_id),
            tenant_id: Some(tenant_id),
            company_id: None,
            site_id: None,
        }
    }

    /// Creates a context with no authenticated caller.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attaches the company the caller is currently acting in.
    #[must_use]
    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Attaches the site the caller is assigned to.
    #[must_use]
    pub fn with_site(mut self, site_id: SiteId) -> Self {
        self.site_id = Some(site_id);
        self
    }

    /// Returns the authenticated person, if any.
    #[must_use]
    pub fn person_id(&self) -> Option<PersonId> {
        self.person_id
    }

    /// Returns the tenant the request runs under, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Returns the company the caller is acting in, if any.
    #[must_use]
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    /// Returns the site the caller is assigned to, if any.
    #[must_use]
    pub fn site_id(&self) -> Option<SiteId> {
        self.site_id
    }
}

#[cfg(test)]
mod tests {
    use super::RequestContext;
    use crate::{CompanyId, PersonId, TenantId};

    #[test]
    fn anonymous_context_has_no_actor() {
        let context = RequestContext::anonymous();
        assert!(context.person_id().is_none());
        assert!(context.tenant_id().is_none());
    }

    #[test]
    fn builder_attaches_company_and_keeps_actor() {
        let person_id = PersonId::new();
        let company_id = CompanyId::new();
        let context =
            RequestContext::authenticated(person_id, TenantId::new()).with_company(company_id);

        assert_eq!(context.person_id(), Some(person_id));
        assert_eq!(context.company_id(), Some(company_id));
    }
}
