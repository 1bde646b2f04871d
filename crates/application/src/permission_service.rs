use std::sync::Arc;

use serde::{Deserialize, Serialize};

use certivia_core::{CompanyId, PersonId, SiteId};
use certivia_domain::{RoleCatalog, VirtualEntityCatalog};

use crate::audit_ports::AuditSink;
use crate::directory_ports::DirectoryRepository;

mod resolution;
mod scoping;


/// Policy toggles governing scope and site evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionPolicy {
    /// Whether a grant passes when the request names no target to check
    /// its scope or site against. Lenient by default, matching list
    /// endpoints that filter rows afterwards.
    pub lenient_on_missing_target: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            lenient_on_missing_target: true,
        }
    }
}

/// Resource coordinates presented by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessResource {
    /// A concrete resource token, for example `COURSES`.
    Resource(String),
    /// A virtual entity token, for example `EMPLOYEES`.
    VirtualEntity(String),
}

impl AccessResource {
    /// References a concrete resource.
    #[must_use]
    pub fn resource(token: impl Into<String>) -> Self {
        Self::Resource(token.into())
    }

    /// References a virtual entity.
    #[must_use]
    pub fn virtual_entity(token: impl Into<String>) -> Self {
        Self::VirtualEntity(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Resource(token) | Self::VirtualEntity(token) => token.as_str(),
        }
    }
}

/// Record coordinates a permission check runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessTarget {
    /// Company owning the targeted records, if known.
    pub company_id: Option<CompanyId>,
    /// Site owning the targeted records, if known.
    pub site_id: Option<SiteId>,
    /// Person the targeted records belong to, if known.
    pub person_id: Option<PersonId>,
}

impl AccessTarget {
    /// Creates a target with no coordinates, as list endpoints do.
    #[must_use]
    pub fn unscoped() -> Self {
        Self::default()
    }

    /// Names the company owning the targeted records.
    #[must_use]
    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Names the site owning the targeted records.
    #[must_use]
    pub fn with_site(mut self, site_id: SiteId) -> Self {
        self.site_id = Some(site_id);
        self
    }

    /// Names the person the targeted records belong to.
    #[must_use]
    pub fn with_person(mut self, person_id: PersonId) -> Self {
        self.person_id = Some(person_id);
        self
    }
}

/// Permission evaluation engine resolving grants through the cascade.
#[derive(Clone)]
pub struct PermissionService {
    directory: Arc<dyn DirectoryRepository>,
    audit_sink: Arc<dyn AuditSink>,
    roles: Arc<RoleCatalog>,
    entities: Arc<VirtualEntityCatalog>,
    policy: ResolutionPolicy,
}

impl PermissionService {
    /// Creates a permission service over the given catalogs.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        audit_sink: Arc<dyn AuditSink>,
        roles: Arc<RoleCatalog>,
        entities: Arc<VirtualEntityCatalog>,
    ) -> Self {
        Self {
            directory,
            audit_sink,
            roles,
            entities,
            policy: ResolutionPolicy::default(),
        }
    }

    /// Overrides the scope evaluation policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }
}
