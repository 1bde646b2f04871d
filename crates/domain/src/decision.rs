use std::fmt::{Display, Formatter};

use certivia_core::SiteId;

use crate::permission::{EntityAction, FieldSet, PermissionScope};

/// Site reach attached to an allowed decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteVisibility {
    /// Caller may see records from every site of the covered companies.
    AllCompanySites,
    /// Caller may only see records from the named site.
    AssignedSite(SiteId),
}

/// Why an evaluation denied access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The request context names no authenticated person or tenant.
    Unauthenticated,
    /// No active grant matched any candidate permission key.
    NoMatchingPermission,
    /// A company-scoped grant did not cover the targeted company.
    CompanyScopeMismatch,
    /// A self-scoped grant targeted someone other than the actor.
    SelfScopeMismatch,
    /// A site-restricted grant did not cover the targeted site.
    SiteMismatch,
    /// A site-restricted grant names no site and fails closed.
    MissingGrantSite,
    /// The requested virtual entity is not in the catalog.
    UnknownEntity(String),
    /// The entity maps no permission key for the requested action.
    UnmappedAction {
        /// Entity whose key map was consulted.
        entity: String,
        /// Action with no mapped key.
        action: EntityAction,
    },
}

impl Display for DenyReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(formatter, "request is not authenticated"),
            Self::NoMatchingPermission => {
                write!(formatter, "no grant matches the requested permission")
            }
            Self::CompanyScopeMismatch => {
                write!(formatter, "grant does not cover the targeted company")
            }
            Self::SelfScopeMismatch => {
                write!(formatter, "self-scoped grant does not cover the targeted person")
            }
            Self::SiteMismatch => write!(formatter, "grant does not cover the targeted site"),
            Self::MissingGrantSite => {
                write!(formatter, "site-restricted grant names no site")
            }
            Self::UnknownEntity(name) => {
                write!(formatter, "virtual entity '{name}' is not configured")
            }
            Self::UnmappedAction { entity, action } => {
                write!(
                    formatter,
                    "entity '{entity}' maps no key for action '{}'",
                    action.as_str()
                )
            }
        }
    }
}

/// Outcome of one permission evaluation.
///
/// Decisions are computed per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// Access granted with the winning grant's reach.
    Allow {
        /// Record breadth of the winning grant.
        scope: PermissionScope,
        /// Fields the caller may see.
        fields: FieldSet,
        /// Sites the caller may see.
        site: SiteVisibility,
    },
    /// Access denied with a diagnostic reason.
    Deny {
        /// Why the evaluation denied access.
        reason: DenyReason,
    },
}

impl PermissionDecision {
    /// Creates the unrestricted decision granted to bypass roles.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::Allow {
            scope: PermissionScope::Global,
            fields: FieldSet::All,
            site: SiteVisibility::AllCompanySites,
        }
    }

    /// Creates a denial with a diagnostic reason.
    #[must_use]
    pub fn denied(reason: DenyReason) -> Self {
        Self::Deny { reason }
    }

    /// Returns whether access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Returns the granted scope, if access was granted.
    #[must_use]
    pub fn scope(&self) -> Option<PermissionScope> {
        match self {
            Self::Allow { scope, .. } => Some(*scope),
            Self::Deny { .. } => None,
        }
    }

    /// Returns the deny reason, if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Allow { .. } => None,
            Self::Deny { reason } => Some(reason),
        }
    }

    /// Restricts a requested field list by the decision's field set.
    ///
    /// Denied decisions expose no fields.
    #[must_use]
    pub fn filter_fields(&self, requested: &[String]) -> Vec<String> {
        match self {
            Self::Allow { fields, .. } => fields.filter_request(requested),
            Self::Deny { .. } => Vec::new(),
        }
    }
}
