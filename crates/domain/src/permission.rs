use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use certivia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::role::validate_token;

/// Actions grantable on a resource or virtual entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    /// Read records and their fields.
    View,
    /// Create new records.
    Create,
    /// Update existing records.
    Edit,
    /// Remove records.
    Delete,
}

impl EntityAction {
    /// Returns the stable token used as the permission key prefix.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Create => "CREATE",
            Self::Edit => "EDIT",
            Self::Delete => "DELETE",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[EntityAction] = &[
            EntityAction::View,
            EntityAction::Create,
            EntityAction::Edit,
            EntityAction::Delete,
        ];

        ALL
    }
}

impl FromStr for EntityAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "VIEW" => Ok(Self::View),
            "CREATE" => Ok(Self::Create),
            "EDIT" => Ok(Self::Edit),
            "DELETE" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!(
                "unknown entity action '{value}'"
            ))),
        }
    }
}

/// Breadth of records a grant covers.
///
/// The derived ordering follows permissiveness, so `Global` compares
/// greater than `Company`, which compares greater than `SelfOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    /// Grant covers only records belonging to the actor.
    #[serde(rename = "self")]
    SelfOnly,
    /// Grant covers records within one company.
    Company,
    /// Grant covers every record in the tenant.
    Global,
}

impl PermissionScope {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfOnly => "self",
            Self::Company => "company",
            Self::Global => "global",
        }
    }
}

impl FromStr for PermissionScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "self" => Ok(Self::SelfOnly),
            "company" => Ok(Self::Company),
            "global" => Ok(Self::Global),
            _ => Err(AppError::Validation(format!(
                "unknown permission scope '{value}'"
            ))),
        }
    }
}

/// Site reach of a grant within a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteAccess {
    /// Grant covers every site of the covered company.
    AllCompanySites,
    /// Grant covers only the site named on the grant.
    AssignedSiteOnly,
}

impl SiteAccess {
    /// Returns a stable storage value for this site reach.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllCompanySites => "all_company_sites",
            Self::AssignedSiteOnly => "assigned_site_only",
        }
    }
}

impl FromStr for SiteAccess {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all_company_sites" => Ok(Self::AllCompanySites),
            "assigned_site_only" => Ok(Self::AssignedSiteOnly),
            _ => Err(AppError::Validation(format!(
                "unknown site access value '{value}'"
            ))),
        }
    }
}

/// Storage token of a grantable permission, for example `VIEW_EMPLOYEES`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Creates a validated permission key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_token(&value, "permission key")?;
        Ok(Self(value))
    }

    /// Composes the `{ACTION}_{RESOURCE}` key for an action on a resource.
    pub fn compose(action: EntityAction, resource: &str) -> AppResult<Self> {
        validate_token(resource, "resource name")?;
        Ok(Self(format!("{}_{resource}", action.as_str())))
    }

    /// Returns the underlying token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    // Value must already satisfy the token rules checked by `new`.
    pub(crate) fn known(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for PermissionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Fields a grant exposes on matched records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    /// Every field is visible.
    #[default]
    All,
    /// Only the named fields are visible.
    Named(BTreeSet<String>),
}

impl FieldSet {
    /// Builds a field set from named fields.
    ///
    /// A `*` entry widens the set to [`FieldSet::All`]. An empty list
    /// stays empty and exposes no fields.
    #[must_use]
    pub fn named<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        if fields.contains("*") {
            return Self::All;
        }

        Self::Named(fields)
    }

    /// Returns whether every field is visible.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Restricts a requested field list to the visible fields.
    ///
    /// An unrestricted set returns the request unchanged, or `["*"]`
    /// when nothing was requested. A named set keeps the first
    /// occurrence of each requested field that it contains, preserving
    /// request order.
    #[must_use]
    pub fn filter_request(&self, requested: &[String]) -> Vec<String> {
        match self {
            Self::All => {
                if requested.is_empty() {
                    vec!["*".to_owned()]
                } else {
                    requested.to_vec()
                }
            }
            Self::Named(allowed) => {
                let mut seen: BTreeSet<&str> = BTreeSet::new();
                requested
                    .iter()
                    .filter(|field| allowed.contains(field.as_str()) && seen.insert(field.as_str()))
                    .cloned()
                    .collect()
            }
        }
    }
}
