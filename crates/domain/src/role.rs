use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use certivia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Version of the role table shipped with the engine.
const BUILTIN_CATALOG_VERSION: u32 = 1;

/// Validated role token, for example `COMPANY_ADMIN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(String);

impl RoleId {
    /// Creates a validated role token.
    ///
    /// Tokens must start with an uppercase letter and may contain only
    /// uppercase letters, digits, and underscores.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_token(&value, "role id")?;
        Ok(Self(value))
    }

    /// Returns the underlying token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    // Value must already satisfy the token rules checked by `new`.
    pub(crate) fn known(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl FromStr for RoleId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Checks the uppercase snake-case token rules shared by role ids,
/// entity names, and permission keys.
pub(crate) fn validate_token(value: &str, kind: &str) -> AppResult<()> {
    let mut characters = value.chars();
    let Some(first) = characters.next() else {
        return Err(AppError::Validation(format!("{kind} must not be empty")));
    };
    if !first.is_ascii_uppercase() {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' must start with an uppercase letter"
        )));
    }
    if !characters.all(is_token_character) {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' may contain only uppercase letters, digits, and underscores"
        )));
    }

    Ok(())
}

fn is_token_character(character: char) -> bool {
    character.is_ascii_uppercase() || character.is_ascii_digit() || character == '_'
}

/// One role in the hierarchy with its seniority level.
///
/// Lower levels are more senior. The default parent names the role an
/// assignment hangs under when no explicit parent is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    role_id: RoleId,
    level: u8,
    default_parent: Option<RoleId>,
}

impl RoleDefinition {
    /// Creates a role definition with validated tokens.
    pub fn new(
        role_id: impl Into<String>,
        level: u8,
        default_parent: Option<&str>,
    ) -> AppResult<Self> {
        let role_id = RoleId::new(role_id)?;
        let default_parent = default_parent.map(RoleId::new).transpose()?;

        Ok(Self {
            role_id,
            level,
            default_parent,
        })
    }

    /// Returns the role token.
    #[must_use]
    pub fn role_id(&self) -> &RoleId {
        &self.role_id
    }

    /// Returns the seniority level, where lower is more senior.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Returns the default parent role, if one is configured.
    #[must_use]
    pub fn default_parent(&self) -> Option<&RoleId> {
        self.default_parent.as_ref()
    }
}

/// Serialized shape of a role catalog document.
#[derive(Debug, Deserialize)]
struct RoleCatalogDocument {
    version: u32,
    roles: Vec<RoleDocument>,
}

#[derive(Debug, Deserialize)]
struct RoleDocument {
    role_id: String,
    level: u8,
    #[serde(default)]
    default_parent: Option<String>,
}

/// Immutable catalog of role definitions for one tenant configuration.
///
/// The catalog is validated once at construction and shared read-only
/// afterwards. Bypass levels are the two most senior distinct levels
/// present and are recomputed for every catalog rather than hard-coded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    version: u32,
    roles: BTreeMap<RoleId, RoleDefinition>,
    bypass_levels: BTreeSet<u8>,
}

impl RoleCatalog {
    /// Builds a catalog after checking structural invariants.
    ///
    /// Every default parent must exist in the same catalog and be
    /// strictly more senior than its child.
    pub fn from_definitions(version: u32, definitions: Vec<RoleDefinition>) -> AppResult<Self> {
        if definitions.is_empty() {
            return Err(AppError::Validation(
                "role catalog must contain at least one role".to_owned(),
            ));
        }

        let mut roles = BTreeMap::new();
        for definition in definitions {
            if roles.contains_key(definition.role_id()) {
                return Err(AppError::Validation(format!(
                    "duplicate role id '{}' in catalog",
                    definition.role_id()
                )));
            }
            roles.insert(definition.role_id().clone(), definition);
        }

        for definition in roles.values() {
            let Some(parent) = definition.default_parent() else {
                continue;
            };
            let Some(parent_definition) = roles.get(parent) else {
                return Err(AppError::Validation(format!(
                    "default parent '{parent}' of role '{}' is not in the catalog",
                    definition.role_id()
                )));
            };
            if parent_definition.level() >= definition.level() {
                return Err(AppError::Validation(format!(
                    "default parent '{parent}' must be more senior than role '{}'",
                    definition.role_id()
                )));
            }
        }

        Ok(Self::assemble(version, roles))
    }

    /// Parses and validates a catalog from its JSON document form.
    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let document: RoleCatalogDocument = serde_json::from_str(raw)
            .map_err(|error| AppError::Validation(format!("invalid role catalog document: {error}")))?;

        let mut definitions = Vec::with_capacity(document.roles.len());
        for role in document.roles {
            definitions.push(RoleDefinition::new(
                role.role_id,
                role.level,
                role.default_parent.as_deref(),
            )?);
        }

        Self::from_definitions(document.version, definitions)
    }

    /// Returns the role table used when no tenant override is configured.
    #[must_use]
    pub fn builtin() -> Self {
        Self::assemble(BUILTIN_CATALOG_VERSION, builtin_roles())
    }

    fn assemble(version: u32, roles: BTreeMap<RoleId, RoleDefinition>) -> Self {
        let levels: BTreeSet<u8> = roles.values().map(RoleDefinition::level).collect();
        let bypass_levels: BTreeSet<u8> = levels.into_iter().take(2).collect();

        Self {
            version,
            roles,
            bypass_levels,
        }
    }

    /// Returns the catalog version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the number of roles in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns whether the catalog holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Returns whether the catalog defines the given role.
    #[must_use]
    pub fn contains(&self, role_id: &RoleId) -> bool {
        self.roles.contains_key(role_id)
    }

    /// Iterates over all role definitions in token order.
    pub fn definitions(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.values()
    }

    /// Returns the most and least senior levels present in the catalog.
    #[must_use]
    pub fn level_bounds(&self) -> Option<(u8, u8)> {
        let levels: BTreeSet<u8> = self.roles.values().map(RoleDefinition::level).collect();
        match (levels.first(), levels.last()) {
            (Some(min), Some(max)) => Some((*min, *max)),
            _ => None,
        }
    }

    /// Returns the seniority level of a role.
    pub fn level_of(&self, role_id: &RoleId) -> AppResult<u8> {
        self.roles
            .get(role_id)
            .map(RoleDefinition::level)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' is not in the catalog")))
    }

    /// Returns whether `senior` sits strictly above `junior` in the hierarchy.
    pub fn is_ancestor(&self, senior: &RoleId, junior: &RoleId) -> AppResult<bool> {
        Ok(self.level_of(senior)? < self.level_of(junior)?)
    }

    /// Returns the absolute level difference between two roles.
    pub fn hierarchical_distance(&self, left: &RoleId, right: &RoleId) -> AppResult<u8> {
        Ok(self.level_of(left)?.abs_diff(self.level_of(right)?))
    }

    /// Returns whether the role sits on one of the bypass levels.
    pub fn is_bypass_role(&self, role_id: &RoleId) -> AppResult<bool> {
        Ok(self.bypass_levels.contains(&self.level_of(role_id)?))
    }

    /// Returns every role strictly less senior than the actor's best role.
    ///
    /// Actor roles missing from the catalog contribute nothing, so an
    /// actor holding only unrecognized roles can assign nothing.
    #[must_use]
    pub fn assignable_roles(&self, actor_roles: &[RoleId]) -> BTreeSet<RoleId> {
        let best = actor_roles
            .iter()
            .filter_map(|role| self.roles.get(role))
            .map(RoleDefinition::level)
            .min();
        let Some(best) = best else {
            return BTreeSet::new();
        };

        self.roles
            .values()
            .filter(|definition| definition.level() > best)
            .map(|definition| definition.role_id().clone())
            .collect()
    }

    /// Returns the assignable role nearest to `desired` in the hierarchy.
    ///
    /// Candidates come from [`RoleCatalog::assignable_roles`], excluding
    /// `desired` itself. Ties at the same distance break toward the more
    /// senior level, then the lexically smaller token.
    #[must_use]
    pub fn closest_assignable_role(
        &self,
        actor_roles: &[RoleId],
        desired: &RoleId,
    ) -> Option<RoleId> {
        let desired_level = self.level_of(desired).ok()?;

        self.assignable_roles(actor_roles)
            .into_iter()
            .filter(|role| role != desired)
            .filter_map(|role| {
                let level = self.level_of(&role).ok()?;
                Some((level.abs_diff(desired_level), level, role))
            })
            .min()
            .map(|(_, _, role)| role)
    }

    /// Returns the configured default parent of a role, if any.
    pub fn default_parent_role(&self, role_id: &RoleId) -> AppResult<Option<RoleId>> {
        let definition = self
            .roles
            .get(role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' is not in the catalog")))?;

        Ok(definition.default_parent().cloned())
    }
}

fn builtin_roles() -> BTreeMap<RoleId, RoleDefinition> {
    // Table entries follow the token rules enforced by `RoleId::new`.
    const TABLE: &[(&str, u8, Option<&str>)] = &[
        ("SUPER_ADMIN", 0, None),
        ("PLATFORM_ADMIN", 1, Some("SUPER_ADMIN")),
        ("COMPANY_ADMIN", 2, Some("PLATFORM_ADMIN")),
        ("COMPANY_MANAGER", 3, Some("COMPANY_ADMIN")),
        ("TRAINING_MANAGER", 4, Some("COMPANY_ADMIN")),
        ("SENIOR_TRAINER", 5, Some("TRAINING_MANAGER")),
        ("TRAINER", 6, Some("TRAINING_MANAGER")),
        ("EXTERNAL_TRAINER", 7, Some("TRAINING_MANAGER")),
        ("EMPLOYEE", 8, Some("COMPANY_MANAGER")),
        ("LEARNER", 9, Some("EMPLOYEE")),
        ("GUEST", 10, None),
    ];

    let mut roles = BTreeMap::new();
    for (role_id, level, parent) in TABLE {
        let definition = RoleDefinition {
            role_id: RoleId::known(role_id),
            level: *level,
            default_parent: parent.map(RoleId::known),
        };
        roles.insert(definition.role_id.clone(), definition);
    }

    roles
}
