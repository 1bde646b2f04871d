use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use certivia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::permission::{EntityAction, PermissionKey};
use crate::role::{RoleCatalog, RoleId, validate_token};

/// Version of the virtual entity table shipped with the engine.
const BUILTIN_CATALOG_VERSION: u32 = 1;

/// Validated virtual entity token, for example `EMPLOYEES`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityName(String);

impl EntityName {
    /// Creates a validated entity token.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_token(&value, "entity name")?;
        Ok(Self(value))
    }

    /// Returns the underlying token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for EntityName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for EntityName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A role-derived population that behaves like an entity without being
/// materialized anywhere.
///
/// Membership is computed per request from a role whitelist and a
/// seniority band. The legacy resource names the generic permission
/// family consulted when no entity-specific grant exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEntityDefinition {
    name: EntityName,
    role_whitelist: BTreeSet<RoleId>,
    min_level: u8,
    max_level: u8,
    permission_keys: BTreeMap<EntityAction, PermissionKey>,
    legacy_resource: String,
}

impl VirtualEntityDefinition {
    /// Creates a definition with per-action keys composed from the name.
    pub fn new(
        name: impl Into<String>,
        role_whitelist: BTreeSet<RoleId>,
        min_level: u8,
        max_level: u8,
        legacy_resource: impl Into<String>,
    ) -> AppResult<Self> {
        let name = EntityName::new(name)?;
        let legacy_resource = legacy_resource.into();
        validate_token(&legacy_resource, "legacy resource name")?;
        if min_level > max_level {
            return Err(AppError::Validation(format!(
                "entity '{name}' has an inverted level band [{min_level}, {max_level}]"
            )));
        }

        let mut permission_keys = BTreeMap::new();
        for action in EntityAction::all() {
            permission_keys.insert(*action, PermissionKey::compose(*action, name.as_str())?);
        }

        Ok(Self {
            name,
            role_whitelist,
            min_level,
            max_level,
            permission_keys,
            legacy_resource,
        })
    }

    /// Replaces the mapped key for one action.
    #[must_use]
    pub fn with_permission_key(mut self, action: EntityAction, key: PermissionKey) -> Self {
        self.permission_keys.insert(action, key);
        self
    }

    /// Replaces the whole action key map.
    ///
    /// Actions absent from the map are not resolvable on this entity and
    /// deny with a configuration diagnostic.
    #[must_use]
    pub fn with_permission_keys(mut self, keys: BTreeMap<EntityAction, PermissionKey>) -> Self {
        self.permission_keys = keys;
        self
    }

    /// Returns the entity token.
    #[must_use]
    pub fn name(&self) -> &EntityName {
        &self.name
    }

    /// Returns the whitelisted role tokens.
    #[must_use]
    pub fn role_whitelist(&self) -> &BTreeSet<RoleId> {
        &self.role_whitelist
    }

    /// Returns the most senior admitted level.
    #[must_use]
    pub fn min_level(&self) -> u8 {
        self.min_level
    }

    /// Returns the least senior admitted level.
    #[must_use]
    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Returns the legacy resource consulted for generic grants.
    #[must_use]
    pub fn legacy_resource(&self) -> &str {
        self.legacy_resource.as_str()
    }

    /// Returns the mapped permission key for an action, if one exists.
    #[must_use]
    pub fn permission_key(&self, action: EntityAction) -> Option<&PermissionKey> {
        self.permission_keys.get(&action)
    }

    /// Composes the key matching the entity's own token for an action.
    #[must_use]
    pub fn direct_permission_key(&self, action: EntityAction) -> PermissionKey {
        PermissionKey::known(format!("{}_{}", action.as_str(), self.name.as_str()))
    }

    /// Composes the generic legacy key for an action.
    #[must_use]
    pub fn legacy_permission_key(&self, action: EntityAction) -> PermissionKey {
        PermissionKey::known(format!("{}_{}", action.as_str(), self.legacy_resource))
    }

    /// Returns whether a role places its holder inside this entity.
    ///
    /// Both conditions must hold: the role is whitelisted and its
    /// catalog level falls inside the band. Roles missing from the
    /// catalog are never admitted.
    #[must_use]
    pub fn admits(&self, role_id: &RoleId, catalog: &RoleCatalog) -> bool {
        if !self.role_whitelist.contains(role_id) {
            return false;
        }

        catalog
            .level_of(role_id)
            .is_ok_and(|level| (self.min_level..=self.max_level).contains(&level))
    }
}

/// Serialized shape of a virtual entity catalog document.
#[derive(Debug, Deserialize)]
struct EntityCatalogDocument {
    version: u32,
    entities: Vec<EntityDocument>,
}

#[derive(Debug, Deserialize)]
struct EntityDocument {
    name: String,
    role_whitelist: Vec<String>,
    min_level: u8,
    max_level: u8,
    #[serde(default)]
    permission_keys: BTreeMap<String, String>,
    legacy_resource: String,
}

/// Immutable catalog of virtual entity definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEntityCatalog {
    version: u32,
    entities: BTreeMap<EntityName, VirtualEntityDefinition>,
}

impl VirtualEntityCatalog {
    /// Builds a catalog after checking definitions against a role catalog.
    ///
    /// Whitelisted roles must exist in the role catalog and each level
    /// band must lie within the catalog's level range.
    pub fn from_definitions(
        version: u32,
        definitions: Vec<VirtualEntityDefinition>,
        roles: &RoleCatalog,
    ) -> AppResult<Self> {
        let Some((most_senior, least_senior)) = roles.level_bounds() else {
            return Err(AppError::Validation(
                "role catalog defines no levels to validate entity bands against".to_owned(),
            ));
        };

        let mut entities = BTreeMap::new();
        for definition in definitions {
            if entities.contains_key(definition.name()) {
                return Err(AppError::Validation(format!(
                    "duplicate virtual entity '{}' in catalog",
                    definition.name()
                )));
            }

            if definition.role_whitelist().is_empty() {
                return Err(AppError::Validation(format!(
                    "virtual entity '{}' whitelists no roles",
                    definition.name()
                )));
            }

            for role in definition.role_whitelist() {
                if !roles.contains(role) {
                    return Err(AppError::Validation(format!(
                        "whitelisted role '{role}' of entity '{}' is not in the role catalog",
                        definition.name()
                    )));
                }
            }

            if definition.min_level() < most_senior || definition.max_level() > least_senior {
                return Err(AppError::Validation(format!(
                    "entity '{}' level band [{}, {}] is outside catalog levels [{most_senior}, {least_senior}]",
                    definition.name(),
                    definition.min_level(),
                    definition.max_level()
                )));
            }

            entities.insert(definition.name().clone(), definition);
        }

        Ok(Self { version, entities })
    }

    /// Parses and validates a catalog from its JSON document form.
    pub fn from_json_str(raw: &str, roles: &RoleCatalog) -> AppResult<Self> {
        let document: EntityCatalogDocument = serde_json::from_str(raw).map_err(|error| {
            AppError::Validation(format!("invalid entity catalog document: {error}"))
        })?;

        let mut definitions = Vec::with_capacity(document.entities.len());
        for entity in document.entities {
            let mut whitelist = BTreeSet::new();
            for role in entity.role_whitelist {
                whitelist.insert(RoleId::new(role)?);
            }

            let mut definition = VirtualEntityDefinition::new(
                entity.name,
                whitelist,
                entity.min_level,
                entity.max_level,
                entity.legacy_resource,
            )?;
            if !entity.permission_keys.is_empty() {
                // A document that names keys is authoritative for the
                // whole map, so narrowed maps stay narrowed.
                let mut keys = BTreeMap::new();
                for (action, key) in entity.permission_keys {
                    keys.insert(EntityAction::from_str(&action)?, PermissionKey::new(key)?);
                }
                definition = definition.with_permission_keys(keys);
            }

            definitions.push(definition);
        }

        Self::from_definitions(document.version, definitions, roles)
    }

    /// Returns the entity table used when no tenant override is configured.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_CATALOG_VERSION,
            entities: builtin_entities(),
        }
    }

    /// Returns the catalog version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the number of entities in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns whether the catalog holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up an entity definition by token.
    #[must_use]
    pub fn get(&self, name: &EntityName) -> Option<&VirtualEntityDefinition> {
        self.entities.get(name)
    }

    /// Iterates over all entity definitions in token order.
    pub fn definitions(&self) -> impl Iterator<Item = &VirtualEntityDefinition> {
        self.entities.values()
    }
}

fn builtin_entities() -> BTreeMap<EntityName, VirtualEntityDefinition> {
    // Table entries follow the token rules enforced by the validated
    // constructors, and both bands sit inside the builtin role levels.
    let employees = VirtualEntityDefinition {
        name: EntityName("EMPLOYEES".to_owned()),
        role_whitelist: ["COMPANY_ADMIN", "COMPANY_MANAGER", "EMPLOYEE", "LEARNER"]
            .iter()
            .map(|role| RoleId::known(role))
            .collect(),
        min_level: 2,
        max_level: 9,
        permission_keys: composed_keys("EMPLOYEES"),
        legacy_resource: "PERSONS".to_owned(),
    };
    let trainers = VirtualEntityDefinition {
        name: EntityName("TRAINERS".to_owned()),
        role_whitelist: [
            "TRAINING_MANAGER",
            "SENIOR_TRAINER",
            "TRAINER",
            "EXTERNAL_TRAINER",
        ]
        .iter()
        .map(|role| RoleId::known(role))
        .collect(),
        min_level: 4,
        max_level: 7,
        permission_keys: composed_keys("TRAINERS"),
        legacy_resource: "PERSONS".to_owned(),
    };

    let mut entities = BTreeMap::new();
    entities.insert(employees.name.clone(), employees);
    entities.insert(trainers.name.clone(), trainers);
    entities
}

fn composed_keys(name: &str) -> BTreeMap<EntityAction, PermissionKey> {
    EntityAction::all()
        .iter()
        .map(|action| {
            (
                *action,
                PermissionKey::known(format!("{}_{name}", action.as_str())),
            )
        })
        .collect()
}
