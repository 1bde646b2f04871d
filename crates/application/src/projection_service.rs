use std::sync::Arc;

use chrono::Utc;

use certivia_core::{AppError, AppResult, CompanyId, PersonId, TenantId};
use certivia_domain::{
    EntityName, RoleAssignment, RoleCatalog, VirtualEntityCatalog, VirtualEntityDefinition,
};

use crate::directory_ports::{DirectoryRepository, PersonSummary};

/// Computes virtual entity membership and population projections.
///
/// Membership is derived from active role assignments on every call.
/// Nothing is materialized, so an assignment change is visible on the
/// next call without an invalidation step.
#[derive(Clone)]
pub struct ProjectionService {
    directory: Arc<dyn DirectoryRepository>,
    roles: Arc<RoleCatalog>,
    entities: Arc<VirtualEntityCatalog>,
}

impl ProjectionService {
    /// Creates a projection service over the given catalogs.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        roles: Arc<RoleCatalog>,
        entities: Arc<VirtualEntityCatalog>,
    ) -> Self {
        Self {
            directory,
            roles,
            entities,
        }
    }

    /// Returns whether a person currently belongs to a virtual entity.
    pub async fn is_member(
        &self,
        person_id: PersonId,
        tenant_id: TenantId,
        entity_name: &str,
    ) -> AppResult<bool> {
        let definition = self.entity_definition(entity_name)?;
        let assignments = self
            .directory
            .active_role_assignments(person_id, Some(tenant_id))
            .await?;
        let now = Utc::now();

        Ok(assignments
            .iter()
            .filter(|assignment| assignment.is_currently_active(now))
            .any(|assignment| definition.admits(assignment.role_type(), &self.roles)))
    }

    /// Lists the population of a virtual entity.
    ///
    /// The directory's row order is preserved. Soft-deleted people and
    /// people whose roles do not admit are dropped.
    pub async fn project(
        &self,
        entity_name: &str,
        tenant_id: TenantId,
        company_id: Option<CompanyId>,
    ) -> AppResult<Vec<PersonSummary>> {
        let definition = self.entity_definition(entity_name)?;
        let population = self
            .directory
            .person_population(tenant_id, company_id)
            .await?;

        Ok(population
            .into_iter()
            .filter(|person| !person.is_deleted)
            .filter(|person| {
                person
                    .role_types
                    .iter()
                    .any(|role| definition.admits(role, &self.roles))
            })
            .collect())
    }

    /// Names every virtual entity the person currently belongs to.
    pub async fn entities_for_person(
        &self,
        person_id: PersonId,
        tenant_id: TenantId,
    ) -> AppResult<Vec<EntityName>> {
        let assignments = self
            .directory
            .active_role_assignments(person_id, Some(tenant_id))
            .await?;
        let now = Utc::now();
        let role_types: Vec<_> = assignments
            .iter()
            .filter(|assignment| assignment.is_currently_active(now))
            .map(RoleAssignment::role_type)
            .collect();

        Ok(self
            .entities
            .definitions()
            .filter(|definition| {
                role_types
                    .iter()
                    .any(|role| definition.admits(role, &self.roles))
            })
            .map(|definition| definition.name().clone())
            .collect())
    }

    fn entity_definition(&self, entity_name: &str) -> AppResult<&VirtualEntityDefinition> {
        let name = EntityName::new(entity_name)?;
        self.entities.get(&name).ok_or_else(|| {
            AppError::Validation(format!("virtual entity '{name}' is not configured"))
        })
    }
}
