use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use certivia_application::{
    DirectoryRepository, PersonSummary, RoleAdminRepository, UpsertAssignmentInput,
};
use certivia_core::{AppResult, CompanyId, PersonId, TenantId};
use certivia_domain::{RoleAssignment, RoleId};

/// Directory row seeded into the in-memory adapter.
#[derive(Debug, Clone)]
pub struct PersonRecord {
    /// Display name for population listings.
    pub display_name: String,
    /// Company the person belongs to, if any.
    pub company_id: Option<CompanyId>,
    /// Soft-deletion marker.
    pub is_deleted: bool,
}

/// In-memory directory implementation backing both directory ports.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryRepository {
    people: RwLock<HashMap<(TenantId, PersonId), PersonRecord>>,
    assignments: RwLock<HashMap<PersonId, Vec<RoleAssignment>>>,
}

impl InMemoryDirectoryRepository {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            people: RwLock::new(HashMap::new()),
            assignments: RwLock::new(HashMap::new()),
        }
    }

    /// Stores or replaces a person row.
    pub async fn upsert_person(
        &self,
        tenant_id: TenantId,
        person_id: PersonId,
        record: PersonRecord,
    ) {
        self.people
            .write()
            .await
            .insert((tenant_id, person_id), record);
    }

    /// Stores an assignment as-is, bypassing the admin port.
    ///
    /// Useful for rows the port cannot produce, such as assignments
    /// bound to no tenant.
    pub async fn seed_assignment(&self, assignment: RoleAssignment) {
        self.assignments
            .write()
            .await
            .entry(assignment.person_id())
            .or_default()
            .push(assignment);
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn active_role_assignments(
        &self,
        person_id: PersonId,
        tenant_id: Option<TenantId>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let assignments = self.assignments.read().await;
        let now = Utc::now();

        Ok(assignments
            .get(&person_id)
            .map(|rows| {
                rows.iter()
                    .filter(|assignment| assignment.is_currently_active(now))
                    .filter(|assignment| {
                        tenant_id.is_none()
                            || assignment.tenant_id().is_none()
                            || assignment.tenant_id() == tenant_id
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn person_population(
        &self,
        tenant_id: TenantId,
        company_id: Option<CompanyId>,
    ) -> AppResult<Vec<PersonSummary>> {
        let people = self.people.read().await;
        let assignments = self.assignments.read().await;
        let now = Utc::now();

        let mut rows: Vec<PersonSummary> = people
            .iter()
            .filter(|((stored_tenant_id, _), _)| stored_tenant_id == &tenant_id)
            .filter(|(_, record)| company_id.is_none() || record.company_id == company_id)
            .map(|((_, person_id), record)| {
                let role_types = assignments
                    .get(person_id)
                    .map(|held| {
                        held.iter()
                            .filter(|assignment| assignment.is_currently_active(now))
                            .filter(|assignment| {
                                assignment.tenant_id().is_none()
                                    || assignment.tenant_id() == Some(tenant_id)
                            })
                            .map(|assignment| assignment.role_type().clone())
                            .collect()
                    })
                    .unwrap_or_default();

                PersonSummary {
                    person_id: *person_id,
                    display_name: record.display_name.clone(),
                    role_types,
                    is_deleted: record.is_deleted,
                }
            })
            .collect();
        rows.sort_by(|left, right| {
            left.display_name
                .cmp(&right.display_name)
                .then_with(|| left.person_id.cmp(&right.person_id))
        });

        Ok(rows)
    }
}

#[async_trait]
impl RoleAdminRepository for InMemoryDirectoryRepository {
    async fn upsert_assignment(
        &self,
        tenant_id: TenantId,
        input: UpsertAssignmentInput,
    ) -> AppResult<RoleAssignment> {
        let UpsertAssignmentInput {
            person_id,
            role_type,
            company_id,
            parent_role,
            expires_at,
            granted_permissions,
        } = input;

        let mut assignment = RoleAssignment::new(person_id, role_type)
            .with_tenant(tenant_id)
            .with_grants(granted_permissions);
        if let Some(parent) = parent_role {
            assignment = assignment.with_parent_role(parent);
        }
        if let Some(company_id) = company_id {
            assignment = assignment.with_company(company_id);
        }
        if let Some(expires_at) = expires_at {
            assignment = assignment.with_expiry(expires_at);
        }

        let mut assignments = self.assignments.write().await;
        let rows = assignments.entry(person_id).or_default();
        for row in rows.iter_mut() {
            if row.is_active()
                && row.tenant_id() == Some(tenant_id)
                && row.role_type() == assignment.role_type()
                && row.company_id() == assignment.company_id()
            {
                row.deactivate();
            }
        }
        rows.push(assignment.clone());

        Ok(assignment)
    }

    async fn deactivate_assignment(
        &self,
        tenant_id: TenantId,
        person_id: PersonId,
        role_type: &RoleId,
        company_id: Option<CompanyId>,
    ) -> AppResult<bool> {
        let mut assignments = self.assignments.write().await;
        let Some(rows) = assignments.get_mut(&person_id) else {
            return Ok(false);
        };

        let mut found = false;
        for row in rows.iter_mut() {
            if row.is_active()
                && row.tenant_id() == Some(tenant_id)
                && row.role_type() == role_type
                && row.company_id() == company_id
            {
                row.deactivate();
                found = true;
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use certivia_application::{
        DirectoryRepository, ProjectionService, RoleAdminRepository, UpsertAssignmentInput,
    };
    use certivia_core::{CompanyId, PersonId, TenantId};
    use certivia_domain::{RoleAssignment, RoleCatalog, RoleId, VirtualEntityCatalog};

    use super::{InMemoryDirectoryRepository, PersonRecord};

    fn role(value: &str) -> RoleId {
        RoleId::new(value).unwrap_or_else(|_| unreachable!())
    }

    fn input(
        person_id: PersonId,
        role_type: &str,
        company_id: Option<CompanyId>,
    ) -> UpsertAssignmentInput {
        UpsertAssignmentInput {
            person_id,
            role_type: role(role_type),
            company_id,
            parent_role: None,
            expires_at: None,
            granted_permissions: Vec::new(),
        }
    }

    fn record(display_name: &str, company_id: Option<CompanyId>, is_deleted: bool) -> PersonRecord {
        PersonRecord {
            display_name: display_name.to_owned(),
            company_id,
            is_deleted,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_the_matching_active_assignment() {
        let repository = InMemoryDirectoryRepository::new();
        let tenant_id = TenantId::new();
        let person_id = PersonId::new();

        let first = repository
            .upsert_assignment(tenant_id, input(person_id, "TRAINER", None))
            .await;
        assert!(first.is_ok());
        let second = repository
            .upsert_assignment(tenant_id, input(person_id, "TRAINER", None))
            .await;
        assert!(second.is_ok());

        let active = repository
            .active_role_assignments(person_id, Some(tenant_id))
            .await;
        assert_eq!(active.unwrap_or_default().len(), 1);
    }

    #[tokio::test]
    async fn assignments_under_different_companies_stay_active_together() {
        let repository = InMemoryDirectoryRepository::new();
        let tenant_id = TenantId::new();
        let person_id = PersonId::new();

        for company_id in [Some(CompanyId::new()), Some(CompanyId::new()), None] {
            let upserted = repository
                .upsert_assignment(tenant_id, input(person_id, "TRAINER", company_id))
                .await;
            assert!(upserted.is_ok());
        }

        let active = repository
            .active_role_assignments(person_id, Some(tenant_id))
            .await;
        assert_eq!(active.unwrap_or_default().len(), 3);
    }

    #[tokio::test]
    async fn tenant_binding_limits_assignment_visibility() {
        let repository = InMemoryDirectoryRepository::new();
        let home_tenant = TenantId::new();
        let other_tenant = TenantId::new();
        let person_id = PersonId::new();

        let upserted = repository
            .upsert_assignment(home_tenant, input(person_id, "TRAINER", None))
            .await;
        assert!(upserted.is_ok());

        let foreign = repository
            .active_role_assignments(person_id, Some(other_tenant))
            .await;
        assert!(foreign.unwrap_or_default().is_empty());

        let home = repository
            .active_role_assignments(person_id, Some(home_tenant))
            .await;
        assert_eq!(home.unwrap_or_default().len(), 1);

        repository
            .seed_assignment(RoleAssignment::new(person_id, role("EMPLOYEE")))
            .await;
        let unbound = repository
            .active_role_assignments(person_id, Some(other_tenant))
            .await;
        assert_eq!(unbound.unwrap_or_default().len(), 1);
    }

    #[tokio::test]
    async fn expired_assignments_never_surface() {
        let repository = InMemoryDirectoryRepository::new();
        let person_id = PersonId::new();

        repository
            .seed_assignment(
                RoleAssignment::new(person_id, role("TRAINER"))
                    .with_expiry(Utc::now() - Duration::minutes(1)),
            )
            .await;

        let active = repository.active_role_assignments(person_id, None).await;
        assert!(active.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn population_joins_active_roles_and_filters_by_company() {
        let repository = InMemoryDirectoryRepository::new();
        let tenant_id = TenantId::new();
        let company_a = CompanyId::new();
        let company_b = CompanyId::new();
        let ada = PersonId::new();
        let ben = PersonId::new();
        let stranger = PersonId::new();

        repository
            .upsert_person(tenant_id, ada, record("Ada", Some(company_a), false))
            .await;
        repository
            .upsert_person(tenant_id, ben, record("Ben", Some(company_b), false))
            .await;
        repository
            .upsert_person(TenantId::new(), stranger, record("Sam", Some(company_a), false))
            .await;
        let assigned = repository
            .upsert_assignment(tenant_id, input(ada, "TRAINER", Some(company_a)))
            .await;
        assert!(assigned.is_ok());

        let population = repository.person_population(tenant_id, Some(company_a)).await;
        let rows = population.unwrap_or_default();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_name, "Ada");
        assert_eq!(rows[0].role_types, vec![role("TRAINER")]);
    }

    #[tokio::test]
    async fn population_is_name_sorted_and_keeps_deleted_rows() {
        let repository = InMemoryDirectoryRepository::new();
        let tenant_id = TenantId::new();

        repository
            .upsert_person(tenant_id, PersonId::new(), record("Zoe", None, false))
            .await;
        repository
            .upsert_person(tenant_id, PersonId::new(), record("Ada", None, true))
            .await;

        let population = repository.person_population(tenant_id, None).await;
        let rows = population.unwrap_or_default();
        let names: Vec<&str> = rows.iter().map(|row| row.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Zoe"]);
        assert!(rows[0].is_deleted);
    }

    #[tokio::test]
    async fn projection_reflects_deactivation_on_the_next_call() {
        let repository = Arc::new(InMemoryDirectoryRepository::new());
        let tenant_id = TenantId::new();
        let person_id = PersonId::new();
        let service = ProjectionService::new(
            repository.clone(),
            Arc::new(RoleCatalog::builtin()),
            Arc::new(VirtualEntityCatalog::builtin()),
        );

        repository
            .upsert_person(tenant_id, person_id, record("Ada", None, false))
            .await;
        let upserted = repository
            .upsert_assignment(tenant_id, input(person_id, "TRAINER", None))
            .await;
        assert!(upserted.is_ok());

        let before = service.project("TRAINERS", tenant_id, None).await;
        assert_eq!(before.unwrap_or_default().len(), 1);

        let removed = repository
            .deactivate_assignment(tenant_id, person_id, &role("TRAINER"), None)
            .await;
        assert!(removed.unwrap_or(false));

        let after = service.project("TRAINERS", tenant_id, None).await;
        assert!(after.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn deactivation_reports_whether_a_row_matched() {
        let repository = InMemoryDirectoryRepository::new();
        let tenant_id = TenantId::new();
        let person_id = PersonId::new();

        let missing = repository
            .deactivate_assignment(tenant_id, person_id, &role("TRAINER"), None)
            .await;
        assert!(!missing.unwrap_or(true));

        let upserted = repository
            .upsert_assignment(tenant_id, input(person_id, "TRAINER", None))
            .await;
        assert!(upserted.is_ok());

        let removed = repository
            .deactivate_assignment(tenant_id, person_id, &role("TRAINER"), None)
            .await;
        assert!(removed.unwrap_or(false));

        let active = repository
            .active_role_assignments(person_id, Some(tenant_id))
            .await;
        assert!(active.unwrap_or_default().is_empty());
    }
}
