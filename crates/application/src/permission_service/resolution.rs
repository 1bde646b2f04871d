use super::*;

use chrono::Utc;
use tracing::{debug, warn};

use certivia_core::{AppError, AppResult, RequestContext};
use certivia_domain::{
    AuditAction, DenyReason, EntityAction, EntityName, GrantedPermission, PermissionDecision,
    PermissionKey, RoleAssignment,
};

use crate::audit_ports::AccessAuditEvent;

impl PermissionService {
    /// Evaluates whether the actor in `context` may perform `action` on
    /// a resource or virtual entity.
    ///
    /// Denials come back as decisions, not errors, so callers can
    /// inspect the reason. Only a failing directory read surfaces as an
    /// error, because no decision was reached at all.
    pub async fn check_permission(
        &self,
        context: &RequestContext,
        action: EntityAction,
        resource: &AccessResource,
        target: &AccessTarget,
    ) -> AppResult<PermissionDecision> {
        let decision = self.resolve(context, action, resource, target).await?;
        debug!(
            resource = resource.token(),
            action = action.as_str(),
            allowed = decision.is_allowed(),
            "permission evaluated"
        );
        self.record_evaluation(context, action, resource, &decision)
            .await;

        Ok(decision)
    }

    /// Evaluates a permission and converts denials into errors.
    ///
    /// An unauthenticated denial maps to [`AppError::Unauthorized`],
    /// every other denial to [`AppError::Forbidden`].
    pub async fn require_permission(
        &self,
        context: &RequestContext,
        action: EntityAction,
        resource: &AccessResource,
        target: &AccessTarget,
    ) -> AppResult<PermissionDecision> {
        let decision = self
            .check_permission(context, action, resource, target)
            .await?;
        match decision.deny_reason() {
            None => Ok(decision),
            Some(DenyReason::Unauthenticated) => {
                Err(AppError::Unauthorized(DenyReason::Unauthenticated.to_string()))
            }
            Some(reason) => Err(AppError::Forbidden(format!(
                "'{}' on '{}' denied: {reason}",
                action.as_str(),
                resource.token()
            ))),
        }
    }

    async fn resolve(
        &self,
        context: &RequestContext,
        action: EntityAction,
        resource: &AccessResource,
        target: &AccessTarget,
    ) -> AppResult<PermissionDecision> {
        let (Some(person_id), Some(tenant_id)) = (context.person_id(), context.tenant_id()) else {
            return Ok(PermissionDecision::denied(DenyReason::Unauthenticated));
        };

        let now = Utc::now();
        let assignments: Vec<RoleAssignment> = self
            .directory
            .active_role_assignments(person_id, Some(tenant_id))
            .await?
            .into_iter()
            .filter(|assignment| assignment.is_currently_active(now))
            .collect();

        if self.holds_bypass_role(&assignments) {
            return Ok(PermissionDecision::unrestricted());
        }

        let keys = match self.candidate_keys(action, resource) {
            Ok(keys) => keys,
            Err(reason) => return Ok(PermissionDecision::denied(reason)),
        };

        // Keys are tried in cascade order. Within one key the widest
        // scope wins, and the first grant whose target checks pass
        // resolves the request.
        let mut first_failure = None;
        for key in &keys {
            let mut matches: Vec<(&RoleAssignment, &GrantedPermission)> = assignments
                .iter()
                .flat_map(|assignment| {
                    assignment
                        .granted_permissions()
                        .iter()
                        .map(move |grant| (assignment, grant))
                })
                .filter(|(_, grant)| grant.is_granted() && grant.permission_key() == key)
                .collect();
            matches.sort_by(|left, right| right.1.scope().cmp(&left.1.scope()));

            for (assignment, grant) in matches {
                match self.evaluate_target(context, assignment, grant, target) {
                    Ok(site) => {
                        return Ok(PermissionDecision::Allow {
                            scope: grant.scope(),
                            fields: grant.allowed_fields().clone(),
                            site,
                        });
                    }
                    Err(reason) => {
                        if first_failure.is_none() {
                            first_failure = Some(reason);
                        }
                    }
                }
            }
        }

        Ok(PermissionDecision::denied(
            first_failure.unwrap_or(DenyReason::NoMatchingPermission),
        ))
    }

    fn holds_bypass_role(&self, assignments: &[RoleAssignment]) -> bool {
        assignments.iter().any(|assignment| {
            self.roles
                .is_bypass_role(assignment.role_type())
                .unwrap_or(false)
        })
    }

    /// Builds the ordered permission keys consulted for a request.
    ///
    /// Plain resources try their own composed key. Virtual entities try
    /// the key named after the entity, then the mapped key, then the
    /// legacy key of the backing resource, deduplicated in that order.
    fn candidate_keys(
        &self,
        action: EntityAction,
        resource: &AccessResource,
    ) -> Result<Vec<PermissionKey>, DenyReason> {
        match resource {
            AccessResource::Resource(token) => PermissionKey::compose(action, token)
                .map(|key| vec![key])
                .map_err(|_| DenyReason::NoMatchingPermission),
            AccessResource::VirtualEntity(token) => {
                let definition = EntityName::new(token.as_str())
                    .ok()
                    .and_then(|name| self.entities.get(&name));
                let Some(definition) = definition else {
                    return Err(DenyReason::UnknownEntity(token.clone()));
                };
                let Some(mapped) = definition.permission_key(action) else {
                    return Err(DenyReason::UnmappedAction {
                        entity: token.clone(),
                        action,
                    });
                };

                let mut keys = vec![definition.direct_permission_key(action)];
                if !keys.contains(mapped) {
                    keys.push(mapped.clone());
                }
                let legacy = definition.legacy_permission_key(action);
                if !keys.contains(&legacy) {
                    keys.push(legacy);
                }

                Ok(keys)
            }
        }
    }

    async fn record_evaluation(
        &self,
        context: &RequestContext,
        action: EntityAction,
        resource: &AccessResource,
        decision: &PermissionDecision,
    ) {
        let outcome = if decision.is_allowed() { "allow" } else { "deny" };
        let event = AccessAuditEvent {
            tenant_id: context.tenant_id(),
            actor_id: context.person_id(),
            action: AuditAction::AccessEvaluated,
            operation: action.as_str().to_owned(),
            resource: resource.token().to_owned(),
            decision: outcome.to_owned(),
            reason: decision.deny_reason().map(ToString::to_string),
            occurred_at: Utc::now(),
        };

        if let Err(error) = self.audit_sink.record(event).await {
            warn!(error = %error, "audit sink rejected an access evaluation event");
        }
    }
}
