//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod directory_ports;
mod permission_service;
mod projection_service;
mod role_admin_service;

pub use audit_ports::{AccessAuditEvent, AuditSink};
pub use directory_ports::{
    DirectoryRepository, PersonSummary, RoleAdminRepository, UpsertAssignmentInput,
};
pub use permission_service::{AccessResource, AccessTarget, PermissionService, ResolutionPolicy};
pub use projection_service::ProjectionService;
pub use role_admin_service::{AssignRoleInput, RoleAdminService};
