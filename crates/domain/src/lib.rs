//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod assignment;
mod audit;
mod decision;
mod permission;
mod projection;
mod role;

pub use assignment::{GrantedPermission, RoleAssignment};
pub use audit::AuditAction;
pub use decision::{DenyReason, PermissionDecision, SiteVisibility};
pub use permission::{EntityAction, FieldSet, PermissionKey, PermissionScope, SiteAccess};
pub use projection::{EntityName, VirtualEntityCatalog, VirtualEntityDefinition};
pub use role::{RoleCatalog, RoleDefinition, RoleId};
