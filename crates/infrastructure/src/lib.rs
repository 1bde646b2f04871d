//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_sink;
mod in_memory_directory_repository;
mod tracing_audit_sink;

pub use in_memory_audit_sink::InMemoryAuditSink;
pub use in_memory_directory_repository::{InMemoryDirectoryRepository, PersonRecord};
pub use tracing_audit_sink::TracingAuditSink;
