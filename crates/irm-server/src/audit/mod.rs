//! Change-capture and audit-trail engine
//!
//! Observes every create/update/delete staged in a unit of work, computes
//! minimal before/after diffs, attributes each change to the acting
//! principal, and persists one immutable audit record per change atomically
//! with the business mutation. Call sites never log anything themselves: the
//! interceptor is registered on every unit of work by construction, and the
//! actor travels in task-local context from the request boundary.
//!
//! Module map:
//!
//! - [`actor`]: task-local actor context and its scope guard
//! - [`middleware`]: tower layer installing the actor per request
//! - [`snapshot`]: primary-key projection, full snapshots, minimal diffs
//! - [`interceptor`]: the pre-commit hook walking the pending change sets
//! - [`models`]: audit record types and query parameters
//! - [`queries`]: append-only store access and the read side

pub mod actor;
pub mod interceptor;
pub mod middleware;
pub mod models;
pub mod queries;
pub mod snapshot;

pub use interceptor::{collect_audit_records, pre_commit_hook, AuditError};
pub use middleware::{ActorLayer, Principal};
pub use models::{AuditOperation, AuditQuery, AuditRecord, NewAuditRecord, AUDIT_TABLE};
