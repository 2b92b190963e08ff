//! Change interceptor
//!
//! The orchestration point of the audit engine. It fires exactly once per
//! unit-of-work commit, synchronously, before anything is written: it walks
//! the three change classes in (new, dirty, deleted) order, drives the
//! snapshot/diff engine over each entity, serializes the results, and returns
//! the audit records to stage into the same pending transaction.
//!
//! The interceptor keeps no state between firings; each one is a pure
//! function of (actor, pending change sets). Errors are never caught here:
//! they propagate to the commit path and fail the whole transaction, so a
//! partial audit trail is impossible.

use thiserror::Error;
use tracing::{debug, trace};

use super::models::{AuditOperation, NewAuditRecord};
use super::snapshot;
use crate::uow::{ChangeSet, PreCommitHook};
use irm_common::jsonsafe::{self, JsonSafeError};
use irm_common::value::AttrMap;

/// Errors raised while computing audit records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("attribute value of '{table}' is not JSON-safe: {source}")]
    JsonSafe {
        table: String,
        #[source]
        source: JsonSafeError,
    },
}

/// The pre-commit hook every unit of work registers on construction.
pub fn pre_commit_hook() -> PreCommitHook {
    Box::new(collect_audit_records)
}

/// Compute the audit records for one pending commit.
///
/// Entities whose descriptor is excluded from auditing (the audit table
/// itself) are skipped, as are dirty entities with an empty attribute-level
/// diff: a no-op write must not produce audit noise.
pub fn collect_audit_records(changes: &ChangeSet<'_>) -> Result<Vec<NewAuditRecord>, AuditError> {
    let mut records = Vec::new();

    for entity in changes.new {
        if !entity.descriptor().is_audited() {
            trace!(table = entity.table(), "Skipping unaudited entity");
            continue;
        }
        let after = snapshot::full_snapshot(entity);
        records.push(build_record(
            entity.table(),
            AuditOperation::Create,
            entity,
            changes.actor,
            None,
            Some(&after),
        )?);
    }

    for entity in changes.dirty {
        if !entity.descriptor().is_audited() {
            trace!(table = entity.table(), "Skipping unaudited entity");
            continue;
        }
        let diff = snapshot::diff(entity);
        if diff.is_empty() {
            trace!(table = entity.table(), "No net change, skipping audit record");
            continue;
        }
        records.push(build_record(
            entity.table(),
            AuditOperation::Update,
            entity,
            changes.actor,
            Some(&diff.before),
            Some(&diff.after),
        )?);
    }

    for entity in changes.deleted {
        if !entity.descriptor().is_audited() {
            trace!(table = entity.table(), "Skipping unaudited entity");
            continue;
        }
        let before = snapshot::full_snapshot(entity);
        records.push(build_record(
            entity.table(),
            AuditOperation::Delete,
            entity,
            changes.actor,
            Some(&before),
            None,
        )?);
    }

    debug!(
        staged = records.len(),
        actor = ?changes.actor,
        "Audit records computed for pending commit"
    );

    Ok(records)
}

fn build_record(
    table: &str,
    operation: AuditOperation,
    entity: &crate::uow::entity::EntityState,
    actor: Option<&str>,
    before: Option<&AttrMap>,
    after: Option<&AttrMap>,
) -> Result<NewAuditRecord, AuditError> {
    let json_safe = |map: &AttrMap| {
        jsonsafe::map_to_json(map).map_err(|source| AuditError::JsonSafe {
            table: table.to_string(),
            source,
        })
    };

    let pk = snapshot::project_primary_key(entity);

    Ok(NewAuditRecord {
        table_name: table.to_string(),
        operation,
        target_pk_id: pk.shortcut,
        target_pk: json_safe(&pk.attrs)?,
        actor: actor.map(|a| a.to_string()),
        before: before.map(json_safe).transpose()?,
        after: after.map(json_safe).transpose()?,
    })
}
