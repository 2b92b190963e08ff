//! Unit of work
//!
//! The transaction-scoped change tracker. Application code stages ordinary
//! entity mutations against a [`UnitOfWork`]; at commit time the pending
//! change sets are handed to the registered pre-commit hooks (the audit
//! interceptor is registered on every unit of work by construction), the
//! business SQL and the staged audit records are executed inside one
//! database transaction, and the whole lot commits or rolls back together.

pub mod entity;
pub mod flush;
pub mod registry;

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::audit::interceptor::{self, AuditError};
use crate::audit::models::NewAuditRecord;
use crate::audit::{actor, snapshot};
use entity::{EntityError, EntityState};
use flush::{CommitSummary, FlushError, FlushPlan, PlannedColumn, PlannedOp};
use irm_common::value::{AttrMap, AttrValue};
use registry::{EntityDescriptor, EntityRegistry};

/// Read-only view of a unit of work's pending change classes, handed to
/// pre-commit hooks.
#[derive(Debug, Clone, Copy)]
pub struct ChangeSet<'a> {
    /// Newly created entities, in staging order
    pub new: &'a [EntityState],
    /// Entities with modified attributes, in staging order
    pub dirty: &'a [EntityState],
    /// Entities marked for deletion, in staging order
    pub deleted: &'a [EntityState],
    /// The resolved acting principal
    pub actor: Option<&'a str>,
}

/// A pre-commit callback: a pure function of the pending change sets that
/// returns audit records to stage into the same transaction.
pub type PreCommitHook =
    Box<dyn Fn(&ChangeSet<'_>) -> Result<Vec<NewAuditRecord>, AuditError> + Send + Sync>;

/// Errors raised by unit-of-work operations
#[derive(Error, Debug)]
pub enum UowError {
    #[error("no entity descriptor registered for table '{0}'")]
    UnknownEntity(String),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One transaction's worth of tracked entity mutations.
pub struct UnitOfWork {
    registry: Arc<EntityRegistry>,
    new: Vec<EntityState>,
    dirty: Vec<EntityState>,
    deleted: Vec<EntityState>,
    actor: Option<String>,
    hooks: Vec<PreCommitHook>,
}

impl UnitOfWork {
    /// A fresh unit of work. The audit interceptor is always registered;
    /// nothing a call site does (or forgets) can disable change capture.
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            new: Vec::new(),
            dirty: Vec::new(),
            deleted: Vec::new(),
            actor: None,
            hooks: vec![interceptor::pre_commit_hook()],
        }
    }

    /// Explicitly attribute this unit of work to an actor, overriding the
    /// ambient task-local context. Used by system/batch operations that run
    /// outside any request scope.
    pub fn set_actor(&mut self, actor: impl Into<String>) {
        self.actor = Some(actor.into());
    }

    /// Register an additional pre-commit hook.
    pub fn on_pre_commit(&mut self, hook: PreCommitHook) {
        self.hooks.push(hook);
    }

    /// Descriptor lookup for the registry backing this unit of work.
    pub fn descriptor(&self, table: &str) -> Result<Arc<EntityDescriptor>, UowError> {
        self.registry
            .get(table)
            .ok_or_else(|| UowError::UnknownEntity(table.to_string()))
    }

    /// Stage a new entity built from the given attribute values.
    pub fn create(&mut self, table: &str, values: AttrMap) -> Result<(), UowError> {
        let descriptor = self.descriptor(table)?;
        self.new.push(EntityState::new(descriptor, values)?);
        Ok(())
    }

    /// Stage a new entity instance.
    pub fn stage_create(&mut self, entity: EntityState) {
        self.new.push(entity);
    }

    /// Stage a loaded-and-modified entity instance. Entities with no net
    /// change are tolerated here; they are filtered out at plan time.
    pub fn stage_update(&mut self, entity: EntityState) {
        self.dirty.push(entity);
    }

    /// Mark a loaded entity instance for deletion.
    pub fn stage_delete(&mut self, entity: EntityState) {
        self.deleted.push(entity);
    }

    /// Whether anything is staged.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.dirty.is_empty() && self.deleted.is_empty()
    }

    /// Resolve the acting principal: the explicit override wins over the
    /// ambient task-local context; neither present means a system-attributed
    /// change (actor stays null).
    fn resolve_actor(&self) -> Option<String> {
        self.actor.clone().or_else(actor::current)
    }

    /// Compute the full flush plan for the pending changes: business SQL
    /// operations plus the audit records returned by the pre-commit hooks.
    /// Pure; does not touch the database.
    pub fn build_plan(&self) -> Result<FlushPlan, UowError> {
        let actor = self.resolve_actor();
        let changes = ChangeSet {
            new: &self.new,
            dirty: &self.dirty,
            deleted: &self.deleted,
            actor: actor.as_deref(),
        };

        let mut audit = Vec::new();
        for hook in &self.hooks {
            audit.extend(hook(&changes)?);
        }

        let mut ops = Vec::new();
        for entity in &self.new {
            ops.push(plan_insert(entity));
        }
        for entity in &self.dirty {
            if let Some(op) = plan_update(entity)? {
                ops.push(op);
            }
        }
        for entity in &self.deleted {
            ops.push(plan_delete(entity)?);
        }

        Ok(FlushPlan { ops, audit })
    }

    /// Commit the unit of work: one transaction containing every staged
    /// business change and every audit record describing it. Any failure
    /// while planning or executing rolls the whole transaction back.
    #[tracing::instrument(skip(self, pool), fields(actor = ?self.resolve_actor()))]
    pub async fn commit(self, pool: &sqlx::PgPool) -> Result<CommitSummary, UowError> {
        let plan = self.build_plan()?;
        if plan.is_empty() {
            return Ok(CommitSummary::default());
        }

        let mut tx = pool.begin().await?;
        let summary = plan.execute(&mut tx).await?;
        tx.commit().await?;

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            audited = summary.audited,
            "Unit of work committed"
        );

        Ok(summary)
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("new", &self.new.len())
            .field("dirty", &self.dirty.len())
            .field("deleted", &self.deleted.len())
            .field("actor", &self.actor)
            .finish()
    }
}

fn planned_columns<'a>(
    entity: &'a EntityState,
    names: impl Iterator<Item = &'a str>,
) -> Vec<PlannedColumn> {
    let descriptor = entity.descriptor();
    names
        .filter_map(|name| {
            let kind = descriptor.attr_kind(name)?;
            Some(PlannedColumn {
                name: name.to_string(),
                kind,
                value: entity.get(name).cloned().unwrap_or(AttrValue::Null),
            })
        })
        .collect()
}

fn key_columns(entity: &EntityState) -> Result<Vec<PlannedColumn>, UowError> {
    let descriptor = entity.descriptor();
    let columns = planned_columns(entity, descriptor.primary_key().iter().map(String::as_str));
    for column in &columns {
        if column.value.is_null() {
            return Err(UowError::Flush(FlushError::UnresolvedPrimaryKey {
                table: descriptor.table().to_string(),
                attr: column.name.clone(),
            }));
        }
    }
    Ok(columns)
}

fn plan_insert(entity: &EntityState) -> PlannedOp {
    // Null-valued attributes are omitted so column defaults (autoincrement
    // keys, server-side timestamps) apply.
    let descriptor = entity.descriptor();
    let columns = planned_columns(
        entity,
        descriptor
            .attrs()
            .iter()
            .map(|a| a.name.as_str())
            .filter(|name| entity.get(name).is_some_and(|v| !v.is_null())),
    );
    PlannedOp::Insert {
        table: descriptor.table().to_string(),
        columns,
    }
}

fn plan_update(entity: &EntityState) -> Result<Option<PlannedOp>, UowError> {
    let diff = snapshot::diff(entity);
    if diff.is_empty() {
        return Ok(None);
    }
    let columns = planned_columns(entity, diff.after.keys().map(String::as_str));
    let key = key_columns(entity)?;
    Ok(Some(PlannedOp::Update {
        table: entity.table().to_string(),
        columns,
        key,
    }))
}

fn plan_delete(entity: &EntityState) -> Result<PlannedOp, UowError> {
    Ok(PlannedOp::Delete {
        table: entity.table().to_string(),
        key: key_columns(entity)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::AuditOperation;
    use irm_common::value::AttrKind;

    fn registry() -> Arc<EntityRegistry> {
        let mut registry = EntityRegistry::new();
        registry
            .register(
                EntityDescriptor::builder("widget")
                    .attr("widget_id", AttrKind::Integer)
                    .attr("name", AttrKind::Text)
                    .attr("price", AttrKind::Decimal)
                    .primary_key("widget_id")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_create_stages_insert_and_audit_record() {
        let mut uow = UnitOfWork::new(registry());
        uow.set_actor("alice");
        uow.create("widget", attrs(&[("name", "A".into())])).unwrap();

        let plan = uow.build_plan().unwrap();
        assert_eq!(plan.ops.len(), 1);
        assert!(matches!(&plan.ops[0], PlannedOp::Insert { table, columns }
            if table == "widget" && columns.len() == 1));
        assert_eq!(plan.audit.len(), 1);
        assert_eq!(plan.audit[0].operation, AuditOperation::Create);
        assert_eq!(plan.audit[0].actor.as_deref(), Some("alice"));
    }

    #[test]
    fn test_unknown_table_is_rejected() {
        let mut uow = UnitOfWork::new(registry());
        let err = uow.create("gadget", AttrMap::new()).unwrap_err();
        assert!(matches!(err, UowError::UnknownEntity(_)));
    }

    #[test]
    fn test_clean_dirty_entity_produces_nothing() {
        let mut uow = UnitOfWork::new(registry());
        let entity = EntityState::loaded(
            uow.descriptor("widget").unwrap(),
            attrs(&[("widget_id", 1i64.into()), ("name", "A".into())]),
        )
        .unwrap();
        uow.stage_update(entity);

        let plan = uow.build_plan().unwrap();
        assert!(plan.ops.is_empty());
        assert!(plan.audit.is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_update_without_key_fails() {
        let mut uow = UnitOfWork::new(registry());
        let mut entity =
            EntityState::loaded(uow.descriptor("widget").unwrap(), attrs(&[("name", "A".into())]))
                .unwrap();
        entity.set("name", "B").unwrap();
        uow.stage_update(entity);

        let err = uow.build_plan().unwrap_err();
        assert!(matches!(
            err,
            UowError::Flush(FlushError::UnresolvedPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_update_plans_changed_columns_with_key() {
        let mut uow = UnitOfWork::new(registry());
        let mut entity = EntityState::loaded(
            uow.descriptor("widget").unwrap(),
            attrs(&[("widget_id", 7i64.into()), ("name", "A".into())]),
        )
        .unwrap();
        entity.set("name", "B").unwrap();
        uow.stage_update(entity);

        let plan = uow.build_plan().unwrap();
        match &plan.ops[0] {
            PlannedOp::Update {
                table,
                columns,
                key,
            } => {
                assert_eq!(table, "widget");
                assert_eq!(columns.len(), 1);
                assert_eq!(columns[0].name, "name");
                assert_eq!(key.len(), 1);
                assert_eq!(key[0].value, AttrValue::Int(7));
            },
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(plan.audit.len(), 1);
        assert_eq!(plan.audit[0].operation, AuditOperation::Update);
    }

    #[test]
    fn test_delete_plans_key_only() {
        let mut uow = UnitOfWork::new(registry());
        let entity = EntityState::loaded(
            uow.descriptor("widget").unwrap(),
            attrs(&[("widget_id", 7i64.into()), ("name", "A".into())]),
        )
        .unwrap();
        uow.stage_delete(entity);

        let plan = uow.build_plan().unwrap();
        assert!(matches!(&plan.ops[0], PlannedOp::Delete { table, key }
            if table == "widget" && key.len() == 1));
        assert_eq!(plan.audit[0].operation, AuditOperation::Delete);
    }

    #[test]
    fn test_empty_unit_of_work_plans_nothing() {
        let uow = UnitOfWork::new(registry());
        assert!(uow.is_empty());
        let plan = uow.build_plan().unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_actor_overrides_ambient_context() {
        crate::audit::actor::scope(Some("ambient-user".to_string()), async {
            let mut uow = UnitOfWork::new(registry());
            uow.create("widget", AttrMap::new()).unwrap();

            // Ambient context applies when no override is set
            let plan = uow.build_plan().unwrap();
            assert_eq!(plan.audit[0].actor.as_deref(), Some("ambient-user"));

            // The explicit override wins
            uow.set_actor("batch-job");
            let plan = uow.build_plan().unwrap();
            assert_eq!(plan.audit[0].actor.as_deref(), Some("batch-job"));
        })
        .await;
    }

    #[test]
    fn test_additional_hooks_compose() {
        let mut uow = UnitOfWork::new(registry());
        uow.create("widget", AttrMap::new()).unwrap();
        uow.on_pre_commit(Box::new(|changes| {
            assert_eq!(changes.new.len(), 1);
            Ok(Vec::new())
        }));

        let plan = uow.build_plan().unwrap();
        // The built-in audit hook still fires
        assert_eq!(plan.audit.len(), 1);
    }
}
