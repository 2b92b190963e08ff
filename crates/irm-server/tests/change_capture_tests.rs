//! End-to-end change capture tests at the plan level
//!
//! These tests exercise the full interception path (actor context, unit of
//! work, audit interceptor) without a database: `build_plan` is pure, so the
//! audit records staged for a commit can be inspected directly.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde_json::json;

use irm_server::audit::actor;
use irm_server::audit::models::AuditOperation;
use irm_server::domain;
use irm_server::uow::entity::EntityState;
use irm_server::uow::registry::EntityRegistry;
use irm_server::UnitOfWork;
use irm_common::value::{AttrMap, AttrValue};

fn registry() -> Arc<EntityRegistry> {
    Arc::new(domain::build_registry().expect("registry builds"))
}

fn attrs(pairs: &[(&str, AttrValue)]) -> AttrMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn decimal(s: &str) -> AttrValue {
    AttrValue::from(BigDecimal::from_str(s).expect("valid decimal"))
}

/// The canonical lifecycle: alice creates an asset, bob revalues it, alice
/// retires it. Each step must yield exactly one audit record with the right
/// operation, actor, and payload shape.
#[tokio::test]
async fn test_asset_lifecycle_is_fully_attributed() {
    let registry = registry();

    // alice creates
    let create_audit = actor::scope(Some("alice".to_string()), async {
        let mut uow = UnitOfWork::new(registry.clone());
        uow.create(
            "asset",
            attrs(&[
                ("company_id", 1i64.into()),
                ("name", "Laptop".into()),
                ("value", decimal("1500.00")),
            ]),
        )
        .unwrap();
        uow.build_plan().unwrap().audit
    })
    .await;

    assert_eq!(create_audit.len(), 1);
    let record = &create_audit[0];
    assert_eq!(record.operation, AuditOperation::Create);
    assert_eq!(record.table_name, "asset");
    assert_eq!(record.actor.as_deref(), Some("alice"));
    // Autoincrement key is unassigned before the flush
    assert_eq!(record.target_pk_id, None);
    assert_eq!(record.target_pk, json!({ "asset_id": null }));
    assert!(record.before.is_none());
    let after = record.after.as_ref().unwrap();
    assert_eq!(after["name"], json!("Laptop"));
    assert_eq!(after["value"], json!("1500.00"));

    // bob updates the value; nothing else may appear in the diff
    let update_audit = actor::scope(Some("bob".to_string()), async {
        let descriptor = registry.get("asset").unwrap();
        let mut entity = EntityState::loaded(
            descriptor,
            attrs(&[
                ("asset_id", 42i64.into()),
                ("company_id", 1i64.into()),
                ("name", "Laptop".into()),
                ("value", decimal("1500.00")),
            ]),
        )
        .unwrap();
        entity.set("value", decimal("1750.50")).unwrap();

        let mut uow = UnitOfWork::new(registry.clone());
        uow.stage_update(entity);
        uow.build_plan().unwrap().audit
    })
    .await;

    assert_eq!(update_audit.len(), 1);
    let record = &update_audit[0];
    assert_eq!(record.operation, AuditOperation::Update);
    assert_eq!(record.actor.as_deref(), Some("bob"));
    assert_eq!(record.target_pk_id, Some(42));
    assert_eq!(record.before, Some(json!({ "value": "1500.00" })));
    assert_eq!(record.after, Some(json!({ "value": "1750.50" })));

    // alice deletes; the full prior state is preserved as `before`
    let delete_audit = actor::scope(Some("alice".to_string()), async {
        let descriptor = registry.get("asset").unwrap();
        let entity = EntityState::loaded(
            descriptor,
            attrs(&[
                ("asset_id", 42i64.into()),
                ("company_id", 1i64.into()),
                ("name", "Laptop".into()),
            ]),
        )
        .unwrap();

        let mut uow = UnitOfWork::new(registry.clone());
        uow.stage_delete(entity);
        uow.build_plan().unwrap().audit
    })
    .await;

    assert_eq!(delete_audit.len(), 1);
    let record = &delete_audit[0];
    assert_eq!(record.operation, AuditOperation::Delete);
    assert_eq!(record.actor.as_deref(), Some("alice"));
    assert_eq!(record.target_pk_id, Some(42));
    let before = record.before.as_ref().unwrap();
    assert_eq!(before["asset_id"], json!(42));
    assert_eq!(before["name"], json!("Laptop"));
    assert!(record.after.is_none());
}

/// A change committed outside any actor scope is attributed to nobody.
#[tokio::test]
async fn test_unattributed_change_has_null_actor() {
    let mut uow = UnitOfWork::new(registry());
    uow.create("risk", attrs(&[("company_id", 1i64.into()), ("name", "Outage".into())]))
        .unwrap();

    let plan = uow.build_plan().unwrap();
    assert_eq!(plan.audit.len(), 1);
    assert_eq!(plan.audit[0].actor, None);
}

/// Touching an attribute and writing the original value back must not
/// produce an audit record.
#[tokio::test]
async fn test_no_net_change_is_not_audited() {
    let registry = registry();
    let descriptor = registry.get("risk").unwrap();
    let mut entity = EntityState::loaded(
        descriptor,
        attrs(&[
            ("risk_id", 9i64.into()),
            ("company_id", 1i64.into()),
            ("name", "Outage".into()),
        ]),
    )
    .unwrap();
    entity.set("name", "Flood").unwrap();
    entity.set("name", "Outage").unwrap();

    let mut uow = UnitOfWork::new(registry.clone());
    uow.stage_update(entity);

    let plan = uow.build_plan().unwrap();
    assert!(plan.ops.is_empty());
    assert!(plan.audit.is_empty());
}

/// Concurrent commits on the same runtime must each see their own actor.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_units_of_work_keep_actors_apart() {
    let registry = registry();

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(actor::scope(
            Some(format!("user-{i}")),
            async move {
                tokio::task::yield_now().await;
                let mut uow = UnitOfWork::new(registry);
                uow.create("document", AttrMap::new()).unwrap();
                let plan = uow.build_plan().unwrap();
                (i, plan.audit[0].actor.clone())
            },
        )));
    }

    for handle in handles {
        let (i, seen) = handle.await.unwrap();
        assert_eq!(seen.as_deref(), Some(format!("user-{i}").as_str()));
    }
}
