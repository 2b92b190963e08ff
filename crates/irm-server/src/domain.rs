//! Entity descriptors for the audited business schema.
//!
//! The registry is populated once at startup. Every table whose changes must
//! be captured is declared here with its attribute kinds and primary key;
//! the audit log itself is registered unaudited so writing an audit record
//! can never trigger another one.

use irm_common::value::AttrKind;

use crate::audit::models::AUDIT_TABLE;
use crate::uow::registry::{EntityDescriptor, EntityRegistry, RegistryError};

/// Build the descriptor registry for the full business schema.
pub fn build_registry() -> Result<EntityRegistry, RegistryError> {
    let mut registry = EntityRegistry::new();

    registry.register(
        EntityDescriptor::builder("catalog")
            .attr("catalog_id", AttrKind::Integer)
            .attr("catalog_key", AttrKind::Text)
            .attr("name", AttrKind::Text)
            .attr("description", AttrKind::Text)
            .attr("is_hierarchical", AttrKind::Bool)
            .attr("created_at", AttrKind::Timestamp)
            .attr("updated_at", AttrKind::Timestamp)
            .primary_key("catalog_id")
            .build()?,
    )?;

    registry.register(
        EntityDescriptor::builder("catalog_item")
            .attr("item_id", AttrKind::Integer)
            .attr("catalog_id", AttrKind::Integer)
            .attr("company_id", AttrKind::Integer)
            .attr("code", AttrKind::Text)
            .attr("name", AttrKind::Text)
            .attr("description", AttrKind::Text)
            .attr("sort_order", AttrKind::Integer)
            .attr("active", AttrKind::Bool)
            .attr("parent_item_id", AttrKind::Integer)
            .attr("created_at", AttrKind::Timestamp)
            .attr("updated_at", AttrKind::Timestamp)
            .attr("deleted_at", AttrKind::Timestamp)
            .primary_key("item_id")
            .build()?,
    )?;

    registry.register(
        EntityDescriptor::builder("asset")
            .attr("asset_id", AttrKind::Integer)
            .attr("company_id", AttrKind::Integer)
            .attr("name", AttrKind::Text)
            .attr("brand", AttrKind::Text)
            .attr("model", AttrKind::Text)
            .attr("serial_number", AttrKind::Text)
            .attr("description", AttrKind::Text)
            .attr("location", AttrKind::Text)
            .attr("type_item_id", AttrKind::Integer)
            .attr("status_item_id", AttrKind::Integer)
            .attr("classification_item_id", AttrKind::Integer)
            .attr("area_item_id", AttrKind::Integer)
            .attr("acquired_on", AttrKind::Date)
            .attr("value", AttrKind::Decimal)
            .attr("created_at", AttrKind::Timestamp)
            .attr("updated_at", AttrKind::Timestamp)
            .attr("deleted_at", AttrKind::Timestamp)
            .primary_key("asset_id")
            .build()?,
    )?;

    registry.register(
        EntityDescriptor::builder("risk")
            .attr("risk_id", AttrKind::Integer)
            .attr("company_id", AttrKind::Integer)
            .attr("risk_type", AttrKind::Text)
            .attr("name", AttrKind::Text)
            .attr("description", AttrKind::Text)
            .attr("owner_id", AttrKind::Integer)
            .attr("likelihood_item_id", AttrKind::Integer)
            .attr("impact_item_id", AttrKind::Integer)
            .attr("level_item_id", AttrKind::Integer)
            .attr("score", AttrKind::Integer)
            .attr("created_at", AttrKind::Timestamp)
            .attr("updated_at", AttrKind::Timestamp)
            .attr("deleted_at", AttrKind::Timestamp)
            .primary_key("risk_id")
            .build()?,
    )?;

    registry.register(
        EntityDescriptor::builder("treatment")
            .attr("treatment_id", AttrKind::Integer)
            .attr("risk_id", AttrKind::Integer)
            .attr("company_id", AttrKind::Integer)
            .attr("strategy_item_id", AttrKind::Integer)
            .attr("status_item_id", AttrKind::Integer)
            .attr("responsible_id", AttrKind::Integer)
            .attr("description", AttrKind::Text)
            .attr("due_date", AttrKind::Date)
            .attr("created_at", AttrKind::Timestamp)
            .attr("updated_at", AttrKind::Timestamp)
            .primary_key("treatment_id")
            .build()?,
    )?;

    registry.register(
        EntityDescriptor::builder("document")
            .attr("document_id", AttrKind::Integer)
            .attr("company_id", AttrKind::Integer)
            .attr("title", AttrKind::Text)
            .attr("category_item_id", AttrKind::Integer)
            .attr("storage_path", AttrKind::Text)
            .attr("version", AttrKind::Integer)
            .attr("uploaded_by", AttrKind::Text)
            .attr("created_at", AttrKind::Timestamp)
            .attr("updated_at", AttrKind::Timestamp)
            .primary_key("document_id")
            .build()?,
    )?;

    // The audit trail is append-only and never audits itself.
    registry.register(
        EntityDescriptor::builder(AUDIT_TABLE)
            .attr("id", AttrKind::Integer)
            .attr("created_at", AttrKind::Timestamp)
            .attr("table_name", AttrKind::Text)
            .attr("operation", AttrKind::Text)
            .attr("target_pk_id", AttrKind::Integer)
            .attr("target_pk", AttrKind::Json)
            .attr("actor", AttrKind::Text)
            .attr("before", AttrKind::Json)
            .attr("after", AttrKind::Json)
            .primary_key("id")
            .unaudited()
            .build()?,
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds() {
        let registry = build_registry().unwrap();
        assert_eq!(registry.len(), 7);
        assert!(registry.get("asset").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_audit_log_is_unaudited() {
        let registry = build_registry().unwrap();
        let descriptor = registry.get(AUDIT_TABLE).unwrap();
        assert!(!descriptor.is_audited());
        for other in ["catalog", "catalog_item", "asset", "risk", "treatment", "document"] {
            assert!(registry.get(other).unwrap().is_audited(), "{other}");
        }
    }

    #[test]
    fn test_asset_value_is_decimal() {
        let registry = build_registry().unwrap();
        let asset = registry.get("asset").unwrap();
        assert_eq!(asset.attr_kind("value"), Some(AttrKind::Decimal));
        assert_eq!(asset.attr_kind("acquired_on"), Some(AttrKind::Date));
        assert_eq!(asset.primary_key(), ["asset_id"]);
    }
}
