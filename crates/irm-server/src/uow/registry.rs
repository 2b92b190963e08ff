//! Entity metadata registry
//!
//! The change tracker does not introspect anything at runtime. Every entity
//! type it can track is described once, at startup, by an
//! [`EntityDescriptor`]: the logical table name, the ordered set of mapped
//! scalar attributes, and the primary-key attribute names. The
//! [`EntityRegistry`] is the lookup table the snapshot/diff engine consults.
//!
//! Relationship- and collection-valued attributes are simply not declarable
//! here; a foreign key is declared as a plain `Integer` attribute and its raw
//! value is what gets tracked.

use irm_common::value::AttrKind;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or populating the registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("entity '{0}' declares no primary key")]
    MissingPrimaryKey(String),

    #[error("entity '{table}' declares primary key '{attr}' which is not a mapped attribute")]
    UnknownPrimaryKeyAttr { table: String, attr: String },

    #[error("entity '{table}' declares attribute '{attr}' more than once")]
    DuplicateAttr { table: String, attr: String },

    #[error("entity '{0}' is already registered")]
    DuplicateEntity(String),
}

/// One mapped scalar attribute of an entity type.
#[derive(Debug, Clone)]
pub struct AttrDescriptor {
    pub name: String,
    pub kind: AttrKind,
}

/// Static description of one trackable entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    table: String,
    attrs: Vec<AttrDescriptor>,
    primary_key: Vec<String>,
    audited: bool,
    index: HashMap<String, usize>,
}

impl EntityDescriptor {
    pub fn builder(table: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder {
            table: table.into(),
            attrs: Vec::new(),
            primary_key: Vec::new(),
            audited: true,
        }
    }

    /// Logical table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Mapped scalar attributes, in declaration order.
    pub fn attrs(&self) -> &[AttrDescriptor] {
        &self.attrs
    }

    /// Primary-key attribute names, in declaration order.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Whether changes to this entity type produce audit records. False only
    /// for the audit table itself, which must never audit its own inserts.
    pub fn is_audited(&self) -> bool {
        self.audited
    }

    /// Declared kind of an attribute, if it is mapped.
    pub fn attr_kind(&self, name: &str) -> Option<AttrKind> {
        self.index.get(name).map(|i| self.attrs[*i].kind)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// Builder for [`EntityDescriptor`]
pub struct EntityDescriptorBuilder {
    table: String,
    attrs: Vec<AttrDescriptor>,
    primary_key: Vec<String>,
    audited: bool,
}

impl EntityDescriptorBuilder {
    /// Declare a mapped scalar attribute.
    pub fn attr(mut self, name: impl Into<String>, kind: AttrKind) -> Self {
        self.attrs.push(AttrDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    /// Declare a primary-key attribute. Call multiple times for composite
    /// keys. The attribute must also be declared via [`Self::attr`].
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key.push(name.into());
        self
    }

    /// Exclude this entity type from audit interception.
    pub fn unaudited(mut self) -> Self {
        self.audited = false;
        self
    }

    pub fn build(self) -> Result<EntityDescriptor, RegistryError> {
        if self.primary_key.is_empty() {
            return Err(RegistryError::MissingPrimaryKey(self.table));
        }

        let mut index = HashMap::with_capacity(self.attrs.len());
        for (i, attr) in self.attrs.iter().enumerate() {
            if index.insert(attr.name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateAttr {
                    table: self.table,
                    attr: attr.name.clone(),
                });
            }
        }

        for pk in &self.primary_key {
            if !index.contains_key(pk) {
                return Err(RegistryError::UnknownPrimaryKeyAttr {
                    table: self.table,
                    attr: pk.clone(),
                });
            }
        }

        Ok(EntityDescriptor {
            table: self.table,
            attrs: self.attrs,
            primary_key: self.primary_key,
            audited: self.audited,
            index,
        })
    }
}

/// Lookup table of entity descriptors, populated once at startup.
#[derive(Debug, Default, Clone)]
pub struct EntityRegistry {
    by_table: HashMap<String, Arc<EntityDescriptor>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: EntityDescriptor) -> Result<(), RegistryError> {
        let table = descriptor.table().to_string();
        if self.by_table.contains_key(&table) {
            return Err(RegistryError::DuplicateEntity(table));
        }
        self.by_table.insert(table, Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, table: &str) -> Option<Arc<EntityDescriptor>> {
        self.by_table.get(table).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> EntityDescriptor {
        EntityDescriptor::builder("widget")
            .attr("widget_id", AttrKind::Integer)
            .attr("name", AttrKind::Text)
            .attr("price", AttrKind::Decimal)
            .primary_key("widget_id")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_produces_descriptor() {
        let d = widget();
        assert_eq!(d.table(), "widget");
        assert_eq!(d.primary_key(), &["widget_id".to_string()]);
        assert_eq!(d.attr_kind("price"), Some(AttrKind::Decimal));
        assert_eq!(d.attr_kind("missing"), None);
        assert!(d.is_audited());
    }

    #[test]
    fn test_builder_rejects_missing_pk() {
        let err = EntityDescriptor::builder("orphan")
            .attr("name", AttrKind::Text)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingPrimaryKey(_)));
    }

    #[test]
    fn test_builder_rejects_unmapped_pk() {
        let err = EntityDescriptor::builder("broken")
            .attr("name", AttrKind::Text)
            .primary_key("id")
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownPrimaryKeyAttr { .. }));
    }

    #[test]
    fn test_builder_rejects_duplicate_attr() {
        let err = EntityDescriptor::builder("dup")
            .attr("name", AttrKind::Text)
            .attr("name", AttrKind::Text)
            .primary_key("name")
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAttr { .. }));
    }

    #[test]
    fn test_composite_primary_key() {
        let d = EntityDescriptor::builder("role_assignment")
            .attr("user_id", AttrKind::Integer)
            .attr("role_id", AttrKind::Integer)
            .attr("granted_at", AttrKind::Timestamp)
            .primary_key("user_id")
            .primary_key("role_id")
            .build()
            .unwrap();
        assert_eq!(d.primary_key().len(), 2);
    }

    #[test]
    fn test_registry_lookup_and_duplicates() {
        let mut registry = EntityRegistry::new();
        registry.register(widget()).unwrap();

        assert!(registry.get("widget").is_some());
        assert!(registry.get("gadget").is_none());

        let err = registry.register(widget()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateEntity(_)));
    }

    #[test]
    fn test_unaudited_flag() {
        let d = EntityDescriptor::builder("audit_log")
            .attr("id", AttrKind::Integer)
            .primary_key("id")
            .unaudited()
            .build()
            .unwrap();
        assert!(!d.is_audited());
    }
}
