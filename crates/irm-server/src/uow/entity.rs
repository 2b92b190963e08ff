//! Tracked entity instances
//!
//! An [`EntityState`] is one entity instance inside a unit of work: its
//! descriptor, its current attribute values, and (for instances loaded from
//! the database) the snapshot taken at load time. The load-time snapshot is
//! what gives dirty entities their per-attribute old/new history.

use super::registry::EntityDescriptor;
use irm_common::value::{AttrMap, AttrValue};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while staging attribute values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("'{table}' has no mapped attribute '{attr}'")]
    UnknownAttr { table: String, attr: String },

    #[error("attribute '{attr}' of '{table}' expects {expected}, got {actual}")]
    KindMismatch {
        table: String,
        attr: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Old/new value pair for one changed attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrHistory {
    pub old: AttrValue,
    pub new: AttrValue,
}

/// One entity instance tracked by a unit of work.
#[derive(Debug, Clone)]
pub struct EntityState {
    descriptor: Arc<EntityDescriptor>,
    values: AttrMap,
    loaded: Option<AttrMap>,
}

impl EntityState {
    /// A brand-new instance that does not exist in the database yet.
    /// Unassigned attributes (e.g. an autoincrement key) read as null.
    pub fn new(descriptor: Arc<EntityDescriptor>, values: AttrMap) -> Result<Self, EntityError> {
        let values = Self::validated(&descriptor, values)?;
        Ok(Self {
            descriptor,
            values,
            loaded: None,
        })
    }

    /// An instance loaded from the database. The given values become both the
    /// current state and the pre-flush snapshot that diffs compare against.
    pub fn loaded(descriptor: Arc<EntityDescriptor>, values: AttrMap) -> Result<Self, EntityError> {
        let values = Self::validated(&descriptor, values)?;
        Ok(Self {
            descriptor,
            loaded: Some(values.clone()),
            values,
        })
    }

    fn validated(descriptor: &EntityDescriptor, values: AttrMap) -> Result<AttrMap, EntityError> {
        for (name, value) in &values {
            check_attr(descriptor, name, value)?;
        }

        // Fill unassigned attributes with null so snapshots always cover the
        // full declared attribute set.
        let mut full = values;
        for attr in descriptor.attrs() {
            full.entry(attr.name.clone()).or_insert(AttrValue::Null);
        }
        Ok(full)
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn table(&self) -> &str {
        self.descriptor.table()
    }

    /// Current value of a mapped attribute. Unassigned attributes are null.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    /// Assign an attribute, validating it against the declared kind.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Result<(), EntityError> {
        let name = name.into();
        let value = value.into();
        check_attr(&self.descriptor, &name, &value)?;
        self.values.insert(name, value);
        Ok(())
    }

    /// All current attribute values.
    pub fn values(&self) -> &AttrMap {
        &self.values
    }

    /// The load-time snapshot, if this instance was loaded from the database.
    pub fn loaded_values(&self) -> Option<&AttrMap> {
        self.loaded.as_ref()
    }

    /// History for one attribute: present only when the current value differs
    /// from the load-time value. New instances have no history.
    pub fn history(&self, name: &str) -> Option<AttrHistory> {
        let loaded = self.loaded.as_ref()?;
        let old = loaded.get(name)?;
        let new = self.values.get(name)?;
        if old == new {
            return None;
        }
        Some(AttrHistory {
            old: old.clone(),
            new: new.clone(),
        })
    }

    /// Whether any attribute differs from the load-time snapshot.
    pub fn is_dirty(&self) -> bool {
        match &self.loaded {
            Some(loaded) => self
                .values
                .iter()
                .any(|(name, value)| loaded.get(name) != Some(value)),
            None => false,
        }
    }
}

fn check_attr(
    descriptor: &EntityDescriptor,
    name: &str,
    value: &AttrValue,
) -> Result<(), EntityError> {
    let kind = descriptor
        .attr_kind(name)
        .ok_or_else(|| EntityError::UnknownAttr {
            table: descriptor.table().to_string(),
            attr: name.to_string(),
        })?;

    if !value.matches(kind) {
        return Err(EntityError::KindMismatch {
            table: descriptor.table().to_string(),
            attr: name.to_string(),
            expected: kind.as_str(),
            actual: value.kind_name(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use irm_common::value::AttrKind;

    fn widget() -> Arc<EntityDescriptor> {
        Arc::new(
            EntityDescriptor::builder("widget")
                .attr("widget_id", AttrKind::Integer)
                .attr("name", AttrKind::Text)
                .attr("price", AttrKind::Decimal)
                .primary_key("widget_id")
                .build()
                .unwrap(),
        )
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_new_fills_unassigned_with_null() {
        let state = EntityState::new(widget(), attrs(&[("name", "A".into())])).unwrap();
        assert_eq!(state.get("name"), Some(&AttrValue::Text("A".into())));
        assert_eq!(state.get("widget_id"), Some(&AttrValue::Null));
        assert_eq!(state.get("price"), Some(&AttrValue::Null));
    }

    #[test]
    fn test_rejects_unknown_attr() {
        let err = EntityState::new(widget(), attrs(&[("color", "red".into())])).unwrap_err();
        assert!(matches!(err, EntityError::UnknownAttr { .. }));
    }

    #[test]
    fn test_rejects_kind_mismatch() {
        let err = EntityState::new(widget(), attrs(&[("price", "cheap".into())])).unwrap_err();
        assert!(matches!(err, EntityError::KindMismatch { .. }));

        let mut state = EntityState::new(widget(), AttrMap::new()).unwrap();
        assert!(state.set("name", AttrValue::Int(3)).is_err());
    }

    #[test]
    fn test_null_fits_any_kind() {
        let mut state = EntityState::new(widget(), AttrMap::new()).unwrap();
        assert!(state.set("price", AttrValue::Null).is_ok());
    }

    #[test]
    fn test_loaded_instance_tracks_history() {
        let mut state = EntityState::loaded(
            widget(),
            attrs(&[("widget_id", 1i64.into()), ("name", "A".into())]),
        )
        .unwrap();

        assert!(!state.is_dirty());
        assert!(state.history("name").is_none());

        state.set("name", "B").unwrap();
        assert!(state.is_dirty());
        let hist = state.history("name").unwrap();
        assert_eq!(hist.old, AttrValue::Text("A".into()));
        assert_eq!(hist.new, AttrValue::Text("B".into()));

        // Untouched attribute has no history
        assert!(state.history("widget_id").is_none());
    }

    #[test]
    fn test_set_to_same_value_is_not_a_change() {
        let mut state =
            EntityState::loaded(widget(), attrs(&[("widget_id", 1i64.into()), ("name", "A".into())]))
                .unwrap();

        state.set("name", "A").unwrap();
        assert!(!state.is_dirty());
        assert!(state.history("name").is_none());
    }

    #[test]
    fn test_new_instance_has_no_history() {
        let mut state = EntityState::new(widget(), AttrMap::new()).unwrap();
        state.set("name", "A").unwrap();
        assert!(state.history("name").is_none());
        assert!(!state.is_dirty());
    }
}
