//! Snapshot and diff engine
//!
//! Turns a tracked entity instance into the raw material for an audit record:
//! the primary-key projection, the full attribute snapshot, and the minimal
//! before/after diff. Everything here works off the declared attribute set of
//! the entity's descriptor; nothing is introspected at runtime.

use crate::uow::entity::EntityState;
use irm_common::value::AttrMap;

/// Primary-key projection of one entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    /// Key attribute name to value, covering composite keys.
    pub attrs: AttrMap,
    /// Scalar shortcut, present only when the key is a single integer column
    /// with an assigned integer value.
    pub shortcut: Option<i64>,
}

/// Minimal before/after diff of a dirty entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrDiff {
    pub before: AttrMap,
    pub after: AttrMap,
}

impl AttrDiff {
    /// Both maps empty: nothing actually changed, nothing to log.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// Read the entity's declared primary-key attributes by name.
///
/// Attributes without an assigned value (an autoincrement key before flush)
/// project as null. Composite and non-integer keys yield no shortcut.
pub fn project_primary_key(entity: &EntityState) -> PrimaryKey {
    let descriptor = entity.descriptor();
    let mut attrs = AttrMap::new();
    for name in descriptor.primary_key() {
        let value = entity
            .get(name)
            .cloned()
            .unwrap_or(irm_common::value::AttrValue::Null);
        attrs.insert(name.clone(), value);
    }

    let shortcut = match descriptor.primary_key() {
        [single] => attrs.get(single).and_then(|v| v.as_int()),
        _ => None,
    };

    PrimaryKey { attrs, shortcut }
}

/// Read every mapped scalar attribute into a plain map.
///
/// Used for CREATE (`after`) and DELETE (`before`).
pub fn full_snapshot(entity: &EntityState) -> AttrMap {
    entity.values().clone()
}

/// Compute the minimal attribute-level diff of a dirty entity.
///
/// Only attributes whose value actually changed since load appear, in both
/// maps. An untouched entity (or one whose attributes were re-assigned their
/// current values) yields an empty diff, which callers must treat as
/// "nothing to log".
pub fn diff(entity: &EntityState) -> AttrDiff {
    let mut result = AttrDiff::default();
    for attr in entity.descriptor().attrs() {
        if let Some(history) = entity.history(&attr.name) {
            result.before.insert(attr.name.clone(), history.old);
            result.after.insert(attr.name.clone(), history.new);
        }
    }
    result
}
