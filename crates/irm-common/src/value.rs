//! Attribute value model for the change tracker
//!
//! Entity attributes flow through the unit of work and the audit engine as
//! instances of [`AttrValue`], a closed tagged variant. Keeping the variant
//! closed means every value the tracker can hold has a well-defined JSON-safe
//! representation, and anything outside it is rejected at staging time rather
//! than at commit time.
//!
//! Relationship- and collection-valued attributes are deliberately not part
//! of this model; foreign keys are carried as their raw scalar value.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Attribute map keyed by attribute name.
///
/// `BTreeMap` keeps iteration deterministic, so snapshots and diffs serialize
/// in a stable attribute order.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Declared kind of a mapped scalar attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Bool,
    /// 64-bit integer. Also used for integer foreign keys.
    Integer,
    Float,
    /// Fixed-point numeric, e.g. monetary amounts.
    Decimal,
    Text,
    /// Timestamp with timezone.
    Timestamp,
    /// Calendar date without time of day.
    Date,
    /// Free-form JSON column (nested maps/lists).
    Json,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for AttrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Decimal(BigDecimal),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    List(Vec<AttrValue>),
    Map(AttrMap),
}

impl AttrValue {
    /// Whether this value is acceptable for an attribute declared with the
    /// given kind. `Null` is acceptable for every kind; nested lists and maps
    /// only fit `Json` columns.
    pub fn matches(&self, kind: AttrKind) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(_) => kind == AttrKind::Bool,
            Self::Int(_) => kind == AttrKind::Integer,
            Self::Float(_) => kind == AttrKind::Float,
            Self::Text(_) => kind == AttrKind::Text,
            Self::Decimal(_) => kind == AttrKind::Decimal,
            Self::Timestamp(_) => kind == AttrKind::Timestamp,
            Self::Date(_) => kind == AttrKind::Date,
            Self::List(_) | Self::Map(_) => kind == AttrKind::Json,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Variant name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Decimal(_) => "decimal",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// The integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<BigDecimal> for AttrValue {
    fn from(v: BigDecimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<NaiveDate> for AttrValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl<T> From<Option<T>> for AttrValue
where
    T: Into<AttrValue>,
{
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}
