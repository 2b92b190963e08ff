//! Flush planning and execution
//!
//! A [`FlushPlan`] is the fully-computed outcome of a unit-of-work commit:
//! the business SQL operations derived from the change sets plus the audit
//! records the interceptor staged for them. Planning is pure and fallible;
//! execution runs every operation inside one transaction supplied by the
//! commit path. SQL is generated from the entity descriptors, so the engine
//! works across all registered entity shapes without per-entity statements.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres};
use thiserror::Error;
use tracing::trace;

use crate::audit::models::NewAuditRecord;
use crate::audit::queries;
use irm_common::jsonsafe::{self, JsonSafeError};
use irm_common::value::{AttrKind, AttrValue};

/// Errors raised while planning or executing a flush
#[derive(Error, Debug)]
pub enum FlushError {
    #[error("cannot flush '{table}': primary key attribute '{attr}' has no value")]
    UnresolvedPrimaryKey { table: String, attr: String },

    #[error("column '{column}' of '{table}' expects {expected}, got {actual}")]
    BindMismatch {
        table: String,
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("value is not JSON-safe: {0}")]
    JsonSafe(#[from] JsonSafeError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One column participating in a planned operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedColumn {
    pub name: String,
    pub kind: AttrKind,
    pub value: AttrValue,
}

/// One business SQL operation derived from a staged entity.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedOp {
    Insert {
        table: String,
        columns: Vec<PlannedColumn>,
    },
    Update {
        table: String,
        columns: Vec<PlannedColumn>,
        key: Vec<PlannedColumn>,
    },
    Delete {
        table: String,
        key: Vec<PlannedColumn>,
    },
}

impl PlannedOp {
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            },
        }
    }
}

/// Counts reported after a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub audited: usize,
}

/// The complete staged outcome of one unit-of-work commit.
#[derive(Debug, Default)]
pub struct FlushPlan {
    pub ops: Vec<PlannedOp>,
    pub audit: Vec<NewAuditRecord>,
}

impl FlushPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.audit.is_empty()
    }

    /// Execute every planned operation and audit append on the given
    /// connection. The caller owns the transaction; any error here leaves it
    /// un-committed so the whole flush rolls back together.
    pub async fn execute(self, conn: &mut PgConnection) -> Result<CommitSummary, FlushError> {
        let mut summary = CommitSummary::default();

        for op in &self.ops {
            let sql = render_op(op);
            trace!(table = op.table(), sql = %sql, "Executing planned operation");

            let mut query = sqlx::query(&sql);
            for column in op_bind_columns(op) {
                query = bind_column(query, op.table(), column)?;
            }
            query.execute(&mut *conn).await?;

            match op {
                PlannedOp::Insert { .. } => summary.inserted += 1,
                PlannedOp::Update { .. } => summary.updated += 1,
                PlannedOp::Delete { .. } => summary.deleted += 1,
            }
        }

        for record in &self.audit {
            queries::append(&mut *conn, record).await?;
            summary.audited += 1;
        }

        Ok(summary)
    }
}

/// Render the SQL text for one planned operation. Placeholders are numbered
/// in the same order [`op_bind_columns`] yields values.
pub fn render_op(op: &PlannedOp) -> String {
    match op {
        PlannedOp::Insert { table, columns } => {
            if columns.is_empty() {
                return format!("INSERT INTO {} DEFAULT VALUES", table);
            }
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                names.join(", "),
                placeholders.join(", ")
            )
        },
        PlannedOp::Update {
            table,
            columns,
            key,
        } => {
            let mut bind_count = 0;
            let assignments: Vec<String> = columns
                .iter()
                .map(|c| {
                    bind_count += 1;
                    format!("{} = ${}", c.name, bind_count)
                })
                .collect();
            let conditions: Vec<String> = key
                .iter()
                .map(|c| {
                    bind_count += 1;
                    format!("{} = ${}", c.name, bind_count)
                })
                .collect();
            format!(
                "UPDATE {} SET {} WHERE {}",
                table,
                assignments.join(", "),
                conditions.join(" AND ")
            )
        },
        PlannedOp::Delete { table, key } => {
            let conditions: Vec<String> = key
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{} = ${}", c.name, i + 1))
                .collect();
            format!("DELETE FROM {} WHERE {}", table, conditions.join(" AND "))
        },
    }
}

/// Bind order for one operation: assignment columns first, key columns last.
fn op_bind_columns(op: &PlannedOp) -> impl Iterator<Item = &PlannedColumn> {
    let (columns, key): (&[PlannedColumn], &[PlannedColumn]) = match op {
        PlannedOp::Insert { columns, .. } => (columns, &[]),
        PlannedOp::Update { columns, key, .. } => (columns, key),
        PlannedOp::Delete { key, .. } => (&[], key),
    };
    columns.iter().chain(key.iter())
}

/// Bind one attribute value with the Postgres type its declared kind maps to.
/// Null values need the kind to produce a typed NULL.
fn bind_column<'q>(
    query: Query<'q, Postgres, PgArguments>,
    table: &str,
    column: &PlannedColumn,
) -> Result<Query<'q, Postgres, PgArguments>, FlushError> {
    let mismatch = || FlushError::BindMismatch {
        table: table.to_string(),
        column: column.name.clone(),
        expected: column.kind.as_str(),
        actual: column.value.kind_name(),
    };

    let query = match (column.kind, &column.value) {
        (AttrKind::Bool, AttrValue::Bool(v)) => query.bind(*v),
        (AttrKind::Bool, AttrValue::Null) => query.bind(None::<bool>),
        (AttrKind::Integer, AttrValue::Int(v)) => query.bind(*v),
        (AttrKind::Integer, AttrValue::Null) => query.bind(None::<i64>),
        (AttrKind::Float, AttrValue::Float(v)) => query.bind(*v),
        (AttrKind::Float, AttrValue::Null) => query.bind(None::<f64>),
        (AttrKind::Decimal, AttrValue::Decimal(v)) => query.bind(v.clone()),
        (AttrKind::Decimal, AttrValue::Null) => query.bind(None::<bigdecimal::BigDecimal>),
        (AttrKind::Text, AttrValue::Text(v)) => query.bind(v.clone()),
        (AttrKind::Text, AttrValue::Null) => query.bind(None::<String>),
        (AttrKind::Timestamp, AttrValue::Timestamp(v)) => query.bind(*v),
        (AttrKind::Timestamp, AttrValue::Null) => {
            query.bind(None::<chrono::DateTime<chrono::Utc>>)
        },
        (AttrKind::Date, AttrValue::Date(v)) => query.bind(*v),
        (AttrKind::Date, AttrValue::Null) => query.bind(None::<chrono::NaiveDate>),
        (AttrKind::Json, AttrValue::Null) => query.bind(None::<serde_json::Value>),
        (AttrKind::Json, value) => query.bind(jsonsafe::to_json_safe(value)?),
        _ => return Err(mismatch()),
    };

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, kind: AttrKind, value: AttrValue) -> PlannedColumn {
        PlannedColumn {
            name: name.to_string(),
            kind,
            value,
        }
    }

    #[test]
    fn test_render_insert() {
        let op = PlannedOp::Insert {
            table: "asset".to_string(),
            columns: vec![
                col("name", AttrKind::Text, "Laptop".into()),
                col("company_id", AttrKind::Integer, 3i64.into()),
            ],
        };
        assert_eq!(
            render_op(&op),
            "INSERT INTO asset (name, company_id) VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_render_insert_without_columns() {
        let op = PlannedOp::Insert {
            table: "marker".to_string(),
            columns: vec![],
        };
        assert_eq!(render_op(&op), "INSERT INTO marker DEFAULT VALUES");
    }

    #[test]
    fn test_render_update_numbers_key_after_assignments() {
        let op = PlannedOp::Update {
            table: "asset".to_string(),
            columns: vec![col("name", AttrKind::Text, "Server".into())],
            key: vec![col("asset_id", AttrKind::Integer, 7i64.into())],
        };
        assert_eq!(
            render_op(&op),
            "UPDATE asset SET name = $1 WHERE asset_id = $2"
        );
    }

    #[test]
    fn test_render_update_composite_key() {
        let op = PlannedOp::Update {
            table: "role_assignment".to_string(),
            columns: vec![col("active", AttrKind::Bool, true.into())],
            key: vec![
                col("user_id", AttrKind::Integer, 1i64.into()),
                col("role_id", AttrKind::Integer, 2i64.into()),
            ],
        };
        assert_eq!(
            render_op(&op),
            "UPDATE role_assignment SET active = $1 WHERE user_id = $2 AND role_id = $3"
        );
    }

    #[test]
    fn test_render_delete() {
        let op = PlannedOp::Delete {
            table: "asset".to_string(),
            key: vec![col("asset_id", AttrKind::Integer, 7i64.into())],
        };
        assert_eq!(render_op(&op), "DELETE FROM asset WHERE asset_id = $1");
    }

    #[test]
    fn test_bind_order_matches_placeholder_order() {
        let op = PlannedOp::Update {
            table: "asset".to_string(),
            columns: vec![col("name", AttrKind::Text, "Server".into())],
            key: vec![col("asset_id", AttrKind::Integer, 7i64.into())],
        };
        let names: Vec<&str> = op_bind_columns(&op).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "asset_id"]);
    }
}
