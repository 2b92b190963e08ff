//! Database queries for the audit trail
//!
//! The write side is append-only: [`append`] stages one record into the
//! caller's open transaction and nothing in this module (or the schema)
//! can update or delete an audit row afterwards. The read side serves the
//! audit inspection API.

use sqlx::{PgConnection, PgPool};
use tracing::debug;

use super::models::{
    AuditQuery, AuditRecord, NewAuditRecord, DEFAULT_AUDIT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT,
};

/// Stage one audit record into the caller's transaction.
///
/// The row becomes durable only when the surrounding transaction commits;
/// a rollback discards it together with the business change it describes.
pub async fn append(conn: &mut PgConnection, record: &NewAuditRecord) -> sqlx::Result<AuditRecord> {
    let stored = sqlx::query_as::<_, AuditRecord>(
        r#"
        INSERT INTO audit_log (
            table_name, operation, target_pk_id, target_pk, actor, before, after
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, created_at, table_name, operation, target_pk_id,
                  target_pk, actor, before, after
        "#,
    )
    .bind(&record.table_name)
    .bind(record.operation.as_str())
    .bind(record.target_pk_id)
    .bind(&record.target_pk)
    .bind(&record.actor)
    .bind(&record.before)
    .bind(&record.after)
    .fetch_one(conn)
    .await?;

    debug!(
        audit_id = stored.id,
        table = %stored.table_name,
        operation = %stored.operation,
        "Audit record staged"
    );

    Ok(stored)
}

/// Query the audit trail with filters.
///
/// Builds a dynamic query from the provided filters; results are newest
/// first, capped at [`MAX_AUDIT_QUERY_LIMIT`].
pub async fn query_audit_log(pool: &PgPool, query: &AuditQuery) -> sqlx::Result<Vec<AuditRecord>> {
    // Postgres rejects negative LIMIT/OFFSET outright
    let limit = query.limit.clamp(0, MAX_AUDIT_QUERY_LIMIT);
    let offset = query.offset.max(0);

    let mut sql = String::from(
        r#"
        SELECT id, created_at, table_name, operation, target_pk_id,
               target_pk, actor, before, after
        FROM audit_log
        WHERE 1=1
        "#,
    );

    let mut bind_count = 1;
    let mut conditions = Vec::new();

    if query.table_name.is_some() {
        conditions.push(format!("table_name = ${}", bind_count));
        bind_count += 1;
    }
    if query.operation.is_some() {
        conditions.push(format!("operation = ${}", bind_count));
        bind_count += 1;
    }
    if query.actor.is_some() {
        conditions.push(format!("actor = ${}", bind_count));
        bind_count += 1;
    }
    if query.since.is_some() {
        conditions.push(format!("created_at >= ${}", bind_count));
        bind_count += 1;
    }
    if query.until.is_some() {
        conditions.push(format!("created_at <= ${}", bind_count));
        bind_count += 1;
    }

    for condition in conditions {
        sql.push_str(" AND ");
        sql.push_str(&condition);
    }

    sql.push_str(" ORDER BY id DESC");
    sql.push_str(&format!(" LIMIT ${}", bind_count));
    bind_count += 1;
    sql.push_str(&format!(" OFFSET ${}", bind_count));

    let mut query_builder = sqlx::query_as::<_, AuditRecord>(&sql);

    if let Some(ref table_name) = query.table_name {
        query_builder = query_builder.bind(table_name);
    }
    if let Some(operation) = query.operation {
        query_builder = query_builder.bind(operation.as_str());
    }
    if let Some(ref actor) = query.actor {
        query_builder = query_builder.bind(actor);
    }
    if let Some(since) = query.since {
        query_builder = query_builder.bind(since);
    }
    if let Some(until) = query.until {
        query_builder = query_builder.bind(until);
    }

    query_builder = query_builder.bind(limit).bind(offset);

    let records = query_builder.fetch_all(pool).await?;

    debug!(count = records.len(), "Queried audit trail");

    Ok(records)
}

/// Audit trail for one entity, addressed via the integer-key shortcut.
///
/// Entities with composite or non-integer keys have no shortcut and must be
/// looked up through `target_pk` via [`query_audit_log`] filters.
pub async fn trail_for(
    pool: &PgPool,
    table_name: &str,
    target_pk_id: i64,
    limit: Option<i64>,
) -> sqlx::Result<Vec<AuditRecord>> {
    let limit = limit
        .unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT)
        .clamp(0, MAX_AUDIT_QUERY_LIMIT);

    let records = sqlx::query_as::<_, AuditRecord>(
        r#"
        SELECT id, created_at, table_name, operation, target_pk_id,
               target_pk, actor, before, after
        FROM audit_log
        WHERE table_name = $1 AND target_pk_id = $2
        ORDER BY id DESC
        LIMIT $3
        "#,
    )
    .bind(table_name)
    .bind(target_pk_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    debug!(
        table = table_name,
        target_pk_id,
        count = records.len(),
        "Retrieved entity audit trail"
    );

    Ok(records)
}
