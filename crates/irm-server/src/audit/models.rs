//! Audit data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Logical table name of the audit trail itself.
pub const AUDIT_TABLE: &str = "audit_log";

/// Default number of audit entries returned per query
pub const DEFAULT_AUDIT_QUERY_LIMIT: i64 = 100;

/// Maximum number of audit entries that can be returned in a single query.
/// This prevents excessive memory usage and query timeouts.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 1000;

/// The three change classes the interceptor observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown audit operation: {other}")),
        }
    }
}

/// Audit trail entry as stored in the database.
///
/// Rows are immutable once written; the store exposes no update or delete
/// path for them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditRecord {
    /// Surrogate key, assigned in commit order by the store
    pub id: i64,
    /// Insertion timestamp, set by the store
    pub created_at: DateTime<Utc>,
    /// Logical table name of the changed entity
    pub table_name: String,
    /// CREATE | UPDATE | DELETE
    pub operation: String,
    /// Equality-lookup shortcut, present only for single-column integer keys
    pub target_pk_id: Option<i64>,
    /// Full primary-key projection (covers composite keys)
    pub target_pk: JsonValue,
    /// Acting principal; null for system-attributed changes
    pub actor: Option<String>,
    /// Changed attributes (UPDATE) or full snapshot (DELETE); null for CREATE
    pub before: Option<JsonValue>,
    /// Full snapshot (CREATE) or changed attributes (UPDATE); null for DELETE
    pub after: Option<JsonValue>,
}

/// A staged audit record, produced by the change interceptor and not yet
/// assigned an id by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub table_name: String,
    pub operation: AuditOperation,
    pub target_pk_id: Option<i64>,
    pub target_pk: JsonValue,
    pub actor: Option<String>,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

/// Query parameters for the audit trail read side
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    /// Filter by logical table name
    pub table_name: Option<String>,
    /// Filter by operation
    pub operation: Option<AuditOperation>,
    /// Filter by acting principal
    pub actor: Option<String>,
    /// Start timestamp for range query
    pub since: Option<DateTime<Utc>>,
    /// End timestamp for range query
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of results to return
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_AUDIT_QUERY_LIMIT
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            table_name: None,
            operation: None,
            actor: None,
            since: None,
            until: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}
