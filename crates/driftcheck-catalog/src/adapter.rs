//! Catalog adapter trait for reading table metadata

use driftcheck_core::{ColumnDescriptor, ForeignKeyMapping, TableIdentity};
use indexmap::IndexMap;
use std::time::Duration;

/// Errors that can occur while reading catalog metadata
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    /// Connection could not be established or was lost
    #[error("Connection failed: {0}")]
    Connectivity(String),

    /// A specific catalog query failed
    #[error("Metadata query failed for {table}: {message}")]
    MetadataQuery { table: String, message: String },

    /// The overall run deadline expired
    #[error("Timed out after {0:?} waiting for the catalog")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetadataQuery {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Connection-class failures are fatal for the whole run
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Timeout(_))
    }
}

/// Read-only access to one database's catalog.
///
/// Implementations must not mutate the target database and must answer
/// with empty results (not errors) for tables without keys.
#[async_trait::async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL", "Mock")
    fn name(&self) -> &'static str;

    /// Schema unqualified tables are created in (`public`, `dbo`, ...).
    ///
    /// Used as the canonical schema when the comparison config sets none.
    fn default_schema(&self) -> &str;

    /// All base tables visible in the catalog, ordered by table name then schema
    async fn list_tables(&self) -> Result<Vec<TableIdentity>, CatalogError>;

    /// Columns of the table's primary key, in key order.
    ///
    /// Empty when the table declares no primary key.
    async fn primary_key_columns(&self, table: &TableIdentity) -> Result<Vec<String>, CatalogError>;

    /// Foreign-key column mappings originating from the table
    async fn foreign_keys(&self, table: &TableIdentity) -> Result<Vec<ForeignKeyMapping>, CatalogError>;

    /// Bulk-fetch column metadata for a batch of tables in one round trip.
    ///
    /// The result is keyed by [`TableIdentity::key`]; columns keep catalog
    /// order and defaults are already passed through [`normalize_default`].
    async fn columns_for_tables(
        &self,
        tables: &[TableIdentity],
    ) -> Result<IndexMap<String, Vec<ColumnDescriptor>>, CatalogError>;

    /// Cheap round trip used to validate credentials before a run
    async fn test_connection(&self) -> Result<(), CatalogError>;
}

/// Strip one level of redundant parentheses from a default expression.
///
/// Catalogs like SQL Server report `((0))` for a default of `0`; this
/// yields `(0)`. The outer pair is only removed when it wraps another
/// complete pair, so `(getdate())` and `(0)` are left alone and a second
/// pass over normalized input is a no-op.
pub fn normalize_default(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_wrapped(trimmed) {
        let inner = &trimmed[1..trimmed.len() - 1];
        if is_wrapped(inner) {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

/// True when the first `(` closes exactly at the last character
fn is_wrapped(expr: &str) -> bool {
    if expr.len() < 2 || !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }

    let last = expr.len() - 1;
    let mut depth = 0usize;
    let mut in_quote = false;

    for (i, ch) in expr.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }

    false
}
