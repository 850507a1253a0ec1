//! In-memory catalog adapter for testing
//!
//! This adapter serves predefined tables without connecting to any
//! database. It's useful for:
//! - Unit testing normalization and diffing
//! - Dry runs of a comparison pipeline without credentials
//! - Simulating connectivity failures, slow catalogs and per-table errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use driftcheck_catalog::{MockAdapter, MockTable};
//! use driftcheck_core::{ColumnDescriptor, TableIdentity};
//!
//! let customers = TableIdentity::new("dbo", "customers");
//! let adapter = MockAdapter::new().with_table(
//!     MockTable::new(customers.clone())
//!         .column(ColumnDescriptor::new(&customers, "id", "int"))
//!         .primary_key(["id"]),
//! );
//! ```

use crate::adapter::{normalize_default, CatalogAdapter, CatalogError};
use driftcheck_core::{ColumnDescriptor, ForeignKeyMapping, TableIdentity};
use indexmap::IndexMap;
use std::collections::HashMap;

/// A table served by [`MockAdapter`]
#[derive(Debug, Clone, PartialEq)]
pub struct MockTable {
    pub identity: TableIdentity,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyMapping>,
}

impl MockTable {
    pub fn new(identity: TableIdentity) -> Self {
        Self {
            identity,
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnDescriptor>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn foreign_key(mut self, mapping: ForeignKeyMapping) -> Self {
        self.foreign_keys.push(mapping);
        self
    }
}

/// Mock catalog adapter for testing
///
/// # Example
///
/// ```rust,ignore
/// let adapter = MockAdapter::new()
///     .with_latency(50)  // 50ms simulated latency
///     .with_connection_failure();  // Fail every call
/// ```
#[derive(Debug, Clone)]
pub struct MockAdapter {
    /// Tables by snapshot key
    tables: IndexMap<String, MockTable>,

    /// Errors to return for specific tables
    errors: HashMap<String, CatalogError>,

    /// Simulate connection failure on every call
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,

    /// Name to return from name() method
    adapter_name: &'static str,

    /// Schema to return from default_schema()
    default_schema: String,
}

impl MockAdapter {
    /// Create a new mock adapter with an empty catalog
    pub fn new() -> Self {
        Self {
            tables: IndexMap::new(),
            errors: HashMap::new(),
            fail_connection: false,
            latency_ms: 0,
            adapter_name: "Mock",
            default_schema: "dbo".to_string(),
        }
    }

    /// Add a table, replacing one with the same schema and name
    pub fn with_table(mut self, table: MockTable) -> Self {
        self.tables.insert(table.identity.key(), table);
        self
    }

    /// Remove a table from the catalog
    pub fn without_table(mut self, table: &TableIdentity) -> Self {
        self.tables.shift_remove(&table.key());
        self
    }

    /// Return `error` from every query that touches `table`
    pub fn with_error(mut self, table: TableIdentity, error: CatalogError) -> Self {
        self.errors.insert(table.key(), error);
        self
    }

    /// Fail every call with a connectivity error
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom adapter name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Report a different default schema, e.g. `public` to mimic PostgreSQL
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Simulate latency and connection state shared by every call
    async fn enter(&self) -> Result<(), CatalogError> {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }

        if self.fail_connection {
            return Err(CatalogError::Connectivity(
                "Simulated connection failure".to_string(),
            ));
        }

        Ok(())
    }

    fn check_error(&self, table: &TableIdentity) -> Result<(), CatalogError> {
        match self.errors.get(&table.key()) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CatalogAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.adapter_name
    }

    fn default_schema(&self) -> &str {
        &self.default_schema
    }

    async fn list_tables(&self) -> Result<Vec<TableIdentity>, CatalogError> {
        self.enter().await?;

        let mut tables: Vec<TableIdentity> =
            self.tables.values().map(|t| t.identity.clone()).collect();
        tables.sort_by(|a, b| {
            a.table_name
                .cmp(&b.table_name)
                .then_with(|| a.schema_name.cmp(&b.schema_name))
        });
        Ok(tables)
    }

    async fn primary_key_columns(&self, table: &TableIdentity) -> Result<Vec<String>, CatalogError> {
        self.enter().await?;
        self.check_error(table)?;

        Ok(self
            .tables
            .get(&table.key())
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    async fn foreign_keys(&self, table: &TableIdentity) -> Result<Vec<ForeignKeyMapping>, CatalogError> {
        self.enter().await?;
        self.check_error(table)?;

        Ok(self
            .tables
            .get(&table.key())
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn columns_for_tables(
        &self,
        tables: &[TableIdentity],
    ) -> Result<IndexMap<String, Vec<ColumnDescriptor>>, CatalogError> {
        self.enter().await?;

        let mut result = IndexMap::new();
        for table in tables {
            self.check_error(table)?;

            let Some(mock) = self.tables.get(&table.key()) else {
                continue;
            };

            let columns = mock
                .columns
                .iter()
                .cloned()
                .map(|mut column| {
                    column.column_default = column.column_default.as_deref().map(normalize_default);
                    column
                })
                .collect();
            result.insert(table.key(), columns);
        }

        Ok(result)
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.enter().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> TableIdentity {
        TableIdentity::new("dbo", "users")
    }

    fn users_table() -> MockTable {
        let table = users();
        MockTable::new(table.clone())
            .column(ColumnDescriptor::new(&table, "id", "int").with_nullable(false))
            .column(ColumnDescriptor::new(&table, "active", "bit").with_default("((1))"))
            .primary_key(["id"])
    }

    #[tokio::test]
    async fn test_mock_adapter_lists_tables_sorted() {
        let adapter = MockAdapter::new()
            .with_table(MockTable::new(TableIdentity::new("sales", "orders")))
            .with_table(MockTable::new(TableIdentity::new("dbo", "orders")))
            .with_table(MockTable::new(TableIdentity::new("dbo", "accounts")));

        let tables = adapter.list_tables().await.unwrap();
        let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["dbo.accounts", "dbo.orders", "sales.orders"]);
    }

    #[tokio::test]
    async fn test_mock_adapter_normalizes_defaults() {
        let adapter = MockAdapter::new().with_table(users_table());

        let columns = adapter.columns_for_tables(&[users()]).await.unwrap();
        let active = &columns["dbo+users"][1];
        assert_eq!(active.column_default.as_deref(), Some("(1)"));
    }

    #[tokio::test]
    async fn test_mock_adapter_keyless_table() {
        let table = TableIdentity::new("dbo", "heap");
        let adapter = MockAdapter::new().with_table(MockTable::new(table.clone()));

        assert!(adapter.primary_key_columns(&table).await.unwrap().is_empty());
        assert!(adapter.foreign_keys(&table).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_adapter_unknown_table_is_skipped() {
        let adapter = MockAdapter::new().with_table(users_table());
        let columns = adapter
            .columns_for_tables(&[users(), TableIdentity::new("dbo", "ghost")])
            .await
            .unwrap();

        assert_eq!(columns.len(), 1);
        assert!(columns.contains_key("dbo+users"));
    }

    #[tokio::test]
    async fn test_mock_adapter_connection_failure() {
        let adapter = MockAdapter::new().with_connection_failure();

        assert!(matches!(adapter.test_connection().await, Err(CatalogError::Connectivity(_))));
        assert!(matches!(adapter.list_tables().await, Err(CatalogError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_mock_adapter_custom_error() {
        let adapter = MockAdapter::new()
            .with_table(users_table())
            .with_error(users(), CatalogError::query("dbo.users", "permission denied"));

        let result = adapter.foreign_keys(&users()).await;
        assert!(matches!(result, Err(CatalogError::MetadataQuery { .. })));
    }

    #[tokio::test]
    async fn test_mock_adapter_without_table() {
        let adapter = MockAdapter::new().with_table(users_table()).without_table(&users());
        assert_eq!(adapter.table_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_adapter_latency_simulation() {
        let adapter = MockAdapter::new().with_latency(50);

        let start = std::time::Instant::now();
        adapter.test_connection().await.unwrap();
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[tokio::test]
    async fn test_mock_adapter_name() {
        assert_eq!(MockAdapter::new().name(), "Mock");
        assert_eq!(MockAdapter::new().with_name("Staging").name(), "Staging");
    }

    #[test]
    fn test_mock_adapter_default_schema() {
        assert_eq!(MockAdapter::new().default_schema(), "dbo");
        assert_eq!(MockAdapter::new().with_default_schema("public").default_schema(), "public");
    }
}
