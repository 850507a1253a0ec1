//! Build a normalized [`SchemaSnapshot`] from a catalog adapter

use crate::adapter::{CatalogAdapter, CatalogError};
use crate::normalizer::{normalize_table, TableKeys};
use driftcheck_core::{SchemaSnapshot, TableIdentity};

/// Snapshot every table the adapter lists.
pub async fn build_snapshot(adapter: &dyn CatalogAdapter) -> Result<SchemaSnapshot, CatalogError> {
    let tables = adapter.list_tables().await?;
    build_snapshot_for(adapter, &tables).await
}

/// Snapshot a given set of tables, in the given order.
///
/// Columns come from a single bulk query. Primary and foreign keys of each
/// table are fetched concurrently and both must complete before that
/// table's columns are normalized. Any failure aborts the whole snapshot.
pub async fn build_snapshot_for(
    adapter: &dyn CatalogAdapter,
    tables: &[TableIdentity],
) -> Result<SchemaSnapshot, CatalogError> {
    let mut snapshot = SchemaSnapshot::new();
    if tables.is_empty() {
        return Ok(snapshot);
    }

    let mut columns = adapter.columns_for_tables(tables).await?;

    for table in tables {
        let (primary_key, foreign_keys) = tokio::try_join!(
            adapter.primary_key_columns(table),
            adapter.foreign_keys(table),
        )?;

        let raw = columns.shift_remove(&table.key()).unwrap_or_default();
        if raw.is_empty() {
            tracing::debug!(table = %table, "no column metadata returned");
        }

        let keys = TableKeys::new(primary_key, foreign_keys);
        snapshot.insert(normalize_table(table, raw, &keys));
    }

    tracing::info!(
        adapter = adapter.name(),
        tables = snapshot.len(),
        columns = snapshot.column_count(),
        "snapshot built"
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAdapter, MockTable};
    use driftcheck_core::{ColumnDescriptor, ForeignKeyMapping};
    use pretty_assertions::assert_eq;

    fn shop_adapter() -> MockAdapter {
        let customers = TableIdentity::new("dbo", "customers");
        let orders = TableIdentity::new("dbo", "orders");

        MockAdapter::new()
            .with_table(
                MockTable::new(customers.clone())
                    .column(ColumnDescriptor::new(&customers, "id", "int").with_nullable(false))
                    .column(ColumnDescriptor::new(&customers, "name", "varchar").with_length(50))
                    .primary_key(["id"]),
            )
            .with_table(
                MockTable::new(orders.clone())
                    .column(ColumnDescriptor::new(&orders, "id", "int").with_nullable(false))
                    .column(ColumnDescriptor::new(&orders, "customer_id", "int"))
                    .column(ColumnDescriptor::new(&orders, "status", "int").with_default("((0))"))
                    .primary_key(["id"])
                    .foreign_key(ForeignKeyMapping::new("FK_orders_customers", "customer_id", "customers", "id")),
            )
    }

    #[tokio::test]
    async fn snapshot_contains_normalized_tables() {
        let snapshot = build_snapshot(&shop_adapter()).await.unwrap();

        assert_eq!(snapshot.len(), 2);
        let orders = snapshot.get("dbo+orders").unwrap();
        assert!(orders.find_column("id").unwrap().is_primary_key);

        let fk = orders.find_column("customer_id").unwrap();
        assert!(fk.is_foreign_key);
        assert_eq!(fk.referenced_table_name.as_deref(), Some("customers"));

        let status = orders.find_column("status").unwrap();
        assert_eq!(status.column_default.as_deref(), Some("(0)"));
    }

    #[tokio::test]
    async fn snapshot_follows_listing_order() {
        let snapshot = build_snapshot(&shop_adapter()).await.unwrap();
        let names: Vec<_> = snapshot.tables().map(|t| t.identity.table_name.clone()).collect();
        assert_eq!(names, vec!["customers", "orders"]);
    }

    #[tokio::test]
    async fn empty_table_list_skips_queries() {
        let adapter = MockAdapter::new().with_connection_failure();
        let snapshot = build_snapshot_for(&adapter, &[]).await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn key_query_failure_aborts_snapshot() {
        let adapter = shop_adapter()
            .with_error(TableIdentity::new("dbo", "orders"), CatalogError::query("dbo.orders", "permission denied"));

        let err = build_snapshot(&adapter).await.unwrap_err();
        assert!(matches!(err, CatalogError::MetadataQuery { ref table, .. } if table == "dbo.orders"));
    }
}
