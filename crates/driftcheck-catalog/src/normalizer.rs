//! Merge raw catalog results into one canonical column list per table
//!
//! Key roles are resolved by exact column-name match. Independent catalog
//! queries share no row identity, so the name is the only safe join key.

use driftcheck_core::{ColumnDescriptor, ForeignKeyMapping, TableIdentity, TableSnapshot};
use std::collections::HashSet;

/// Key constraints of one table, fetched before its columns are finalized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableKeys {
    /// Primary key members in key order
    pub primary_key: Vec<String>,

    pub foreign_keys: Vec<ForeignKeyMapping>,
}

impl TableKeys {
    pub fn new(primary_key: Vec<String>, foreign_keys: Vec<ForeignKeyMapping>) -> Self {
        Self { primary_key, foreign_keys }
    }

    pub fn is_composite_primary_key(&self) -> bool {
        self.primary_key.len() > 1
    }

    fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeyMapping> {
        self.foreign_keys.iter().find(|fk| fk.column_name == column)
    }
}

/// Annotate a table's columns with their primary/foreign key roles.
///
/// Flags coming from the bulk column query are overwritten: a column that
/// appears in neither key set ends up with both flags `false` and no
/// referenced table. Duplicate column names keep their first occurrence.
pub fn normalize_table(
    table: &TableIdentity,
    columns: Vec<ColumnDescriptor>,
    keys: &TableKeys,
) -> TableSnapshot {
    if keys.is_composite_primary_key() {
        tracing::warn!(
            table = %table,
            columns = ?keys.primary_key,
            "composite primary key; every member is flagged as primary key"
        );
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(columns.len());

    for mut column in columns {
        if !seen.insert(column.column_name.clone()) {
            tracing::debug!(table = %table, column = %column.column_name, "dropping duplicate column row");
            continue;
        }

        column.is_primary_key = keys.primary_key.iter().any(|pk| *pk == column.column_name);

        match keys.foreign_key_for(&column.column_name) {
            Some(fk) => {
                column.is_foreign_key = true;
                column.referenced_table_name = Some(fk.referenced_table_name.clone());
            }
            None => {
                column.is_foreign_key = false;
                column.referenced_table_name = None;
            }
        }

        normalized.push(column);
    }

    for pk in &keys.primary_key {
        if !seen.contains(pk) {
            tracing::warn!(table = %table, column = %pk, "primary key column missing from column metadata");
        }
    }

    TableSnapshot::new(table.clone(), normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn orders() -> TableIdentity {
        TableIdentity::new("dbo", "orders")
    }

    fn raw_columns(table: &TableIdentity) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new(table, "id", "int").with_nullable(false),
            ColumnDescriptor::new(table, "customer_id", "int").with_nullable(false),
            ColumnDescriptor::new(table, "note", "varchar").with_length(200),
        ]
    }

    #[test]
    fn resolves_primary_and_foreign_keys_by_name() {
        let table = orders();
        let keys = TableKeys::new(
            vec!["id".into()],
            vec![ForeignKeyMapping::new("FK_orders_customers", "customer_id", "customers", "id")],
        );

        let snapshot = normalize_table(&table, raw_columns(&table), &keys);

        let id = snapshot.find_column("id").unwrap();
        assert!(id.is_primary_key);
        assert!(!id.is_foreign_key);

        let customer = snapshot.find_column("customer_id").unwrap();
        assert!(!customer.is_primary_key);
        assert!(customer.is_foreign_key);
        assert_eq!(customer.referenced_table_name.as_deref(), Some("customers"));
    }

    #[test]
    fn unkeyed_columns_default_to_false() {
        let table = orders();
        let mut columns = raw_columns(&table);
        columns[2].is_foreign_key = true;
        columns[2].referenced_table_name = Some("stale".into());

        let snapshot = normalize_table(&table, columns, &TableKeys::default());

        for column in &snapshot.columns {
            assert!(!column.is_primary_key);
            assert!(!column.is_foreign_key);
            assert_eq!(column.referenced_table_name, None);
        }
    }

    #[test]
    fn column_can_be_primary_and_foreign() {
        let table = TableIdentity::new("dbo", "customer_profiles");
        let columns = vec![ColumnDescriptor::new(&table, "customer_id", "int")];
        let keys = TableKeys::new(
            vec!["customer_id".into()],
            vec![ForeignKeyMapping::new("FK_profiles_customers", "customer_id", "customers", "id")],
        );

        let snapshot = normalize_table(&table, columns, &keys);
        let column = &snapshot.columns[0];
        assert!(column.is_primary_key);
        assert!(column.is_foreign_key);
    }

    #[test]
    fn composite_primary_key_flags_every_member() {
        let table = TableIdentity::new("dbo", "order_lines");
        let columns = vec![
            ColumnDescriptor::new(&table, "order_id", "int"),
            ColumnDescriptor::new(&table, "line_no", "int"),
            ColumnDescriptor::new(&table, "qty", "int"),
        ];
        let keys = TableKeys::new(vec!["order_id".into(), "line_no".into()], vec![]);
        assert!(keys.is_composite_primary_key());

        let snapshot = normalize_table(&table, columns, &keys);
        let flags: Vec<bool> = snapshot.columns.iter().map(|c| c.is_primary_key).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn duplicate_rows_keep_first_occurrence() {
        let table = orders();
        let columns = vec![
            ColumnDescriptor::new(&table, "id", "int"),
            ColumnDescriptor::new(&table, "id", "bigint"),
        ];

        let snapshot = normalize_table(&table, columns, &TableKeys::default());
        assert_eq!(snapshot.columns.len(), 1);
        assert_eq!(snapshot.columns[0].column_type, "int");
    }

    #[test]
    fn preserves_catalog_order() {
        let table = orders();
        let snapshot = normalize_table(&table, raw_columns(&table), &TableKeys::default());
        assert_eq!(snapshot.column_names(), vec!["id", "customer_id", "note"]);
    }
}
